//! Delimited text primitives.
//!
//! Decoders work on a `&mut &str` cursor. Every reader consumes exactly the
//! characters of its field and leaves the cursor on the following separator
//! (or at the end of input), so a composite decoder can call the base
//! decoder first and continue from where it stopped.

use super::SEPARATOR;
use crate::error::{GridError, Result};
use std::fmt::Write;

pub fn write_f64(out: &mut String, value: f64) {
    // Debug formatting is the shortest representation that parses back to
    // the same bits.
    let _ = write!(out, "{value:?}");
}

pub fn write_i32(out: &mut String, value: i32) {
    let _ = write!(out, "{value}");
}

pub fn write_separator(out: &mut String) {
    out.push(SEPARATOR);
}

/// Split off the next field, stopping before the separator.
pub fn take_field<'a>(input: &mut &'a str) -> &'a str {
    let end = input.find(SEPARATOR).unwrap_or(input.len());
    let (field, rest) = input.split_at(end);
    *input = rest;
    field
}

/// Consume everything that is left.
pub fn take_rest<'a>(input: &mut &'a str) -> &'a str {
    let rest = *input;
    *input = "";
    rest
}

pub fn expect_separator(input: &mut &str) -> Result<()> {
    match input.strip_prefix(SEPARATOR) {
        Some(rest) => {
            *input = rest;
            Ok(())
        }
        None if input.is_empty() => Err(GridError::format(format!(
            "expected '{SEPARATOR}' but input ended"
        ))),
        None => Err(GridError::format(format!(
            "expected '{SEPARATOR}' before {:?}",
            preview(input)
        ))),
    }
}

pub fn read_f64(input: &mut &str) -> Result<f64> {
    let field = take_field(input);
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| GridError::format(format!("unparsable number {:?}", preview(field))))
}

pub fn read_i32(input: &mut &str) -> Result<i32> {
    let field = take_field(input);
    field
        .trim()
        .parse::<i32>()
        .map_err(|_| GridError::format(format!("unparsable integer {:?}", preview(field))))
}

pub(crate) fn ensure_consumed(input: &str) -> Result<()> {
    if input.is_empty() {
        Ok(())
    } else {
        Err(GridError::format(format!(
            "trailing input {:?}",
            preview(input)
        )))
    }
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(32) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
