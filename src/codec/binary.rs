//! Fixed-width big-endian primitives.

use crate::error::{GridError, Result};
use bytes::{Buf, BufMut};

pub const F64_LEN: usize = 8;
pub const I32_LEN: usize = 4;
pub const U32_LEN: usize = 4;

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(GridError::UnexpectedEof);
    }
    Ok(())
}

pub fn put_f64(buf: &mut impl BufMut, value: f64) {
    buf.put_u64(value.to_bits());
}

pub fn get_f64(buf: &mut impl Buf) -> Result<f64> {
    ensure_remaining(buf, F64_LEN)?;
    Ok(f64::from_bits(buf.get_u64()))
}

pub fn get_i32(buf: &mut impl Buf) -> Result<i32> {
    ensure_remaining(buf, I32_LEN)?;
    Ok(buf.get_i32())
}

pub fn get_u32(buf: &mut impl Buf) -> Result<u32> {
    ensure_remaining(buf, U32_LEN)?;
    Ok(buf.get_u32())
}

/// Length-prefixed UTF-8 string.
pub fn put_str(buf: &mut impl BufMut, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

pub fn get_string(buf: &mut impl Buf) -> Result<String> {
    let len = get_u32(buf)? as usize;
    ensure_remaining(buf, len)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|e| GridError::format(format!("invalid UTF-8: {e}")))
}
