//! Job configuration for grid partitioning
//!
//! One serializable struct that every writer of a job is built from. It can
//! be loaded from JSON, or TOML with the `toml` feature.

use crate::codec::{AnyShape, ShapeKind};
use crate::error::Result;
use crate::format::Compression;
use crate::master::MasterIndexKind;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Partitioning job configuration
///
/// # Example
///
/// ```rust
/// use spatio_grid::GridConfig;
/// use spatio_grid::codec::ShapeKind;
///
/// let json = r#"{
///     "pack": true,
///     "shape": "valued_point",
///     "compression": "gzip"
/// }"#;
/// let config = GridConfig::from_json(json).unwrap();
/// assert!(config.pack);
/// assert_eq!(config.shape, ShapeKind::ValuedPoint);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Shrink each written cell to the bounding box of its records
    #[serde(default)]
    pub pack: bool,

    /// Grow each written cell to cover records that cross its boundary
    #[serde(default)]
    pub expand: bool,

    /// Record type stored in the blocks
    #[serde(default)]
    pub shape: ShapeKind,

    /// Block compression (None writes plain blocks)
    #[serde(default)]
    pub compression: Option<Compression>,

    /// Layout recorded in the master file name
    #[serde(default)]
    pub index_kind: MasterIndexKind,

    /// Optional query shape in tagged text form, e.g. `rectangle,0.0,0.0,1.0,1.0`
    #[serde(default)]
    pub query: Option<String>,
}

impl GridConfig {
    pub fn with_pack(mut self, pack: bool) -> Self {
        self.pack = pack;
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_index_kind(mut self, kind: MasterIndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    pub fn with_query(mut self, query: &AnyShape) -> Self {
        self.query = Some(query.to_tagged_text());
        self
    }

    /// Decode the configured query shape
    pub fn query_shape(&self) -> Result<Option<AnyShape>> {
        self.query
            .as_deref()
            .map(AnyShape::from_tagged_text)
            .transpose()
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pack && self.expand {
            log::warn!("both pack and expand are set; pack takes precedence");
        }

        if let Err(e) = self.query_shape() {
            return Err(format!("Invalid query shape: {e}"));
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: GridConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: GridConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            pack: false,
            expand: false,
            shape: ShapeKind::default(),
            compression: None,
            index_kind: MasterIndexKind::default(),
            query: None,
        }
    }
}
