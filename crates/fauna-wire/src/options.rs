//! Decode and encode options.

use serde::{Deserialize, Serialize};

/// Options for one decode call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Reject wire fields a record does not declare instead of skipping them.
    pub strict_fields: bool,
    /// Maximum number of simultaneously open objects, arrays and wrappers.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_fields: false,
            max_depth: 256,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            strict_fields: true,
            ..Default::default()
        }
    }
}

/// Options for one encode call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Initial size of the output buffer in bytes.
    pub initial_capacity: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
        }
    }
}
