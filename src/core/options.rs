//! Purpose: Session-wide output options shared by every table in a context.
//! Exports: `SessionOptions`.
//! Role: Deserializable from JSON config files; the CLI layers flags on top.
//! Invariants: Missing fields take their defaults (`auto_close` on, everything else off).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::float_format::DEFAULT_FLOAT_FORMAT;

pub const DEFAULT_SOURCE_FILE: &str = "out";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
    /// Gzip every table file (`.csv.gz`).
    pub compress: bool,
    /// Append to existing files instead of truncating them.
    pub dont_drop: bool,
    /// Emit the column-name row.
    pub add_header: bool,
    /// Emit the `# name:type` row.
    pub add_types: bool,
    /// Close every table explicitly when the context is dropped.
    pub auto_close: bool,
    /// printf-style conversion used for float cells.
    pub float_format: String,
    pub out_dir: Option<PathBuf>,
    /// First component of every generated file name.
    pub source_file: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            compress: false,
            dont_drop: false,
            add_header: false,
            add_types: false,
            auto_close: true,
            float_format: DEFAULT_FLOAT_FORMAT.to_string(),
            out_dir: None,
            source_file: DEFAULT_SOURCE_FILE.to_string(),
        }
    }
}
