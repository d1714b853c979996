//! Purpose: Define the stable public Rust API boundary for tablesink.
//! Exports: Session, table, column, value, sink, and error types.
//! Role: Public, additive-only surface used by the CLI and embedding producers.
//! Invariants: This module is the only public path a producer needs.
//! Invariants: Internal helpers stay behind `core` and are not re-exported here.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::chain::Chain;
pub use crate::core::column::Column;
pub use crate::core::context::Context;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::float_format::{DEFAULT_FLOAT_FORMAT, FloatFormat};
pub use crate::core::log::Logger;
pub use crate::core::options::{DEFAULT_SOURCE_FILE, SessionOptions};
pub use crate::core::sink::{OpenMode, Sink};
pub use crate::core::table::Table;
pub use crate::core::value::{Value, ValueType};
