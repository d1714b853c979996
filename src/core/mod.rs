// Core modules implementing the table model, row serialization, and error modeling.
pub mod chain;
pub mod column;
pub mod context;
pub mod error;
pub mod float_format;
pub mod log;
pub mod options;
pub mod sink;
pub mod table;
pub mod value;
