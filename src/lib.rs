//! Purpose: Library crate behind the `tablesink` CLI: typed tables streamed to CSV files.
//! Exports: `api` (stable surface), `core` (table model, serialization, errors).
//! Role: Embedded by producers that declare tables and push rows column by column.
//! Invariants: Single-threaded and synchronous; one context has one write cursor.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
