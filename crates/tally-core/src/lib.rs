//! # tally-core
//!
//! Core value types for the tally computed-column engine.
//!
//! This crate provides the fundamental types used throughout tally:
//! - [`Value`] and [`Level`] - per-row values and categorical levels
//! - [`DataType`] and [`MeasureType`] - storage kind and statistical role
//! - [`convert`] - missing sentinels and total conversion between domains
//! - [`ValueSource`], [`ColumnResolver`], [`RowFilter`] - the storage boundary
//! - [`DataColumn`] - an in-memory column implementing [`ValueSource`]
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{convert, Domain, Value};
//!
//! let v = convert::convert(&Value::text("2.5"), Domain::Decimal);
//! assert_eq!(v, Value::Decimal(2.5));
//! assert!(convert::convert(&Value::text("n/a"), Domain::Integer).is_missing());
//! ```

pub mod column;
pub mod convert;
pub mod error;
pub mod source;
pub mod types;
pub mod value;

// Re-exports for convenience
pub use column::DataColumn;
pub use convert::{missing_of, Domain, INT_MISSING};
pub use error::{Error, Result};
pub use source::{ColumnResolver, RowFilter, ValueSource};
pub use types::{DataType, MeasureType};
pub use value::{Level, Value};
