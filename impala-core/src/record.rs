//! Key-value records of values observed during learning.
//!
//! A [`Record`] is produced by every learning step of an agent and carries the
//! loss components and diagnostics of that step. Records only report what
//! happened; nothing read from a record feeds back into optimization.
//!
//! ```rust
//! use impala_core::record::{Record, RecordValue};
//!
//! // following values are obtained with some process in reality
//! let loss = 0.25f32;
//! let values = vec![1f32, 2.0, 3.0];
//!
//! let mut record = Record::empty();
//! record.insert("loss", RecordValue::Scalar(loss));
//! record.insert("V", RecordValue::Array1(values));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;

pub use base::{Record, RecordValue};
