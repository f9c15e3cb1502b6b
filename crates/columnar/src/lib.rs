//! Random-access decoding of columnar files (ORC, Parquet) and Avro containers.
//!
//! Nothing in here knows where the bytes live. Readers are opened over a
//! [`RangeSource`], which only has to answer "how long are you" and "give me
//! these bytes", so the same code serves remote files, local files and
//! in-memory buffers.
//!
//! Decoded values are normalised into [`DataValue`] so callers see one scalar
//! model regardless of the on-disk format:
//! - decimals are rendered as strings with their scale
//! - timestamps are RFC 3339 UTC strings with millisecond precision
//! - dates are `YYYY-MM-DD`
//! - lists, structs and maps become [`DataValue::List`] and [`DataValue::Struct`]

#![warn(
	clippy::all,
	clippy::unwrap_used,
	clippy::expect_used,
	rust_2018_idioms,
	future_incompatible,
	nonstandard_style
)]

pub mod avro;
mod convert;
pub mod csv;
pub mod error;
pub mod export;
pub mod orc;
pub mod paging;
pub mod parquet;
pub mod reader;
pub mod schema;
pub mod source;
pub mod value;

pub use error::{ColumnarError, Result};
pub use export::{export_csv, ExportSummary};
pub use paging::{PageWindow, RowGroupSpan};
pub use reader::{open, row_group_stream, ColumnarFile};
pub use schema::{ColumnSchema, ColumnarFormat, FileMeta};
pub use source::{BytesSource, RangeSource};
pub use value::{DataRow, DataValue};
