//! CSV encoding of decoded rows.
//!
//! Fields are quoted only when needed (delimiter, quote or line break inside),
//! records end with `\n`.

use std::{borrow::Cow, io};

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};

use crate::value::{DataRow, DataValue};

fn writer() -> Writer<Vec<u8>> {
	WriterBuilder::new()
		.quote_style(QuoteStyle::Necessary)
		.terminator(Terminator::Any(b'\n'))
		.from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> io::Result<Vec<u8>> {
	writer.into_inner().map_err(|e| e.into_error())
}

/// Text of one cell. Nulls are empty, nested values are JSON.
pub fn format_value(value: &DataValue) -> Cow<'_, str> {
	match value {
		DataValue::Null => Cow::Borrowed(""),
		DataValue::String(s) => Cow::Borrowed(s),
		other => Cow::Owned(other.to_string()),
	}
}

pub fn encode_header(columns: &[String]) -> io::Result<Vec<u8>> {
	let mut writer = writer();
	writer.write_record(columns)?;
	finish(writer)
}

/// Encodes `rows` in the order of `columns`. Missing columns are empty cells.
pub fn encode_rows(columns: &[String], rows: &[DataRow]) -> io::Result<Vec<u8>> {
	let mut writer = writer();
	let mut fields = Vec::with_capacity(columns.len());

	for row in rows {
		fields.clear();
		fields.extend(
			columns
				.iter()
				.map(|name| row.get(name).map_or(Cow::Borrowed(""), format_value)),
		);
		writer.write_record(fields.iter().map(|f| f.as_bytes()))?;
	}

	finish(writer)
}
