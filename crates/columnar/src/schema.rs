use arrow::datatypes::Schema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// File formats understood by this crate.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ColumnarFormat {
	#[strum(serialize = "ORC")]
	Orc,
	Parquet,
	Avro,
}

/// One column of a file schema, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
	pub name: String,
	pub type_name: String,
}

impl ColumnSchema {
	pub(crate) fn from_arrow(schema: &Schema) -> Vec<Self> {
		schema
			.fields()
			.iter()
			.map(|field| Self {
				name: field.name().clone(),
				type_name: field.data_type().to_string(),
			})
			.collect()
	}
}

/// Footer-level statistics of a columnar file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
	pub format: ColumnarFormat,
	pub total_row_count: u64,
	/// Codec name as the format spells it (`SNAPPY`, `ZLIB`, `UNCOMPRESSED`...).
	pub compression_type: String,
	/// Parquet row groups or ORC stripes.
	pub row_group_count: usize,
	pub file_length: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub created_by: Option<String>,
}
