use serde::Serialize;

/// Bounded prefix of a file, with binary columnar formats flagged instead of
/// decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
	/// Length of the whole file
	pub length: u64,
	pub content: String,
	pub is_orc: bool,
	pub is_parquet: bool,
	pub is_avro: bool,
	/// Whether `content` stops before the end of the file
	pub truncated: bool,
}

/// Whole text content of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
	pub length: u64,
	pub content: String,
}
