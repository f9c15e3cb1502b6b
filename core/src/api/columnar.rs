//! ORC, Parquet and Avro operations
//!
//! ORC and Parquet expose the same five calls, generated per format by
//! [`columnar_operations!`].

use std::path::PathBuf;

use async_trait::async_trait;
use hx_columnar::{ColumnSchema, ColumnarFormat, DataRow, DataValue, FileMeta};
use serde::Deserialize;

use super::{files::StatFile, CallContext, Operation};
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
	pub profile_id: String,
	pub path: String,
	/// 1-based
	pub page: u64,
	pub page_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArgs {
	pub profile_id: String,
	pub path: String,
	/// Local CSV file to create
	pub target_path: PathBuf,
}

macro_rules! columnar_operations {
	(
		$format:expr, $prefix:literal,
		$schema:ident, $meta:ident, $page:ident, $row_count:ident, $export:ident
	) => {
		#[derive(Debug, Deserialize)]
		#[serde(transparent)]
		pub struct $schema(pub StatFile);

		#[async_trait]
		impl Operation for $schema {
			const METHOD: &'static str = concat!($prefix, "Schema");
			type Output = Vec<ColumnSchema>;

			async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
				ctx.namespace(&self.0.profile_id)
					.await?
					.columnar_schema($format, &self.0.path)
					.await
			}
		}

		#[derive(Debug, Deserialize)]
		#[serde(transparent)]
		pub struct $meta(pub StatFile);

		#[async_trait]
		impl Operation for $meta {
			const METHOD: &'static str = concat!($prefix, "Meta");
			type Output = FileMeta;

			async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
				ctx.namespace(&self.0.profile_id)
					.await?
					.columnar_meta($format, &self.0.path)
					.await
			}
		}

		#[derive(Debug, Deserialize)]
		#[serde(transparent)]
		pub struct $page(pub PageArgs);

		#[async_trait]
		impl Operation for $page {
			const METHOD: &'static str = concat!($prefix, "Page");
			type Output = Vec<DataRow>;

			async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
				let PageArgs {
					profile_id,
					path,
					page,
					page_size,
				} = self.0;
				ctx.namespace(&profile_id)
					.await?
					.columnar_page($format, &path, page, page_size)
					.await
			}
		}

		#[derive(Debug, Deserialize)]
		#[serde(transparent)]
		pub struct $row_count(pub StatFile);

		#[async_trait]
		impl Operation for $row_count {
			const METHOD: &'static str = concat!($prefix, "RowCount");
			type Output = u64;

			async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
				ctx.namespace(&self.0.profile_id)
					.await?
					.columnar_row_count($format, &self.0.path)
					.await
			}
		}

		#[derive(Debug, Deserialize)]
		#[serde(transparent)]
		pub struct $export(pub ExportArgs);

		#[async_trait]
		impl Operation for $export {
			const METHOD: &'static str = concat!($prefix, "ExportCsv");
			type Output = PathBuf;

			async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
				ctx.namespace(&self.0.profile_id)
					.await?
					.columnar_export_csv($format, &self.0.path, &self.0.target_path, &ctx.cancel)
					.await
			}
		}
	};
}

columnar_operations!(
	ColumnarFormat::Orc,
	"orc",
	OrcSchema,
	OrcMeta,
	OrcPage,
	OrcRowCount,
	OrcExportCsv
);

columnar_operations!(
	ColumnarFormat::Parquet,
	"parquet",
	ParquetSchema,
	ParquetMeta,
	ParquetPage,
	ParquetRowCount,
	ParquetExportCsv
);

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct AvroContent(pub StatFile);

#[async_trait]
impl Operation for AvroContent {
	const METHOD: &'static str = "avroContent";
	type Output = Vec<DataValue>;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.avro_records(&self.0.path)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn method_names_follow_the_format_prefix() {
		assert_eq!(OrcPage::METHOD, "orcPage");
		assert_eq!(ParquetExportCsv::METHOD, "parquetExportCsv");
		assert_eq!(ParquetRowCount::METHOD, "parquetRowCount");
	}
}
