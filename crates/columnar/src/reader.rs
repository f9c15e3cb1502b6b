use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::{
	error::{ColumnarError, Result},
	orc::OrcFile,
	paging::{plan_page, PageWindow, RowGroupSpan},
	parquet::ParquetFile,
	schema::{ColumnSchema, ColumnarFormat, FileMeta},
	source::RangeSource,
	value::DataRow,
};

/// An opened ORC or Parquet file whose footer has already been parsed.
///
/// Schema and metadata are served from memory; row data is decoded on demand,
/// one window of row groups at a time.
#[async_trait]
pub trait ColumnarFile: Send + Sync {
	fn format(&self) -> ColumnarFormat;

	fn schema(&self) -> &[ColumnSchema];

	fn meta(&self) -> &FileMeta;

	fn row_groups(&self) -> &[RowGroupSpan];

	/// Decodes `window.groups`, drops `window.skip` rows and keeps `window.take`.
	async fn read_window(&self, window: &PageWindow) -> Result<Vec<DataRow>>;

	fn column_names(&self) -> Vec<String> {
		self.schema().iter().map(|c| c.name.clone()).collect()
	}

	/// Rows of a 1-based page. Pages outside the file are empty.
	async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<DataRow>> {
		match plan_page(self.row_groups(), page, page_size) {
			Some(window) => {
				debug!(
					format = %self.format(),
					page,
					page_size,
					groups = ?window.groups,
					"Decoding page"
				);
				self.read_window(&window).await
			}
			None => Ok(Vec::new()),
		}
	}

	async fn read_row_group(&self, index: usize) -> Result<Vec<DataRow>> {
		let Some(span) = self.row_groups().get(index) else {
			return Ok(Vec::new());
		};

		self.read_window(&PageWindow {
			groups: index..index + 1,
			skip: 0,
			take: span.row_count,
		})
		.await
	}
}

/// Parses the footer of `source` as `format`.
pub async fn open(
	format: ColumnarFormat,
	source: Arc<dyn RangeSource>,
) -> Result<Box<dyn ColumnarFile>> {
	match format {
		ColumnarFormat::Parquet => Ok(Box::new(ParquetFile::open(source).await?)),
		ColumnarFormat::Orc => Ok(Box::new(OrcFile::open(source).await?)),
		ColumnarFormat::Avro => Err(ColumnarError::unsupported(
			format,
			"Avro containers have no row groups, decode them with `avro::decode`",
		)),
	}
}

/// Lazy sequence of row groups, starting at the first one on every call.
///
/// Nothing is decoded until the stream is polled and at most one row group is
/// held at a time.
pub fn row_group_stream(file: &dyn ColumnarFile) -> BoxStream<'_, Result<Vec<DataRow>>> {
	stream::iter(0..file.row_groups().len())
		.then(move |index| file.read_row_group(index))
		.boxed()
}
