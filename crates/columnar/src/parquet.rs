//! Parquet decoding over a [`RangeSource`].

use std::{ops::Range, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future::BoxFuture, FutureExt, StreamExt};
use parquet::{
	arrow::{
		arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions},
		async_reader::{AsyncFileReader, ParquetRecordBatchStreamBuilder},
	},
	basic::Compression,
	errors::ParquetError,
	file::metadata::{ParquetMetaData, ParquetMetaDataReader},
};
use tracing::{debug, trace};

use crate::{
	convert::batch_to_rows,
	error::{ColumnarError, Result},
	paging::{spans_from_counts, PageWindow, RowGroupSpan},
	reader::ColumnarFile,
	schema::{ColumnSchema, ColumnarFormat, FileMeta},
	source::RangeSource,
	value::DataRow,
};

const MAGIC: &[u8; 4] = b"PAR1";
/// Metadata length plus trailing magic.
const FOOTER_SIZE: u64 = 8;
const BATCH_SIZE: usize = 8192;
const FORMAT: ColumnarFormat = ColumnarFormat::Parquet;

pub struct ParquetFile {
	source: Arc<dyn RangeSource>,
	metadata: ArrowReaderMetadata,
	schema: Vec<ColumnSchema>,
	meta: FileMeta,
	row_groups: Vec<RowGroupSpan>,
}

impl ParquetFile {
	/// Reads and validates the footer. Row data is not touched.
	pub async fn open(source: Arc<dyn RangeSource>) -> Result<Self> {
		let file_length = source
			.len()
			.await
			.map_err(|e| ColumnarError::io("reading Parquet file length", e))?;

		let parquet_metadata = Arc::new(load_metadata(source.as_ref(), file_length).await?);
		let metadata = ArrowReaderMetadata::try_new(parquet_metadata, ArrowReaderOptions::new())
			.map_err(|e| ColumnarError::classify(FORMAT, &e))?;

		let file_metadata = metadata.metadata().file_metadata();
		let row_groups = spans_from_counts(
			metadata
				.metadata()
				.row_groups()
				.iter()
				.map(|rg| u64::try_from(rg.num_rows()).unwrap_or_default()),
		);

		let meta = FileMeta {
			format: FORMAT,
			total_row_count: u64::try_from(file_metadata.num_rows()).unwrap_or_default(),
			compression_type: compression_of(metadata.metadata()),
			row_group_count: row_groups.len(),
			file_length,
			created_by: file_metadata.created_by().map(str::to_string),
		};

		debug!(
			rows = meta.total_row_count,
			row_groups = meta.row_group_count,
			compression = %meta.compression_type,
			"Opened Parquet file"
		);

		Ok(Self {
			schema: ColumnSchema::from_arrow(metadata.schema()),
			source,
			metadata,
			meta,
			row_groups,
		})
	}
}

#[async_trait]
impl ColumnarFile for ParquetFile {
	fn format(&self) -> ColumnarFormat {
		FORMAT
	}

	fn schema(&self) -> &[ColumnSchema] {
		&self.schema
	}

	fn meta(&self) -> &FileMeta {
		&self.meta
	}

	fn row_groups(&self) -> &[RowGroupSpan] {
		&self.row_groups
	}

	async fn read_window(&self, window: &PageWindow) -> Result<Vec<DataRow>> {
		let reader = RangeReader {
			source: self.source.clone(),
			metadata: self.metadata.metadata().clone(),
		};

		let mut stream =
			ParquetRecordBatchStreamBuilder::new_with_metadata(reader, self.metadata.clone())
				.with_row_groups(window.groups.clone().collect())
				.with_offset(window.skip as usize)
				.with_limit(window.take as usize)
				.with_batch_size(BATCH_SIZE)
				.build()
				.map_err(|e| ColumnarError::classify(FORMAT, &e))?;

		let mut rows = Vec::with_capacity(window.take as usize);
		while let Some(batch) = stream.next().await {
			let batch = batch.map_err(|e| ColumnarError::classify(FORMAT, &e))?;
			rows.extend(batch_to_rows(FORMAT, &batch)?);
		}

		Ok(rows)
	}
}

/// Locates and decodes the footer: `<metadata> <u32 LE length> PAR1`.
async fn load_metadata(source: &dyn RangeSource, file_length: u64) -> Result<ParquetMetaData> {
	if file_length < MAGIC.len() as u64 + FOOTER_SIZE {
		return Err(ColumnarError::format(
			FORMAT,
			format!("file of {file_length} bytes is too small to hold a footer"),
		));
	}

	let head = source
		.read_range(0..MAGIC.len() as u64)
		.await
		.map_err(|e| ColumnarError::io("reading Parquet header", e))?;
	if head.as_ref() != MAGIC {
		return Err(ColumnarError::format(FORMAT, "missing leading PAR1 magic"));
	}

	let footer = source
		.read_range(file_length - FOOTER_SIZE..file_length)
		.await
		.map_err(|e| ColumnarError::io("reading Parquet footer", e))?;
	if &footer[4..] != MAGIC {
		return Err(ColumnarError::format(FORMAT, "missing trailing PAR1 magic"));
	}

	let metadata_length = u64::from(u32::from_le_bytes([
		footer[0], footer[1], footer[2], footer[3],
	]));
	if metadata_length + FOOTER_SIZE + MAGIC.len() as u64 > file_length {
		return Err(ColumnarError::format(
			FORMAT,
			format!("footer claims {metadata_length} bytes of metadata in a {file_length} byte file"),
		));
	}

	let metadata_start = file_length - FOOTER_SIZE - metadata_length;
	trace!(metadata_start, metadata_length, "Reading Parquet metadata");
	let buf = source
		.read_range(metadata_start..file_length - FOOTER_SIZE)
		.await
		.map_err(|e| ColumnarError::io("reading Parquet metadata", e))?;

	ParquetMetaDataReader::decode_metadata(&buf)
		.map_err(|e| ColumnarError::format(FORMAT, e.to_string()))
}

/// Codec of the first column chunk, which is what writers apply file-wide.
fn compression_of(metadata: &ParquetMetaData) -> String {
	let Some(column) = metadata
		.row_groups()
		.first()
		.and_then(|rg| rg.columns().first())
	else {
		return "UNCOMPRESSED".to_string();
	};

	match column.compression() {
		Compression::UNCOMPRESSED => "UNCOMPRESSED",
		Compression::SNAPPY => "SNAPPY",
		Compression::GZIP(_) => "GZIP",
		Compression::LZO => "LZO",
		Compression::BROTLI(_) => "BROTLI",
		Compression::LZ4 => "LZ4",
		Compression::ZSTD(_) => "ZSTD",
		Compression::LZ4_RAW => "LZ4_RAW",
	}
	.to_string()
}

/// Adapts a [`RangeSource`] to the parquet crate's async reader, serving the
/// already parsed footer instead of fetching it again.
struct RangeReader {
	source: Arc<dyn RangeSource>,
	metadata: Arc<ParquetMetaData>,
}

impl AsyncFileReader for RangeReader {
	fn get_bytes(&mut self, range: Range<usize>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
		let source = self.source.clone();
		async move {
			source
				.read_range(range.start as u64..range.end as u64)
				.await
				.map_err(|e| ParquetError::External(Box::new(e)))
		}
		.boxed()
	}

	fn get_metadata(&mut self) -> BoxFuture<'_, parquet::errors::Result<Arc<ParquetMetaData>>> {
		let metadata = self.metadata.clone();
		async move { Ok(metadata) }.boxed()
	}
}
