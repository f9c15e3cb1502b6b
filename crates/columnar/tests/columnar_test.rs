//! Integration tests for paging and CSV export across formats.

use std::{
	fs, io,
	ops::Range,
	path::Path,
	sync::{Arc, Mutex},
};

use arrow::{
	array::{ArrayRef, Float64Array, Int64Array, StringArray},
	record_batch::RecordBatch,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use hx_columnar::{
	export_csv, open, row_group_stream, BytesSource, ColumnarError, ColumnarFormat, DataValue,
	RangeSource,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn sample_batch(rows: i64) -> RecordBatch {
	let ids = Int64Array::from_iter_values(0..rows);
	let labels = StringArray::from_iter((0..rows).map(|i| match i % 3 {
		0 => Some(format!("plain-{i}")),
		1 => Some(format!("comma, \"quoted\" {i}")),
		_ => None,
	}));
	let scores = Float64Array::from_iter_values((0..rows).map(|i| i as f64 / 4.0));

	RecordBatch::try_from_iter(vec![
		("id", Arc::new(ids) as ArrayRef),
		("label", Arc::new(labels) as ArrayRef),
		("score", Arc::new(scores) as ArrayRef),
	])
	.unwrap()
}

fn parquet_bytes(rows: i64, row_group_size: usize) -> Bytes {
	let batch = sample_batch(rows);
	let props = WriterProperties::builder()
		.set_max_row_group_size(row_group_size)
		.build();
	let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props)).unwrap();
	writer.write(&batch).unwrap();
	Bytes::from(writer.into_inner().unwrap())
}

fn orc_bytes(rows: i64) -> Bytes {
	orc_bytes_with_stripes(rows, 64 * 1024 * 1024)
}

fn orc_bytes_with_stripes(rows: i64, stripe_byte_size: usize) -> Bytes {
	let batch = sample_batch(rows);
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("sample.orc");

	let file = fs::File::create(&path).unwrap();
	let mut writer = orc_rust::arrow_writer::ArrowWriterBuilder::new(file, batch.schema())
		.with_stripe_byte_size(stripe_byte_size)
		.try_build()
		.unwrap();
	writer.write(&batch).unwrap();
	writer.close().unwrap();

	Bytes::from(fs::read(&path).unwrap())
}

fn source(data: Bytes) -> Arc<BytesSource> {
	Arc::new(BytesSource::new(data))
}

/// Keeps every range read from the wrapped file.
struct RecordingSource {
	inner: BytesSource,
	reads: Mutex<Vec<Range<u64>>>,
}

impl RecordingSource {
	fn new(data: Bytes) -> Arc<Self> {
		Arc::new(Self {
			inner: BytesSource::new(data),
			reads: Mutex::new(Vec::new()),
		})
	}

	fn take_reads(&self) -> Vec<Range<u64>> {
		std::mem::take(&mut *self.reads.lock().unwrap())
	}
}

#[async_trait]
impl RangeSource for RecordingSource {
	async fn len(&self) -> io::Result<u64> {
		self.inner.len().await
	}

	async fn read_range(&self, range: Range<u64>) -> io::Result<Bytes> {
		self.reads.lock().unwrap().push(range.clone());
		self.inner.read_range(range).await
	}
}

fn read_csv(path: &Path) -> Vec<Vec<String>> {
	csv::ReaderBuilder::new()
		.has_headers(false)
		.from_path(path)
		.unwrap()
		.records()
		.map(|record| record.unwrap().iter().map(str::to_string).collect())
		.collect()
}

#[tokio::test]
async fn concatenated_pages_cover_every_row_once() {
	for (format, data) in [
		(ColumnarFormat::Parquet, parquet_bytes(103, 17)),
		(ColumnarFormat::Orc, orc_bytes(103)),
	] {
		let file = open(format, source(data)).await.unwrap();
		assert_eq!(file.meta().total_row_count, 103);

		let mut ids = Vec::new();
		for page in 1..=11 {
			let rows = file.read_page(page, 10).await.unwrap();
			assert_eq!(rows, file.read_page(page, 10).await.unwrap());
			ids.extend(rows.iter().map(|row| row["id"].as_i64().unwrap()));
		}

		assert_eq!(ids, (0..103).collect::<Vec<_>>(), "{format}");
		assert!(file.read_page(12, 10).await.unwrap().is_empty());
		assert!(file.read_page(0, 10).await.unwrap().is_empty());
		assert!(file.read_page(1, 0).await.unwrap().is_empty());
	}
}

#[tokio::test]
async fn orc_pages_cross_stripe_boundaries() {
	let file = open(ColumnarFormat::Orc, source(orc_bytes_with_stripes(60_000, 64 * 1024)))
		.await
		.unwrap();
	let stripes = file.row_groups().len();
	assert!(stripes > 2, "expected several stripes, got {stripes}");
	assert_eq!(file.meta().row_group_count, stripes);

	let mut ids = Vec::new();
	for page in 1..=9 {
		let rows = file.read_page(page, 7_000).await.unwrap();
		assert_eq!(rows.len(), if page < 9 { 7_000 } else { 4_000 });
		ids.extend(rows.iter().map(|row| row["id"].as_i64().unwrap()));
	}
	assert_eq!(ids, (0..60_000).collect::<Vec<_>>());
	assert!(file.read_page(10, 7_000).await.unwrap().is_empty());

	// a page straddling the first stripe boundary starts and ends where asked
	let boundary = file.row_groups()[1].first_row;
	let rows = file.read_page(1, boundary + 5).await.unwrap();
	assert_eq!(rows.len() as u64, boundary + 5);
	let rows = file.read_page(2, boundary - 3).await.unwrap();
	assert_eq!(rows[0]["id"].as_i64(), Some((boundary - 3) as i64));
	assert_eq!(rows.last().unwrap()["id"].as_i64(), Some((2 * (boundary - 3) - 1) as i64));
}

#[tokio::test]
async fn orc_pages_do_not_refetch_the_footer() {
	let data = orc_bytes_with_stripes(30_000, 64 * 1024);
	let length = data.len() as u64;
	let source = RecordingSource::new(data);

	let file = open(ColumnarFormat::Orc, source.clone()).await.unwrap();
	let opened = source.take_reads();
	assert!(opened.iter().any(|r| r.end == length));

	let rows = file.read_page(2, 7_000).await.unwrap();
	assert_eq!(rows[0]["id"].as_i64(), Some(7_000));
	let rows = file.read_page(5, 7_000).await.unwrap();
	assert_eq!(rows.len(), 2_000);

	// stripes lie before the footer, so no page read reaches the end of the file
	let paged = source.take_reads();
	assert!(!paged.is_empty());
	assert!(
		paged.iter().all(|r| r.end < length),
		"footer fetched again: {paged:?}"
	);
}

#[tokio::test]
async fn orc_footer_reports_schema_and_codec() {
	let file = open(ColumnarFormat::Orc, source(orc_bytes(5))).await.unwrap();

	assert_eq!(
		file.schema()
			.iter()
			.map(|c| c.name.as_str())
			.collect::<Vec<_>>(),
		vec!["id", "label", "score"]
	);
	assert_eq!(file.meta().total_row_count, 5);
	assert!(!file.meta().compression_type.is_empty());

	let rows = file.read_page(1, 5).await.unwrap();
	assert_eq!(rows[1]["label"], DataValue::from("comma, \"quoted\" 1"));
	assert_eq!(rows[2]["label"], DataValue::Null);
	assert_eq!(rows[4]["score"], DataValue::Float(1.0));
}

#[tokio::test]
async fn row_group_stream_restarts_from_the_beginning() {
	let file = open(ColumnarFormat::Parquet, source(parquet_bytes(40, 15)))
		.await
		.unwrap();

	let first: Vec<_> = row_group_stream(file.as_ref()).try_collect().await.unwrap();
	let second: Vec<_> = row_group_stream(file.as_ref()).try_collect().await.unwrap();

	assert_eq!(
		first.iter().map(Vec::len).collect::<Vec<_>>(),
		vec![15, 15, 10]
	);
	assert_eq!(first, second);
}

#[tokio::test]
async fn csv_export_round_trips_rows_and_columns() {
	let dir = TempDir::new().unwrap();
	let target = dir.path().join("out.csv");
	let file = open(ColumnarFormat::Parquet, source(parquet_bytes(250, 60)))
		.await
		.unwrap();

	let summary = export_csv(file.as_ref(), &target, &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(summary.rows, 250);
	assert_eq!(summary.row_groups, 5);

	let records = read_csv(&target);
	assert_eq!(records.len(), 251);
	assert_eq!(records[0], vec!["id", "label", "score"]);
	assert!(records.iter().all(|r| r.len() == 3));
	assert_eq!(records[2], vec!["1", "comma, \"quoted\" 1", "0.25"]);
	assert_eq!(records[3], vec!["2", "", "0.5"]);

	// only the final file remains
	assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn cancelled_export_leaves_no_artifact() {
	let dir = TempDir::new().unwrap();
	let target = dir.path().join("out.csv");
	let file = open(ColumnarFormat::Parquet, source(parquet_bytes(100, 10)))
		.await
		.unwrap();

	let cancel = CancellationToken::new();
	cancel.cancel();

	let result = export_csv(file.as_ref(), &target, &cancel).await;
	assert!(matches!(result, Err(ColumnarError::Cancelled)));
	assert!(!target.exists());
	assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn wrong_format_is_rejected_at_the_footer() {
	let parquet = parquet_bytes(10, 10);

	assert!(matches!(
		open(ColumnarFormat::Orc, source(parquet)).await,
		Err(ColumnarError::Format { .. })
	));
	assert!(matches!(
		open(ColumnarFormat::Parquet, source(orc_bytes(3))).await,
		Err(ColumnarError::Format { .. })
	));
}
