//! Columnar reads of remote files
//!
//! Decoders from `hx-columnar` pull byte ranges through [`RemoteSource`], so
//! only the footer and the row groups a page touches are ever transferred.

use std::{
	io,
	ops::Range,
	path::{Path, PathBuf},
	sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use hx_columnar::{
	avro, ColumnSchema, ColumnarError, ColumnarFile, ColumnarFormat, DataRow, DataValue, FileMeta,
	RangeSource,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
	error::{Error, Result},
	ops::Namespace,
};

/// Remote file seen as a [`RangeSource`].
///
/// Decoders only see `io::Error`s. The gateway error behind a failed read is
/// kept aside so a timeout or lost connection is reported as such rather
/// than as a decoding failure.
struct RemoteSource {
	namespace: Namespace,
	path: String,
	len: u64,
	failure: Arc<Mutex<Option<Error>>>,
}

#[async_trait]
impl RangeSource for RemoteSource {
	async fn len(&self) -> io::Result<u64> {
		Ok(self.len)
	}

	async fn read_range(&self, range: Range<u64>) -> io::Result<Bytes> {
		let expected = range.end.saturating_sub(range.start);
		let read = self
			.namespace
			.call(
				"read_range",
				&self.path,
				self.namespace.backend().read_range(&self.path, range),
			)
			.await;

		match read {
			Ok(bytes) if bytes.len() as u64 == expected => Ok(bytes),
			Ok(bytes) => Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				format!("short read of {} bytes, expected {expected}", bytes.len()),
			)),
			Err(e) => {
				let message = e.to_string();
				*self.failure.lock() = Some(e);
				Err(io::Error::new(io::ErrorKind::Other, message))
			}
		}
	}
}

/// A columnar file opened over the remote.
pub struct RemoteColumnar {
	file: Box<dyn ColumnarFile>,
	format: ColumnarFormat,
	path: String,
	failure: Arc<Mutex<Option<Error>>>,
}

impl RemoteColumnar {
	fn error(&self, operation: &'static str, err: ColumnarError) -> Error {
		columnar_error(&self.failure, self.format, operation, &self.path, err)
	}

	pub fn schema(&self) -> &[ColumnSchema] {
		self.file.schema()
	}

	pub fn meta(&self) -> &FileMeta {
		self.file.meta()
	}

	pub async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<DataRow>> {
		if page_size == 0 {
			return Err(Error::InvalidArgument("page size must be at least 1".into()));
		}

		self.file
			.read_page(page, page_size)
			.await
			.map_err(|e| self.error("read_page", e))
	}

	pub async fn export_csv(&self, target: &Path, cancel: &CancellationToken) -> Result<PathBuf> {
		let summary = hx_columnar::export_csv(self.file.as_ref(), target, cancel)
			.await
			.map_err(|e| match e {
				// decoding reads surface as I/O errors too, the stashed
				// remote failure tells them apart from local writes
				ColumnarError::Io { .. } => match self.failure.lock().take() {
					Some(remote) => remote,
					None => Error::local_io("export_csv", target, e),
				},
				other => self.error("export_csv", other),
			})?;

		info!(
			path = %self.path,
			target = %summary.path.display(),
			rows = summary.rows,
			"Exported CSV"
		);
		Ok(summary.path)
	}
}

fn columnar_error(
	failure: &Mutex<Option<Error>>,
	format: ColumnarFormat,
	operation: &'static str,
	path: &str,
	err: ColumnarError,
) -> Error {
	match failure.lock().take() {
		Some(remote) => remote,
		None => Error::from_columnar(format, operation, path, err),
	}
}

impl Namespace {
	/// Opens `target` as `format`, reading only its footer.
	pub async fn open_columnar(&self, format: ColumnarFormat, target: &str) -> Result<RemoteColumnar> {
		let node = self.stat(target).await?;
		if node.is_directory {
			return Err(Error::InvalidArgument(format!(
				"<path='{}'> is a directory",
				node.path
			)));
		}

		let failure = Arc::new(Mutex::new(None));
		let source = RemoteSource {
			namespace: self.clone(),
			path: node.path.clone(),
			len: node.length,
			failure: failure.clone(),
		};

		debug!(%format, path = %node.path, length = node.length, "Opening columnar file");
		let file = hx_columnar::open(format, Arc::new(source))
			.await
			.map_err(|e| columnar_error(&failure, format, "open", &node.path, e))?;

		Ok(RemoteColumnar {
			file,
			format,
			path: node.path,
			failure,
		})
	}

	pub async fn columnar_schema(&self, format: ColumnarFormat, target: &str) -> Result<Vec<ColumnSchema>> {
		Ok(self.open_columnar(format, target).await?.schema().to_vec())
	}

	pub async fn columnar_meta(&self, format: ColumnarFormat, target: &str) -> Result<FileMeta> {
		Ok(self.open_columnar(format, target).await?.meta().clone())
	}

	pub async fn columnar_row_count(&self, format: ColumnarFormat, target: &str) -> Result<u64> {
		Ok(self.columnar_meta(format, target).await?.total_row_count)
	}

	/// Rows of the 1-based `page`. Pages past the end are empty.
	pub async fn columnar_page(
		&self,
		format: ColumnarFormat,
		target: &str,
		page: u64,
		page_size: u64,
	) -> Result<Vec<DataRow>> {
		self.open_columnar(format, target)
			.await?
			.read_page(page, page_size)
			.await
	}

	/// Streams every row into the local CSV file `local_target`.
	pub async fn columnar_export_csv(
		&self,
		format: ColumnarFormat,
		target: &str,
		local_target: &Path,
		cancel: &CancellationToken,
	) -> Result<PathBuf> {
		self.open_columnar(format, target)
			.await?
			.export_csv(local_target, cancel)
			.await
	}

	/// Every record of an Avro container, decoded with its embedded schema.
	pub async fn avro_records(&self, target: &str) -> Result<Vec<DataValue>> {
		let node = self.stat(target).await?;
		let max = self.config().max_avro_bytes;
		if node.length > max {
			return Err(Error::InvalidArgument(format!(
				"<path='{}'> is {} bytes, more than the {max} bytes decoded in memory",
				node.path, node.length
			)));
		}

		let data = self.read_bytes(&node.path, node.length).await?;
		avro::decode(&data)
			.map_err(|e| Error::from_columnar(ColumnarFormat::Avro, "avro_content", &node.path, e))
	}
}
