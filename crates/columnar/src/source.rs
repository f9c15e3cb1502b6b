use std::{io, ops::Range};

use async_trait::async_trait;
use bytes::Bytes;

/// Random access to the raw bytes of one file.
///
/// Implementations must be cheap to call repeatedly: decoders issue many small
/// reads (footer, postscript, individual column chunks) rather than one big one.
#[async_trait]
pub trait RangeSource: Send + Sync + 'static {
	/// Total length of the file in bytes.
	async fn len(&self) -> io::Result<u64>;

	/// Reads exactly `range`. Reading past the end is an error.
	async fn read_range(&self, range: Range<u64>) -> io::Result<Bytes>;
}

/// A file that is already in memory.
#[derive(Debug, Clone)]
pub struct BytesSource(Bytes);

impl BytesSource {
	pub fn new(data: impl Into<Bytes>) -> Self {
		Self(data.into())
	}
}

#[async_trait]
impl RangeSource for BytesSource {
	async fn len(&self) -> io::Result<u64> {
		Ok(self.0.len() as u64)
	}

	async fn read_range(&self, range: Range<u64>) -> io::Result<Bytes> {
		let len = self.0.len() as u64;
		if range.start > range.end || range.end > len {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				format!(
					"range {}..{} is outside of a {len} byte file",
					range.start, range.end
				),
			));
		}

		Ok(self.0.slice(range.start as usize..range.end as usize))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn bytes_source_slices_and_rejects_overreads() {
		let source = BytesSource::new(&b"0123456789"[..]);

		assert_eq!(source.len().await.unwrap(), 10);
		assert_eq!(&source.read_range(2..5).await.unwrap()[..], b"234");
		assert_eq!(
			source.read_range(8..12).await.unwrap_err().kind(),
			io::ErrorKind::UnexpectedEof
		);
	}
}
