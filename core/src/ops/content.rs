//! Text preview and whole file text access

use std::io;

use bytes::Bytes;
use futures::stream;
use hx_columnar::ColumnarFormat;
use tracing::{debug, info};

use crate::{
	domain::{path, FileContent, FileNode, PreviewResult},
	error::{Error, Result},
	filetype,
	ops::Namespace,
};

impl Namespace {
	/// Reads at most `preview_bytes` from the start of a file. ORC, Parquet
	/// and Avro containers are flagged and not decoded as text.
	pub async fn preview(&self, target: &str) -> Result<PreviewResult> {
		let node = self.regular_file(target).await?;

		let limit = self.config().preview_bytes.max(filetype::signature_len() as u64);
		let end = node.length.min(limit);
		let head = self.read_bytes(&node.path, end).await?;

		let format = filetype::sniff(&head);
		let truncated = end < node.length;
		let content = match format {
			Some(_) => String::new(),
			None => decode_prefix(&head, truncated),
		};

		debug!(path = %node.path, ?format, bytes = head.len(), "Previewed");
		Ok(PreviewResult {
			length: node.length,
			content,
			is_orc: format == Some(ColumnarFormat::Orc),
			is_parquet: format == Some(ColumnarFormat::Parquet),
			is_avro: format == Some(ColumnarFormat::Avro),
			truncated,
		})
	}

	/// Whole content of a text file, for editing.
	pub async fn read_text(&self, target: &str) -> Result<FileContent> {
		let node = self.regular_file(target).await?;
		let max = self.config().max_text_bytes;
		if node.length > max {
			return Err(Error::InvalidArgument(format!(
				"<path='{}'> is {} bytes, more than the {max} bytes allowed for editing",
				node.path, node.length
			)));
		}

		let data = self.read_bytes(&node.path, node.length).await?;
		Ok(FileContent {
			length: node.length,
			content: String::from_utf8_lossy(&data).into_owned(),
		})
	}

	/// Replaces the content of `target`, creating it if needed. The new
	/// content is written to a hidden sibling first and then atomically
	/// renamed over the original, whose permission bits are kept.
	pub async fn write_text(&self, target: &str, content: &str) -> Result<bool> {
		let target = path::normalize(target)?;
		let existing = self.try_stat(&target).await?;
		if existing.as_ref().is_some_and(|n| n.is_directory) {
			return Err(Error::InvalidArgument(format!(
				"cannot write text to the directory <path='{target}'>"
			)));
		}

		let staging = Self::staging_path(&target);
		let body = Bytes::copy_from_slice(content.as_bytes());
		let written = self
			.call(
				"write_content",
				&staging,
				self.backend().create(
					&staging,
					Box::pin(stream::once(async move { Ok::<_, io::Error>(body) })),
					false,
				),
			)
			.await;
		if let Err(e) = written {
			self.discard(&staging).await;
			return Err(e);
		}

		if let Err(e) = self.replace_with(&staging, &target, existing.as_ref()).await {
			self.discard(&staging).await;
			return Err(e);
		}

		info!(path = %target, bytes = content.len(), "Wrote text content");
		Ok(true)
	}

	/// Moves the staged content over `target` in one namenode operation, so a
	/// failure leaves the original in place.
	async fn replace_with(&self, staging: &str, target: &str, existing: Option<&FileNode>) -> Result<()> {
		let backend = self.backend();

		if let Some(existing) = existing {
			self.call("write_content", staging, backend.set_permission(staging, existing.permission_bits))
				.await?;
		}

		let replaced = self
			.call(
				"write_content",
				target,
				backend.rename(staging, target, existing.is_some()),
			)
			.await?;
		if !replaced {
			return Err(Error::Remote {
				operation: "write_content",
				path: target.to_string(),
				message: "the namenode refused to move the new content into place".into(),
			});
		}
		Ok(())
	}

	async fn regular_file(&self, target: &str) -> Result<FileNode> {
		let node = self.stat(target).await?;
		if node.is_directory {
			return Err(Error::InvalidArgument(format!(
				"<path='{}'> is a directory",
				node.path
			)));
		}
		Ok(node)
	}

	/// First `len` bytes of a file.
	pub(crate) async fn read_bytes(&self, target: &str, len: u64) -> Result<Bytes> {
		if len == 0 {
			return Ok(Bytes::new());
		}
		self.call("read", target, self.backend().read_range(target, 0..len))
			.await
	}
}

/// Lossy UTF-8 decoding that drops a character cut in half by truncation.
fn decode_prefix(bytes: &[u8], truncated: bool) -> String {
	match std::str::from_utf8(bytes) {
		Ok(text) => text.to_string(),
		Err(e) if truncated && e.error_len().is_none() => {
			String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
		}
		Err(_) => String::from_utf8_lossy(bytes).into_owned(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncated_characters_are_dropped() {
		let text = "héllo".as_bytes();
		// cut inside the two byte 'é'
		assert_eq!(decode_prefix(&text[..2], true), "h");
		assert_eq!(decode_prefix(&text[..2], false), "h\u{fffd}");
		assert_eq!(decode_prefix(text, false), "héllo");
	}
}
