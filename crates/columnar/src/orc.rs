//! ORC decoding over a [`RangeSource`].
//!
//! The file tail is `<footer> <postscript> <u8 postscript length>`. The
//! postscript is a tiny protobuf message holding the codec and the `ORC` magic;
//! it is parsed here directly so that a truncated or foreign file is rejected
//! before the decoder is involved. Stripe layout and schema come from
//! `orc-rust`.

use std::{
	io,
	sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future::BoxFuture, FutureExt, StreamExt};
use orc_rust::{reader::AsyncChunkReader, ArrowReaderBuilder};
use tracing::debug;

use crate::{
	convert::batch_to_rows,
	error::{ColumnarError, Result},
	paging::{spans_from_counts, PageWindow, RowGroupSpan},
	reader::ColumnarFile,
	schema::{ColumnSchema, ColumnarFormat, FileMeta},
	source::RangeSource,
	value::DataRow,
};

const MAGIC: &[u8; 3] = b"ORC";
/// Upper bound of a postscript, its length is stored in a single byte.
const MAX_POSTSCRIPT_SIZE: u64 = 255;
const BATCH_SIZE: usize = 8192;
const FORMAT: ColumnarFormat = ColumnarFormat::Orc;

pub struct OrcFile {
	source: Arc<dyn RangeSource>,
	file_length: u64,
	schema: Vec<ColumnSchema>,
	meta: FileMeta,
	row_groups: Vec<RowGroupSpan>,
	stripe_offsets: Vec<u64>,
	tail: TailCache,
}

impl OrcFile {
	pub async fn open(source: Arc<dyn RangeSource>) -> Result<Self> {
		let file_length = source
			.len()
			.await
			.map_err(|e| ColumnarError::io("reading ORC file length", e))?;

		let postscript = read_postscript(source.as_ref(), file_length).await?;

		let tail = TailCache::default();
		let builder = ArrowReaderBuilder::try_new_async(ChunkReader::recording(
			source.clone(),
			file_length,
			tail.clone(),
		))
		.await
			.map_err(|e| ColumnarError::classify(FORMAT, &e))?;

		let file_metadata = builder.file_metadata();
		let stripes = file_metadata.stripe_metadatas();
		let row_groups = spans_from_counts(stripes.iter().map(|s| s.number_of_rows()));
		let stripe_offsets = stripes.iter().map(|s| s.offset()).collect();
		let total_row_count = file_metadata.number_of_rows();

		let schema = ColumnSchema::from_arrow(&builder.build_async().schema());

		let meta = FileMeta {
			format: FORMAT,
			total_row_count,
			compression_type: postscript.compression.to_string(),
			row_group_count: row_groups.len(),
			file_length,
			created_by: None,
		};

		debug!(
			rows = meta.total_row_count,
			stripes = meta.row_group_count,
			compression = %meta.compression_type,
			"Opened ORC file"
		);

		Ok(Self {
			source,
			file_length,
			schema,
			meta,
			row_groups,
			stripe_offsets,
			tail,
		})
	}
}

#[async_trait]
impl ColumnarFile for OrcFile {
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
		let (Some(first), Some(last)) = (
			self.stripe_offsets.get(window.groups.start),
			window
				.groups
				.end
				.checked_sub(1)
				.and_then(|i| self.stripe_offsets.get(i)),
		) else {
			return Ok(Vec::new());
		};

		// A stripe is selected when its first byte falls inside the range, so
		// ending one byte past the last wanted stripe's start selects exactly
		// the window.
		let byte_range = *first as usize..*last as usize + 1;

		// metadata is decoded again from the tail kept at open, no footer read
		// reaches the source
		let builder = ArrowReaderBuilder::try_new_async(ChunkReader::cached(
			self.source.clone(),
			self.file_length,
			self.tail.clone(),
		))
		.await
		.map_err(|e| ColumnarError::classify(FORMAT, &e))?;
		let mut stream = Box::pin(
			builder
				.with_batch_size(BATCH_SIZE)
				.with_file_byte_range(byte_range)
				.build_async(),
		);

		let mut skip = window.skip as usize;
		let mut remaining = window.take as usize;
		let mut rows = Vec::with_capacity(remaining);

		while remaining > 0 {
			let Some(batch) = stream.next().await else {
				break;
			};
			let batch = batch.map_err(|e| ColumnarError::classify(FORMAT, &e))?;

			if skip >= batch.num_rows() {
				skip -= batch.num_rows();
				continue;
			}

			let len = remaining.min(batch.num_rows() - skip);
			rows.extend(batch_to_rows(FORMAT, &batch.slice(skip, len))?);
			skip = 0;
			remaining -= len;
		}

		Ok(rows)
	}
}

/// The parts of the postscript this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostScript {
	pub footer_length: u64,
	pub compression: &'static str,
}

async fn read_postscript(source: &dyn RangeSource, file_length: u64) -> Result<PostScript> {
	if file_length <= MAGIC.len() as u64 + 1 {
		return Err(ColumnarError::format(
			FORMAT,
			format!("file of {file_length} bytes is too small to be ORC"),
		));
	}

	let head = source
		.read_range(0..MAGIC.len() as u64)
		.await
		.map_err(|e| ColumnarError::io("reading ORC header", e))?;
	if head.as_ref() != MAGIC {
		return Err(ColumnarError::format(FORMAT, "missing leading ORC magic"));
	}

	let tail_length = file_length.min(MAX_POSTSCRIPT_SIZE + 1);
	let tail = source
		.read_range(file_length - tail_length..file_length)
		.await
		.map_err(|e| ColumnarError::io("reading ORC postscript", e))?;

	parse_postscript(&tail)
}

/// Parses the postscript out of the last bytes of a file.
pub fn parse_postscript(tail: &[u8]) -> Result<PostScript> {
	let (&length, rest) = tail
		.split_last()
		.ok_or_else(|| ColumnarError::format(FORMAT, "empty file tail"))?;
	let length = usize::from(length);
	if length == 0 || length > rest.len() {
		return Err(ColumnarError::format(
			FORMAT,
			format!("postscript length {length} does not fit in the file"),
		));
	}

	let mut message = &rest[rest.len() - length..];
	let mut footer_length = None;
	let mut compression = 0;
	let mut magic_ok = false;

	while !message.is_empty() {
		let key = read_varint(&mut message)?;
		let (field, wire_type) = (key >> 3, key & 0x7);
		match (field, wire_type) {
			(1, 0) => footer_length = Some(read_varint(&mut message)?),
			(2, 0) => compression = read_varint(&mut message)?,
			(8000, 2) => magic_ok = read_length_delimited(&mut message)? == MAGIC,
			(_, 0) => {
				read_varint(&mut message)?;
			}
			(_, 2) => {
				read_length_delimited(&mut message)?;
			}
			(_, wire_type) => {
				return Err(ColumnarError::format(
					FORMAT,
					format!("unexpected wire type {wire_type} in postscript"),
				))
			}
		}
	}

	if !magic_ok {
		return Err(ColumnarError::format(FORMAT, "missing ORC magic in postscript"));
	}

	let compression = match compression {
		0 => "NONE",
		1 => "ZLIB",
		2 => "SNAPPY",
		3 => "LZO",
		4 => "LZ4",
		5 => "ZSTD",
		other => {
			return Err(ColumnarError::unsupported(
				FORMAT,
				format!("unknown compression kind {other}"),
			))
		}
	};

	Ok(PostScript {
		footer_length: footer_length
			.ok_or_else(|| ColumnarError::format(FORMAT, "postscript has no footer length"))?,
		compression,
	})
}

fn read_varint(buf: &mut &[u8]) -> Result<u64> {
	let mut value = 0u64;
	for shift in (0..64).step_by(7) {
		let (&byte, rest) = buf
			.split_first()
			.ok_or_else(|| ColumnarError::format(FORMAT, "truncated varint in postscript"))?;
		*buf = rest;
		value |= u64::from(byte & 0x7f) << shift;
		if byte & 0x80 == 0 {
			return Ok(value);
		}
	}
	Err(ColumnarError::format(FORMAT, "varint too long in postscript"))
}

fn read_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
	let len = usize::try_from(read_varint(buf)?)
		.map_err(|_| ColumnarError::format(FORMAT, "field length overflow"))?;
	let data: &'a [u8] = *buf;
	if len > data.len() {
		return Err(ColumnarError::format(FORMAT, "truncated field in postscript"));
	}
	let (field, rest) = data.split_at(len);
	*buf = rest;
	Ok(field)
}

/// File tail reads made while the metadata was first parsed, keyed by
/// `(offset, length)`.
#[derive(Clone, Default)]
struct TailCache(Arc<Mutex<Vec<(u64, u64, Bytes)>>>);

impl TailCache {
	fn get(&self, offset: u64, length: u64) -> Option<Bytes> {
		self.0
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.find(|(o, l, _)| *o == offset && *l == length)
			.map(|(_, _, bytes)| bytes.clone())
	}

	fn insert(&self, offset: u64, length: u64, bytes: Bytes) {
		self.0
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push((offset, length, bytes));
	}
}

/// Adapts a [`RangeSource`] to orc-rust's async reader.
struct ChunkReader {
	source: Arc<dyn RangeSource>,
	length: u64,
	tail: TailCache,
	record: bool,
}

impl ChunkReader {
	/// Reader whose every read is kept in `tail`.
	fn recording(source: Arc<dyn RangeSource>, length: u64, tail: TailCache) -> Self {
		Self {
			source,
			length,
			tail,
			record: true,
		}
	}

	/// Reader answering reads already in `tail` from memory.
	fn cached(source: Arc<dyn RangeSource>, length: u64, tail: TailCache) -> Self {
		Self {
			source,
			length,
			tail,
			record: false,
		}
	}
}

impl AsyncChunkReader for ChunkReader {
	fn len(&mut self) -> BoxFuture<'_, io::Result<u64>> {
		let length = self.length;
		async move { Ok(length) }.boxed()
	}

	fn get_bytes(
		&mut self,
		offset_from_start: u64,
		length: u64,
	) -> BoxFuture<'_, io::Result<Bytes>> {
		let source = self.source.clone();
		let tail = self.tail.clone();
		let record = self.record;
		async move {
			if let Some(bytes) = tail.get(offset_from_start, length) {
				return Ok(bytes);
			}

			let bytes = source
				.read_range(offset_from_start..offset_from_start + length)
				.await?;
			if record {
				tail.insert(offset_from_start, length, bytes.clone());
			}
			Ok(bytes)
		}
		.boxed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn postscript(fields: &[u8]) -> Vec<u8> {
		let mut tail = b"ORC...footer bytes...".to_vec();
		tail.extend_from_slice(fields);
		tail.push(fields.len() as u8);
		tail
	}

	// footerLength=42, compression=ZSTD, magic="ORC"
	const ZSTD_POSTSCRIPT: &[u8] = &[0x08, 42, 0x10, 5, 0x82, 0xf4, 0x03, 3, b'O', b'R', b'C'];

	#[test]
	fn postscript_fields_are_decoded() {
		assert_eq!(
			parse_postscript(&postscript(ZSTD_POSTSCRIPT)).unwrap(),
			PostScript {
				footer_length: 42,
				compression: "ZSTD"
			}
		);
	}

	#[test]
	fn unknown_fields_are_skipped() {
		// compressionBlockSize=262144 and a packed version list before the magic
		let mut fields = vec![0x08, 7, 0x18, 0x80, 0x80, 0x10, 0x22, 2, 0, 12];
		fields.extend_from_slice(&[0x82, 0xf4, 0x03, 3, b'O', b'R', b'C']);

		let ps = parse_postscript(&postscript(&fields)).unwrap();
		assert_eq!(ps.footer_length, 7);
		assert_eq!(ps.compression, "NONE");
	}

	#[test]
	fn foreign_tails_are_rejected() {
		assert!(matches!(
			parse_postscript(b"PAR1"),
			Err(ColumnarError::Format { .. })
		));
		assert!(matches!(
			parse_postscript(&postscript(&[0x08, 42, 0x10, 5])),
			Err(ColumnarError::Format { .. })
		));
		assert!(matches!(
			parse_postscript(&postscript(&[0x08, 42, 0x10, 9, 0x82, 0xf4, 0x03, 3, b'O', b'R', b'C'])),
			Err(ColumnarError::Unsupported { .. })
		));
		assert!(matches!(parse_postscript(&[]), Err(ColumnarError::Format { .. })));
	}
}
