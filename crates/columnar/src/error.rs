use std::{error::Error as StdError, io};

use thiserror::Error;

use crate::schema::ColumnarFormat;

pub type Result<T, E = ColumnarError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ColumnarError {
	#[error("malformed {format} file: {message}")]
	Format {
		format: ColumnarFormat,
		message: String,
	},
	#[error("unsupported {format} feature: {message}")]
	Unsupported {
		format: ColumnarFormat,
		message: String,
	},
	#[error("I/O error while {context}: {source}")]
	Io {
		context: String,
		#[source]
		source: io::Error,
	},
	#[error("export was cancelled")]
	Cancelled,
}

impl ColumnarError {
	pub fn format(format: ColumnarFormat, message: impl Into<String>) -> Self {
		Self::Format {
			format,
			message: message.into(),
		}
	}

	pub fn unsupported(format: ColumnarFormat, message: impl Into<String>) -> Self {
		Self::Unsupported {
			format,
			message: message.into(),
		}
	}

	pub fn io(context: impl Into<String>, source: io::Error) -> Self {
		Self::Io {
			context: context.into(),
			source,
		}
	}

	/// Sorts a decoder error into our taxonomy.
	///
	/// Walks the source chain: any I/O error underneath wins, so a failed range
	/// read is never reported as a corrupt file. Otherwise codec and encoding
	/// complaints become [`ColumnarError::Unsupported`] and everything else is
	/// treated as a malformed file.
	pub fn classify(format: ColumnarFormat, err: &(dyn StdError + 'static)) -> Self {
		let message = err.to_string();

		let mut current = Some(err);
		while let Some(e) = current {
			if let Some(io_err) = e.downcast_ref::<io::Error>() {
				return Self::io(
					format!("reading {format} data"),
					io::Error::new(io_err.kind(), io_err.to_string()),
				);
			}
			current = e.source();
		}

		if is_unsupported_message(&message) {
			Self::unsupported(format, message)
		} else {
			Self::format(format, message)
		}
	}
}

fn is_unsupported_message(message: &str) -> bool {
	let lower = message.to_ascii_lowercase();
	[
		"not supported",
		"unsupported",
		"not yet implemented",
		"nyi",
		"codec",
		"not enabled",
	]
	.iter()
	.any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Error)]
	#[error("outer failure")]
	struct Wrapper(#[source] io::Error);

	#[test]
	fn io_errors_anywhere_in_the_chain_win() {
		let err = Wrapper(io::Error::new(io::ErrorKind::TimedOut, "slow remote"));
		match ColumnarError::classify(ColumnarFormat::Parquet, &err) {
			ColumnarError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
			other => panic!("unexpected classification: {other:?}"),
		}
	}

	#[test]
	fn codec_messages_are_unsupported() {
		let err = io::Error::other("x");
		let plain: &(dyn StdError + 'static) = &err;
		assert!(matches!(
			ColumnarError::classify(ColumnarFormat::Orc, plain),
			ColumnarError::Io { .. }
		));

		#[derive(Debug, Error)]
		#[error("Disabled feature at compile time: lzo codec")]
		struct Codec;
		assert!(matches!(
			ColumnarError::classify(ColumnarFormat::Orc, &Codec),
			ColumnarError::Unsupported { .. }
		));

		#[derive(Debug, Error)]
		#[error("Invalid footer")]
		struct Footer;
		assert!(matches!(
			ColumnarError::classify(ColumnarFormat::Orc, &Footer),
			ColumnarError::Format { .. }
		));
	}
}
