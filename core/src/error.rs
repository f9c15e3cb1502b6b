//! Error taxonomy shared by every gateway operation.

use std::{fmt::Display, path::Path, time::Duration};

use hx_columnar::{ColumnarError, ColumnarFormat};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;
use tracing::error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure a caller can observe.
///
/// `Clone` so one failed connection attempt can be handed to every caller that
/// was waiting on it; causes are therefore kept as rendered messages.
#[derive(Debug, Clone, Error, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Error {
	#[error("connection profile not found: <id='{0}'>")]
	ProfileNotFound(String),

	#[strum(serialize = "CONNECTION_ERROR")]
	#[error("failed to connect to <url='{url}'>: {message}")]
	Connection { url: String, message: String },

	#[error("{operation} timed out after {after:?}: <path='{path}'>")]
	Timeout {
		operation: &'static str,
		path: String,
		after: Duration,
	},

	#[error("path not found: <path='{0}'>")]
	PathNotFound(String),

	#[error("not a directory: <path='{0}'>")]
	NotADirectory(String),

	#[error("already exists: <path='{0}'>")]
	AlreadyExists(String),

	#[error("permission denied during {operation}: <path='{path}'>: {message}")]
	PermissionDenied {
		operation: &'static str,
		path: String,
		message: String,
	},

	#[error("invalid ACL entry: {0}")]
	InvalidAclEntry(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[strum(serialize = "FORMAT_ERROR")]
	#[error("malformed {format} file <path='{path}'>: {message}")]
	Format {
		format: ColumnarFormat,
		path: String,
		message: String,
	},

	#[error("unsupported {format} feature in <path='{path}'>: {message}")]
	UnsupportedFormat {
		format: ColumnarFormat,
		path: String,
		message: String,
	},

	#[strum(serialize = "IO_ERROR")]
	#[error("I/O error during {operation}: <path='{path}'>: {message}")]
	Io {
		operation: &'static str,
		path: String,
		message: String,
	},

	#[strum(serialize = "REMOTE_ERROR")]
	#[error("remote error during {operation}: <path='{path}'>: {message}")]
	Remote {
		operation: &'static str,
		path: String,
		message: String,
	},

	#[error("operation cancelled: <path='{0}'>")]
	Cancelled(String),
}

impl Error {
	/// Stable machine readable code, e.g. `PATH_NOT_FOUND`.
	pub fn code(&self) -> &'static str {
		self.into()
	}

	/// Failure on the local filesystem side of a transfer or export.
	pub fn local_io(
		operation: &'static str,
		path: impl AsRef<Path>,
		source: impl Display,
	) -> Self {
		Self::Io {
			operation,
			path: path.as_ref().display().to_string(),
			message: source.to_string(),
		}
	}

	pub(crate) fn from_columnar(
		format: ColumnarFormat,
		operation: &'static str,
		path: &str,
		err: ColumnarError,
	) -> Self {
		match err {
			ColumnarError::Format { message, .. } => Self::Format {
				format,
				path: path.to_string(),
				message,
			},
			ColumnarError::Unsupported { message, .. } => Self::UnsupportedFormat {
				format,
				path: path.to_string(),
				message,
			},
			ColumnarError::Io { context, source } => Self::Io {
				operation,
				path: path.to_string(),
				message: format!("{context}: {source}"),
			},
			ColumnarError::Cancelled => Self::Cancelled(path.to_string()),
		}
	}
}

/// Serialisable form of an [`Error`] handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
	pub code: String,
	pub message: String,
}

impl From<&Error> for ErrorRecord {
	fn from(err: &Error) -> Self {
		Self {
			code: err.code().to_string(),
			message: err.to_string(),
		}
	}
}

impl From<Error> for ErrorRecord {
	fn from(err: Error) -> Self {
		Self::from(&err)
	}
}

/// Report an error with tracing
pub fn report_error<T>(context: &str, res: &Result<T>) {
	if let Err(e) = res {
		error!(code = e.code(), "{context}: {e:#}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		assert_eq!(Error::ProfileNotFound("p".into()).code(), "PROFILE_NOT_FOUND");
		assert_eq!(
			Error::Connection {
				url: "http://nn".into(),
				message: "refused".into()
			}
			.code(),
			"CONNECTION_ERROR"
		);
		assert_eq!(Error::NotADirectory("/f".into()).code(), "NOT_A_DIRECTORY");
		assert_eq!(Error::InvalidAclEntry("x".into()).code(), "INVALID_ACL_ENTRY");
		assert_eq!(
			Error::Format {
				format: ColumnarFormat::Orc,
				path: "/x.orc".into(),
				message: "bad".into()
			}
			.code(),
			"FORMAT_ERROR"
		);
		assert_eq!(Error::Cancelled("/x".into()).code(), "CANCELLED");
	}

	#[test]
	fn records_carry_path_context() {
		let record = ErrorRecord::from(Error::PathNotFound("/data/missing".into()));
		assert_eq!(record.code, "PATH_NOT_FOUND");
		assert!(record.message.contains("/data/missing"));
	}
}
