//! Remote filesystem backends
//!
//! Everything the gateway does to a cluster goes through [`HdfsBackend`]. The
//! trait mirrors the coarse primitives a NameNode offers: single path metadata
//! calls, whole file create, ranged reads, boolean returning delete and a
//! rename that can atomically replace its destination. Composite behaviour (trash, recursive permissions,
//! transfers) is built on top in [`crate::ops`].

use std::{fmt, io, ops::Range, pin::Pin};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use thiserror::Error;

pub mod memory;
pub mod webhdfs;

pub use memory::MemoryBackend;
pub use webhdfs::WebHdfsBackend;

use crate::error::Error;

/// Body of an upload or download.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// Metadata of one path, as reported by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFileStatus {
	/// Name relative to the listed directory, empty for a direct stat
	pub path_suffix: String,
	pub is_directory: bool,
	pub length: u64,
	pub owner: String,
	pub group: String,
	pub permission: u16,
	pub modification_time: i64,
	pub access_time: i64,
	pub block_size: u64,
	pub replication: u16,
	pub file_id: Option<u64>,
	pub children_num: Option<u64>,
	pub storage_policy: Option<u8>,
	pub symlink: Option<String>,
	pub acl_bit: bool,
	pub enc_bit: bool,
	pub ec_bit: bool,
}

/// ACL status as reported by the remote: extended entries only, as spec strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAclStatus {
	pub owner: String,
	pub group: String,
	pub sticky: bool,
	pub permission: u16,
	pub entries: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
	NotFound,
	AlreadyExists,
	PermissionDenied,
	NotADirectory,
	InvalidArgument,
	Connection,
	Timeout,
	Other,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
	pub kind: BackendErrorKind,
	pub message: String,
}

impl BackendError {
	pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	pub fn not_found(path: &str) -> Self {
		Self::new(
			BackendErrorKind::NotFound,
			format!("File does not exist: {path}"),
		)
	}

	/// Attaches the operation and path the failure happened on.
	pub fn into_error(self, operation: &'static str, path: &str) -> Error {
		let path = path.to_string();
		match self.kind {
			BackendErrorKind::NotFound => Error::PathNotFound(path),
			BackendErrorKind::AlreadyExists => Error::AlreadyExists(path),
			BackendErrorKind::NotADirectory => Error::NotADirectory(path),
			BackendErrorKind::PermissionDenied => Error::PermissionDenied {
				operation,
				path,
				message: self.message,
			},
			BackendErrorKind::InvalidArgument => {
				Error::InvalidArgument(format!("{operation} <path='{path}'>: {}", self.message))
			}
			BackendErrorKind::Connection => Error::Connection {
				url: path,
				message: format!("{operation}: {}", self.message),
			},
			BackendErrorKind::Timeout => Error::Timeout {
				operation,
				path,
				after: Default::default(),
			},
			BackendErrorKind::Other => Error::Remote {
				operation,
				path,
				message: self.message,
			},
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
	WebHdfs,
	Memory,
}

/// Primitive operations of a remote HDFS namespace.
///
/// Paths are absolute and normalized. Like HDFS itself, a plain `rename` and
/// `delete` report "nothing happened" as `Ok(false)` rather than an error.
#[async_trait]
pub trait HdfsBackend: Send + Sync + fmt::Debug {
	async fn file_status(&self, path: &str) -> Result<RawFileStatus, BackendError>;

	/// Children of a directory. Listing a file yields the file itself.
	async fn list_status(&self, path: &str) -> Result<Vec<RawFileStatus>, BackendError>;

	/// Creates `path` and any missing parents.
	async fn mkdirs(&self, path: &str, permission: u16) -> Result<bool, BackendError>;

	/// Creates a file from `data`, creating missing parents.
	async fn create(
		&self,
		path: &str,
		data: ByteStream,
		overwrite: bool,
	) -> Result<(), BackendError>;

	async fn read_range(&self, path: &str, range: Range<u64>) -> Result<Bytes, BackendError>;

	/// Streams the whole file.
	async fn open(&self, path: &str) -> Result<ByteStream, BackendError>;

	/// Moves `from` to `to`.
	///
	/// Without `overwrite` this is the classic rename: a directory destination
	/// receives `from` as a child and refusals are `Ok(false)`. With
	/// `overwrite` it is HDFS `rename2`: an existing destination of the same
	/// type (empty, if a directory) is replaced in the same metadata operation
	/// and refusals are errors.
	async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<bool, BackendError>;

	async fn delete(&self, path: &str, recursive: bool) -> Result<bool, BackendError>;

	async fn set_permission(&self, path: &str, permission: u16) -> Result<(), BackendError>;

	async fn acl_status(&self, path: &str) -> Result<RawAclStatus, BackendError>;

	/// Merges the comma separated ACL `spec` into the path's ACL.
	async fn modify_acl_entries(&self, path: &str, spec: &str) -> Result<(), BackendError>;

	/// Removes the entries named by `spec` (permissions omitted).
	async fn remove_acl_entries(&self, path: &str, spec: &str) -> Result<(), BackendError>;

	async fn remove_default_acl(&self, path: &str) -> Result<(), BackendError>;

	async fn remove_acl(&self, path: &str) -> Result<(), BackendError>;

	async fn home_directory(&self) -> Result<String, BackendError>;

	/// Releases the connection. Further calls may fail.
	async fn close(&self) -> Result<(), BackendError> {
		Ok(())
	}

	fn backend_type(&self) -> BackendType;
}
