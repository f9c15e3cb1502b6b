//! File operations - queries and actions on the remote namespace

pub mod create;
pub mod delete;
pub mod permissions;
pub mod query;
pub mod rename;
pub mod transfer;

use super::Namespace;
use crate::{
	domain::path,
	error::{Error, Result},
};

impl Namespace {
	/// Path of a new entry `name` under the directory `parent`, checked to be
	/// free.
	pub(crate) async fn new_child_path(&self, parent: &str, name: &str) -> Result<String> {
		rename::validation::validate_filename(name)?;

		let dir = path::normalize(parent)?;
		if !self.stat(&dir).await?.is_directory {
			return Err(Error::NotADirectory(dir));
		}

		let target = path::join(&dir, name);
		if self.try_stat(&target).await?.is_some() {
			return Err(Error::AlreadyExists(target));
		}

		Ok(target)
	}

	/// Hidden sibling used while a file is being written.
	pub(crate) fn staging_path(target: &str) -> String {
		path::join(
			path::parent(target),
			&format!(".{}.{}._COPYING_", path::file_name(target), uuid::Uuid::new_v4()),
		)
	}

	/// Best effort removal of a staging file after a failed write.
	pub(crate) async fn discard(&self, staging: &str) {
		if let Err(e) = self
			.call("delete", staging, self.backend().delete(staging, false))
			.await
		{
			tracing::warn!(path = staging, %e, "Failed to remove staging file");
		}
	}
}
