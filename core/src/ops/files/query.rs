use tracing::debug;

use crate::{
	domain::{path, FileNode},
	error::{Error, Result},
	ops::Namespace,
};

impl Namespace {
	/// Direct children of a directory, directories first, then by name.
	pub async fn list(&self, parent_path: &str) -> Result<Vec<FileNode>> {
		let dir = path::normalize(parent_path)?;
		let backend = self.backend();

		// Listing a file returns the file itself, so the type is checked first.
		let status = self.call("list", &dir, backend.file_status(&dir)).await?;
		if !status.is_directory {
			return Err(Error::NotADirectory(dir));
		}

		let mut nodes = self
			.call("list", &dir, backend.list_status(&dir))
			.await?
			.into_iter()
			.map(|raw| {
				let child = path::join(&dir, &raw.path_suffix);
				FileNode::from_raw(&child, raw)
			})
			.collect::<Vec<_>>();

		nodes.sort_by(|a, b| {
			b.is_directory
				.cmp(&a.is_directory)
				.then_with(|| a.name.cmp(&b.name))
		});

		debug!(path = %dir, count = nodes.len(), "Listed directory");
		Ok(nodes)
	}

	pub async fn stat(&self, target: &str) -> Result<FileNode> {
		let target = path::normalize(target)?;
		let raw = self
			.call("stat", &target, self.backend().file_status(&target))
			.await?;
		Ok(FileNode::from_raw(&target, raw))
	}

	/// Like [`Self::stat`], with a missing path reported as `None`.
	pub async fn try_stat(&self, target: &str) -> Result<Option<FileNode>> {
		match self.stat(target).await {
			Ok(node) => Ok(Some(node)),
			Err(Error::PathNotFound(_)) => Ok(None),
			Err(e) => Err(e),
		}
	}
}
