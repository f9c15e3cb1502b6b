use std::io;

use bytes::Bytes;
use futures::stream;
use tracing::info;

use crate::{error::Result, ops::Namespace};

const DIRECTORY_PERMISSION: u16 = 0o775;

impl Namespace {
	/// Creates the directory `name` inside `parent_path`.
	pub async fn mkdir(&self, parent_path: &str, name: &str) -> Result<bool> {
		let target = self.new_child_path(parent_path, name).await?;

		let created = self
			.call(
				"mkdir",
				&target,
				self.backend().mkdirs(&target, DIRECTORY_PERMISSION),
			)
			.await?;

		if created {
			info!(path = %target, "Created directory");
		}
		Ok(created)
	}

	/// Creates the empty file `name` inside `parent_path`.
	pub async fn touch(&self, parent_path: &str, name: &str) -> Result<bool> {
		let target = self.new_child_path(parent_path, name).await?;

		self.call(
			"touch",
			&target,
			self.backend().create(&target, Box::pin(stream::empty::<io::Result<Bytes>>()), false),
		)
		.await?;

		info!(path = %target, "Created empty file");
		Ok(true)
	}
}
