//! Batch delete, to the trash or permanently

use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{debug, info};

use crate::{
	domain::path,
	error::{Error, Result},
	ops::{BatchReport, Namespace},
};

const TRASH_DIR: &str = ".Trash";
const CURRENT_CHECKPOINT: &str = "Current";
const TRASH_PERMISSION: u16 = 0o700;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
	/// Move under `<home>/.Trash/Current`, like `hdfs dfs -rm`
	Trash,
	/// Remove immediately, like `hdfs dfs -rm -skipTrash`
	Permanent,
}

impl Namespace {
	/// Deletes every path independently and reports the ones that failed.
	pub async fn delete(&self, paths: &[String], mode: DeleteMode) -> BatchReport {
		let outcomes = stream::iter(paths.iter().cloned())
			.map(|target| async move {
				let outcome = self.delete_one(&target, mode).await;
				(target, outcome)
			})
			.buffered(self.config().batch_concurrency)
			.collect::<Vec<_>>()
			.await;

		BatchReport::from_outcomes("delete", outcomes)
	}

	async fn delete_one(&self, target: &str, mode: DeleteMode) -> Result<()> {
		let target = path::normalize(target)?;
		if target == path::ROOT {
			return Err(Error::InvalidArgument("the root cannot be deleted".into()));
		}

		// fails with PathNotFound before anything is touched
		self.stat(&target).await?;

		match mode {
			DeleteMode::Permanent => self.remove_permanently(&target).await,
			DeleteMode::Trash => self.move_to_trash(&target).await.map(|_| ()),
		}
	}

	async fn remove_permanently(&self, target: &str) -> Result<()> {
		let removed = self
			.call("delete", target, self.backend().delete(target, true))
			.await?;
		if !removed {
			return Err(Error::PathNotFound(target.to_string()));
		}

		info!(path = target, "Deleted permanently");
		Ok(())
	}

	/// Moves `target` into the trash and returns where it landed. Anything
	/// already inside the trash is deleted for good.
	async fn move_to_trash(&self, target: &str) -> Result<String> {
		let home = self
			.call("delete", target, self.backend().home_directory())
			.await?;
		let trash_root = path::join(&home, TRASH_DIR);

		if path::is_within(target, &trash_root) {
			debug!(path = target, "Already in the trash, deleting permanently");
			self.remove_permanently(target).await?;
			return Ok(target.to_string());
		}
		if path::is_within(&trash_root, target) {
			return Err(Error::InvalidArgument(format!(
				"cannot move <path='{target}'> to the trash, it contains the trash"
			)));
		}

		let checkpoint = path::join(&trash_root, CURRENT_CHECKPOINT);
		let mut destination = format!("{checkpoint}{target}");
		let parent = path::parent(&destination).to_string();

		self.call(
			"delete",
			&parent,
			self.backend().mkdirs(&parent, TRASH_PERMISSION),
		)
		.await?;

		if self.try_stat(&destination).await?.is_some() {
			destination = format!("{destination}{}", Utc::now().timestamp_millis());
		}

		let moved = self
			.call("delete", target, self.backend().rename(target, &destination, false))
			.await?;
		if !moved {
			return Err(Error::Remote {
				operation: "delete",
				path: target.to_string(),
				message: format!("could not move to the trash at {destination}"),
			});
		}

		info!(path = target, trash = %destination, "Moved to trash");
		Ok(destination)
	}
}
