use futures::{stream, StreamExt};
use tracing::info;

use crate::{
	domain::{path, FileNode},
	error::{Error, Result},
	ops::{BatchReport, Namespace},
};

/// Highest mode HDFS accepts: sticky bit plus `rwxrwxrwx`
pub const MAX_PERMISSION: u16 = 0o1777;

impl Namespace {
	/// Applies `bits` to every path, and with `recursive` to everything below
	/// the directories among them. Each path succeeds or fails on its own and
	/// nothing is rolled back.
	pub async fn set_permissions(
		&self,
		paths: &[String],
		bits: u16,
		recursive: bool,
	) -> Result<BatchReport> {
		if bits > MAX_PERMISSION {
			return Err(Error::InvalidArgument(format!(
				"permission {bits:o} is above {MAX_PERMISSION:o}"
			)));
		}

		let outcomes = stream::iter(paths.iter().cloned())
			.map(|target| async move { self.chmod_tree(target, bits, recursive).await })
			.buffered(self.config().batch_concurrency)
			.collect::<Vec<_>>()
			.await
			.into_iter()
			.flatten();

		let report = BatchReport::from_outcomes("set_permissions", outcomes);
		info!(
			bits = format!("{bits:o}"),
			recursive,
			failures = report.failures.len(),
			"Changed permissions"
		);
		Ok(report)
	}

	/// Outcome for `root` and, when walking, for every descendant.
	async fn chmod_tree(
		&self,
		root: String,
		bits: u16,
		recursive: bool,
	) -> Vec<(String, Result<()>)> {
		let root = match path::normalize(&root) {
			Ok(normalized) => normalized,
			Err(e) => return vec![(root, Err(e))],
		};

		let node = match self.stat(&root).await {
			Ok(node) => node,
			Err(e) => return vec![(root, Err(e))],
		};

		let mut outcomes = vec![(root.clone(), self.chmod(&root, bits).await)];
		if !(recursive && node.is_directory) {
			return outcomes;
		}

		// depth first, parents before children
		let mut pending = vec![root];
		while let Some(dir) = pending.pop() {
			let children = match self.list(&dir).await {
				Ok(children) => children,
				Err(e) => {
					outcomes.push((dir, Err(e)));
					continue;
				}
			};

			for FileNode {
				path, is_directory, ..
			} in children
			{
				outcomes.push((path.clone(), self.chmod(&path, bits).await));
				if is_directory {
					pending.push(path);
				}
			}
		}

		outcomes
	}

	async fn chmod(&self, target: &str, bits: u16) -> Result<()> {
		self.call(
			"set_permissions",
			target,
			self.backend().set_permission(target, bits),
		)
		.await
	}
}
