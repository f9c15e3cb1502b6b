//! Rename within a directory

pub mod validation;

use tracing::info;

use crate::{
	domain::path,
	error::{Error, Result},
	ops::Namespace,
};

impl Namespace {
	/// Renames `old_path` to the sibling `new_name`.
	///
	/// With `overwrite`, an existing destination file is replaced, and so is
	/// an empty destination directory when the source is a directory too.
	/// Replacing a populated directory or a file with a directory (or the
	/// reverse) is refused.
	pub async fn rename(&self, old_path: &str, new_name: &str, overwrite: bool) -> Result<bool> {
		validation::validate_filename(new_name)?;

		let from = path::normalize(old_path)?;
		if from == path::ROOT {
			return Err(Error::InvalidArgument("the root cannot be renamed".into()));
		}

		let to = path::join(path::parent(&from), new_name);
		if to == from {
			return Ok(true);
		}

		let source = self.stat(&from).await?;
		let replace = match self.try_stat(&to).await? {
			Some(_) if !overwrite => return Err(Error::AlreadyExists(to)),
			Some(existing) => {
				self.check_replaceable(source.is_directory, existing.is_directory, &to)
					.await?;
				true
			}
			None => false,
		};

		// the destination is swapped in the same namenode operation, a failed
		// rename leaves it untouched
		let renamed = self
			.call("rename", &from, self.backend().rename(&from, &to, replace))
			.await?;
		if !renamed {
			return Err(Error::Remote {
				operation: "rename",
				path: from,
				message: format!("the namenode refused the rename to {to}"),
			});
		}

		info!(from = %from, to = %to, replaced = replace, "Renamed");
		Ok(true)
	}

	async fn check_replaceable(&self, source_is_dir: bool, dest_is_dir: bool, to: &str) -> Result<()> {
		match (source_is_dir, dest_is_dir) {
			(false, false) => Ok(()),
			(true, true) => {
				let children = self
					.call("rename", to, self.backend().list_status(to))
					.await?;
				if children.is_empty() {
					Ok(())
				} else {
					Err(Error::InvalidArgument(format!(
						"rename destination is a non-empty directory <path='{to}'>"
					)))
				}
			}
			_ => Err(Error::InvalidArgument(format!(
				"rename source and destination differ in type <path='{to}'>"
			))),
		}
	}
}
