//! Helpers for absolute, slash separated remote paths.

use crate::error::{Error, Result};

pub const ROOT: &str = "/";

/// Canonical form of a remote path: leading `/`, no empty, `.` or trailing
/// segments. `..` is resolved and may not climb above the root.
pub fn normalize(path: &str) -> Result<String> {
	if path.contains('\0') {
		return Err(Error::InvalidArgument(format!(
			"path contains a NUL byte: {path:?}"
		)));
	}

	let mut segments: Vec<&str> = Vec::new();
	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				if segments.pop().is_none() {
					return Err(Error::InvalidArgument(format!(
						"path escapes the root: {path:?}"
					)));
				}
			}
			other => segments.push(other),
		}
	}

	Ok(format!("/{}", segments.join("/")))
}

pub fn join(parent: &str, name: &str) -> String {
	if parent.ends_with('/') {
		format!("{parent}{name}")
	} else {
		format!("{parent}/{name}")
	}
}

/// Parent of a normalized path; the root is its own parent.
pub fn parent(path: &str) -> &str {
	match path.rfind('/') {
		Some(0) | None => ROOT,
		Some(i) => &path[..i],
	}
}

/// Last segment of a normalized path; empty for the root.
pub fn file_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or_default()
}

/// Whether `path` is `ancestor` or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
	ancestor == ROOT
		|| path == ancestor
		|| path
			.strip_prefix(ancestor)
			.is_some_and(|rest| rest.starts_with('/'))
}
