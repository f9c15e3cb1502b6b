//! Uploads and downloads between the local filesystem and the cluster
//!
//! Every transfer writes to a hidden staging name first and renames it into
//! place once complete, so a destination that exists is always whole.
//! Staging artifacts are removed on failure and on cancellation.

use std::{
	io,
	path::{Path, PathBuf},
};

use futures::StreamExt;
use tokio::{
	fs,
	io::{AsyncWriteExt, BufWriter},
	time,
};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
	backend::ByteStream,
	domain::{path, FileNode},
	error::{Error, Result},
	ops::Namespace,
};

impl Namespace {
	/// Copies the local file `local_path` into the remote directory
	/// `parent_path`, keeping its name. Returns the remote path.
	pub async fn upload(
		&self,
		parent_path: &str,
		local_path: &Path,
		cancel: &CancellationToken,
	) -> Result<String> {
		let metadata = fs::metadata(local_path)
			.await
			.map_err(|e| Error::local_io("upload", local_path, e))?;
		if !metadata.is_file() {
			return Err(Error::InvalidArgument(format!(
				"only regular files can be uploaded <path='{}'>",
				local_path.display()
			)));
		}

		let name = local_path
			.file_name()
			.and_then(|n| n.to_str())
			.ok_or_else(|| {
				Error::InvalidArgument(format!(
					"local file name is not valid UTF-8 <path='{}'>",
					local_path.display()
				))
			})?;

		let target = self.new_child_path(parent_path, name).await?;
		let staging = Self::staging_path(&target);

		let file = fs::File::open(local_path)
			.await
			.map_err(|e| Error::local_io("upload", local_path, e))?;
		let body = cancellable(
			ReaderStream::with_capacity(file, self.config().transfer_chunk_bytes),
			cancel.clone(),
		);

		debug!(local = %local_path.display(), staging = %staging, "Uploading");
		let written = self
			.call_unbounded("upload", &staging, self.backend().create(&staging, body, false))
			.await;

		if let Err(e) = written {
			self.discard(&staging).await;
			return Err(if cancel.is_cancelled() {
				Error::Cancelled(target)
			} else {
				e
			});
		}

		let renamed = self
			.call("upload", &staging, self.backend().rename(&staging, &target, false))
			.await;
		match renamed {
			Ok(true) => {
				info!(path = %target, bytes = metadata.len(), "Uploaded");
				Ok(target)
			}
			Ok(false) => {
				self.discard(&staging).await;
				Err(Error::AlreadyExists(target))
			}
			Err(e) => {
				self.discard(&staging).await;
				Err(e)
			}
		}
	}

	/// Copies the remote file into the local directory `local_parent`.
	pub async fn download_file(
		&self,
		remote_path: &str,
		local_parent: &Path,
		cancel: &CancellationToken,
	) -> Result<PathBuf> {
		let node = self.stat(remote_path).await?;
		if node.is_directory {
			return Err(Error::InvalidArgument(format!(
				"<path='{}'> is a directory, download it as a folder",
				node.path
			)));
		}

		let (target, staging) = local_target(local_parent, &node).await?;

		match self.fetch(&node, &staging, cancel).await {
			Ok(()) => {
				fs::rename(&staging, &target)
					.await
					.map_err(|e| Error::local_io("download", &target, e))?;
				info!(path = %node.path, local = %target.display(), "Downloaded file");
				Ok(target)
			}
			Err(e) => {
				remove_quietly(&staging, false).await;
				Err(e)
			}
		}
	}

	/// Copies a remote directory tree into the local directory `local_parent`,
	/// depth first. Cancellation is checked before every file.
	pub async fn download_folder(
		&self,
		remote_path: &str,
		local_parent: &Path,
		cancel: &CancellationToken,
	) -> Result<PathBuf> {
		let node = self.stat(remote_path).await?;
		if !node.is_directory {
			return Err(Error::NotADirectory(node.path));
		}

		let (target, staging) = local_target(local_parent, &node).await?;
		fs::create_dir(&staging)
			.await
			.map_err(|e| Error::local_io("download", &staging, e))?;

		match self.fetch_tree(&node.path, &staging, cancel).await {
			Ok(files) => {
				fs::rename(&staging, &target)
					.await
					.map_err(|e| Error::local_io("download", &target, e))?;
				info!(path = %node.path, local = %target.display(), files, "Downloaded folder");
				Ok(target)
			}
			Err(e) => {
				remove_quietly(&staging, true).await;
				Err(e)
			}
		}
	}

	async fn fetch_tree(
		&self,
		root: &str,
		local_root: &Path,
		cancel: &CancellationToken,
	) -> Result<usize> {
		let mut files = 0;
		let mut pending = vec![(root.to_string(), local_root.to_path_buf())];

		while let Some((dir, local_dir)) = pending.pop() {
			for child in self.list(&dir).await? {
				let local = local_dir.join(&child.name);
				if child.is_directory {
					fs::create_dir(&local)
						.await
						.map_err(|e| Error::local_io("download", &local, e))?;
					pending.push((child.path, local));
				} else {
					if cancel.is_cancelled() {
						return Err(Error::Cancelled(root.to_string()));
					}
					self.fetch(&child, &local, cancel).await?;
					files += 1;
				}
			}
		}

		Ok(files)
	}

	/// Streams one remote file into `local`. The per round trip timeout
	/// applies to every chunk, not to the whole file.
	async fn fetch(&self, node: &FileNode, local: &Path, cancel: &CancellationToken) -> Result<()> {
		let local_err = |e: io::Error| Error::local_io("download", local, e);

		let mut body = self
			.call("download", &node.path, self.backend().open(&node.path))
			.await?;
		let mut out = BufWriter::new(fs::File::create(local).await.map_err(local_err)?);
		let mut received = 0u64;

		loop {
			if cancel.is_cancelled() {
				return Err(Error::Cancelled(node.path.clone()));
			}

			let chunk = time::timeout(self.timeout(), body.next())
				.await
				.map_err(|_| Error::Timeout {
					operation: "download",
					path: node.path.clone(),
					after: self.timeout(),
				})?;

			match chunk {
				Some(Ok(bytes)) => {
					received += bytes.len() as u64;
					out.write_all(&bytes).await.map_err(local_err)?;
				}
				Some(Err(e)) => {
					return Err(Error::Io {
						operation: "download",
						path: node.path.clone(),
						message: e.to_string(),
					})
				}
				None => break,
			}
		}

		if received != node.length {
			return Err(Error::Io {
				operation: "download",
				path: node.path.clone(),
				message: format!("received {received} of {} bytes", node.length),
			});
		}

		out.flush().await.map_err(local_err)?;
		out.into_inner().sync_all().await.map_err(local_err)?;
		Ok(())
	}
}

/// Final and staging locations for a download of `node` into `local_parent`.
async fn local_target(local_parent: &Path, node: &FileNode) -> Result<(PathBuf, PathBuf)> {
	let parent_meta = fs::metadata(local_parent)
		.await
		.map_err(|e| Error::local_io("download", local_parent, e))?;
	if !parent_meta.is_dir() {
		return Err(Error::NotADirectory(local_parent.display().to_string()));
	}

	let name = match path::file_name(&node.path) {
		"" => "root",
		name => name,
	};

	let target = local_parent.join(name);
	if fs::try_exists(&target)
		.await
		.map_err(|e| Error::local_io("download", &target, e))?
	{
		return Err(Error::AlreadyExists(target.display().to_string()));
	}

	let staging = local_parent.join(format!(".{name}.{}.part", Uuid::new_v4()));
	Ok((target, staging))
}

async fn remove_quietly(staging: &Path, is_dir: bool) {
	let removed = if is_dir {
		fs::remove_dir_all(staging).await
	} else {
		fs::remove_file(staging).await
	};

	if let Err(e) = removed {
		if e.kind() != io::ErrorKind::NotFound {
			warn!(path = %staging.display(), ?e, "Failed to remove partial download");
		}
	}
}

/// Ends the upload body with an error as soon as `cancel` fires, so the remote
/// write fails instead of completing short.
fn cancellable(body: ReaderStream<fs::File>, cancel: CancellationToken) -> ByteStream {
	Box::pin(body.map(move |chunk| {
		if cancel.is_cancelled() {
			Err(io::Error::new(io::ErrorKind::Interrupted, "upload cancelled"))
		} else {
			chunk
		}
	}))
}
