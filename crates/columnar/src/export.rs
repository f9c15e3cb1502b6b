//! Streaming CSV export of a columnar file to the local filesystem.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use serde::Serialize;
use tokio::{
	fs,
	io::{AsyncWriteExt, BufWriter},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
	csv,
	error::{ColumnarError, Result},
	reader::{row_group_stream, ColumnarFile},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
	pub path: PathBuf,
	pub rows: u64,
	pub row_groups: usize,
}

/// Writes every row of `file` to `target` as CSV.
///
/// Rows are pulled one row group at a time and written into a hidden sibling
/// of `target`, which is renamed into place only once everything is flushed.
/// Cancellation is checked between row groups. On any failure the partial
/// output is removed and `target` is left untouched.
pub async fn export_csv(
	file: &dyn ColumnarFile,
	target: &Path,
	cancel: &CancellationToken,
) -> Result<ExportSummary> {
	let staging = staging_path(target)?;

	match write_csv(file, &staging, cancel).await {
		Ok((rows, row_groups)) => {
			fs::rename(&staging, target).await.map_err(|e| {
				ColumnarError::io(format!("moving export into {}", target.display()), e)
			})?;

			info!(
				target = %target.display(),
				rows,
				row_groups,
				"Finished CSV export"
			);

			Ok(ExportSummary {
				path: target.to_path_buf(),
				rows,
				row_groups,
			})
		}
		Err(e) => {
			if let Err(remove_err) = fs::remove_file(&staging).await {
				if remove_err.kind() != std::io::ErrorKind::NotFound {
					warn!(
						path = %staging.display(),
						?remove_err,
						"Failed to remove partial export"
					);
				}
			}
			Err(e)
		}
	}
}

async fn write_csv(
	file: &dyn ColumnarFile,
	staging: &Path,
	cancel: &CancellationToken,
) -> Result<(u64, usize)> {
	let io_err = |e| ColumnarError::io(format!("writing {}", staging.display()), e);

	let mut out = BufWriter::new(fs::File::create(staging).await.map_err(io_err)?);
	let columns = file.column_names();

	let header = csv::encode_header(&columns).map_err(io_err)?;
	out.write_all(&header).await.map_err(io_err)?;

	let mut rows = 0u64;
	let mut row_groups = 0usize;
	let mut groups = row_group_stream(file);

	loop {
		if cancel.is_cancelled() {
			debug!(row_groups, "Export cancelled between row groups");
			return Err(ColumnarError::Cancelled);
		}

		let Some(group) = groups.next().await else {
			break;
		};
		let group = group?;

		let encoded = csv::encode_rows(&columns, &group).map_err(io_err)?;
		out.write_all(&encoded).await.map_err(io_err)?;

		rows += group.len() as u64;
		row_groups += 1;
	}

	out.flush().await.map_err(io_err)?;
	out.into_inner().sync_all().await.map_err(io_err)?;

	Ok((rows, row_groups))
}

fn staging_path(target: &Path) -> Result<PathBuf> {
	let name = target
		.file_name()
		.ok_or_else(|| {
			ColumnarError::io(
				"preparing export",
				std::io::Error::new(
					std::io::ErrorKind::InvalidInput,
					format!("export target {} has no file name", target.display()),
				),
			)
		})?
		.to_string_lossy();

	Ok(target.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4())))
}
