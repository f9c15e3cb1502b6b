//! Command dispatch
//!
//! Every gateway operation is a named call taking a flat JSON record with
//! camelCase keys and answering with a JSON value or an [`ErrorRecord`].
//!
//! ## Adding an operation
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct StatFile { profile_id: String, path: String }
//!
//! #[async_trait]
//! impl Operation for StatFile {
//!     const METHOD: &'static str = "statFile";
//!     type Output = FileNode;
//!
//!     async fn run(self, ctx: &CallContext<'_>) -> Result<FileNode> {
//!         ctx.namespace(&self.profile_id).await?.stat(&self.path).await
//!     }
//! }
//! ```
//!
//! and list it in [`OPERATIONS`].

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub mod acl;
pub mod columnar;
pub mod files;
pub mod requests;
pub mod session;

pub use requests::RequestTracker;

use crate::{
	error::{Error, ErrorRecord, Result},
	ops::Namespace,
	Gateway,
};

/// What an operation can reach while it runs.
pub struct CallContext<'a> {
	pub gateway: &'a Gateway,
	pub requests: &'a RequestTracker,
	/// Fires when the caller cancels this request
	pub cancel: CancellationToken,
}

impl CallContext<'_> {
	pub async fn namespace(&self, profile_id: &str) -> Result<Namespace> {
		self.gateway.namespace(profile_id).await
	}
}

/// A dispatchable operation: its JSON arguments deserialise into `Self`.
#[async_trait]
pub trait Operation: DeserializeOwned + Send + 'static {
	const METHOD: &'static str;

	type Output: Serialize + Send;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output>;
}

pub type HandlerFn = for<'a> fn(&'a CallContext<'a>, Value) -> BoxFuture<'a, Result<Value>>;

/// Generic handler: decode the arguments, run, encode the output.
pub fn handle<'a, O: Operation>(ctx: &'a CallContext<'a>, args: Value) -> BoxFuture<'a, Result<Value>> {
	async move {
		let op: O = serde_json::from_value(args)
			.map_err(|e| Error::InvalidArgument(format!("invalid arguments for {}: {e}", O::METHOD)))?;

		let output = op.run(ctx).await?;

		serde_json::to_value(output)
			.map_err(|e| Error::InvalidArgument(format!("unserialisable {} result: {e}", O::METHOD)))
	}
	.boxed()
}

fn register<O: Operation>(map: &mut HashMap<&'static str, HandlerFn>) {
	if map.insert(O::METHOD, handle::<O>).is_some() {
		warn!(method = O::METHOD, "Operation registered twice");
	}
}

/// Every operation by name.
pub static OPERATIONS: Lazy<HashMap<&'static str, HandlerFn>> = Lazy::new(|| {
	let mut map = HashMap::new();

	register::<files::ListFiles>(&mut map);
	register::<files::StatFile>(&mut map);
	register::<files::CreateDir>(&mut map);
	register::<files::CreateEmptyFile>(&mut map);
	register::<files::RenameFile>(&mut map);
	register::<files::DeleteFiles>(&mut map);
	register::<files::DeleteFilesForce>(&mut map);
	register::<files::SetPermissions>(&mut map);
	register::<files::Upload>(&mut map);
	register::<files::DownloadFile>(&mut map);
	register::<files::DownloadFolder>(&mut map);
	register::<files::PreviewContent>(&mut map);
	register::<files::ReadContent>(&mut map);
	register::<files::WriteContent>(&mut map);

	register::<acl::GetAcl>(&mut map);
	register::<acl::AddAcl>(&mut map);
	register::<acl::RemoveAcl>(&mut map);
	register::<acl::RemoveDefaultAcl>(&mut map);
	register::<acl::RemoveAllAcl>(&mut map);

	register::<columnar::OrcSchema>(&mut map);
	register::<columnar::OrcMeta>(&mut map);
	register::<columnar::OrcPage>(&mut map);
	register::<columnar::OrcRowCount>(&mut map);
	register::<columnar::OrcExportCsv>(&mut map);
	register::<columnar::ParquetSchema>(&mut map);
	register::<columnar::ParquetMeta>(&mut map);
	register::<columnar::ParquetPage>(&mut map);
	register::<columnar::ParquetRowCount>(&mut map);
	register::<columnar::ParquetExportCsv>(&mut map);
	register::<columnar::AvroContent>(&mut map);

	register::<session::InvalidateProfile>(&mut map);
	register::<session::Cancel>(&mut map);

	map
});

/// Sorted names of every operation.
pub fn operation_names() -> Vec<&'static str> {
	let mut names = OPERATIONS.keys().copied().collect::<Vec<_>>();
	names.sort_unstable();
	names
}

/// Runs named operations against a gateway.
pub struct Dispatcher<'g> {
	gateway: &'g Gateway,
	requests: RequestTracker,
}

impl<'g> Dispatcher<'g> {
	pub fn new(gateway: &'g Gateway) -> Self {
		Self {
			gateway,
			requests: RequestTracker::default(),
		}
	}

	pub fn requests(&self) -> &RequestTracker {
		&self.requests
	}

	/// Runs `method`. A `requestId` in `args` makes the call cancellable
	/// through the `cancel` operation while it runs.
	pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
		let handler = OPERATIONS
			.get(method)
			.ok_or_else(|| Error::InvalidArgument(format!("unknown operation {method:?}")))?;

		// `cancel` names the request it targets, it is not tracked itself
		let request_id = args
			.get("requestId")
			.and_then(Value::as_str)
			.filter(|_| method != <session::Cancel as Operation>::METHOD)
			.map(str::to_string);
		let cancel = match &request_id {
			Some(id) => self.requests.begin(id),
			None => CancellationToken::new(),
		};

		let ctx = CallContext {
			gateway: self.gateway,
			requests: &self.requests,
			cancel,
		};

		debug!(method, request_id = ?request_id, "Dispatching");
		let result = handler(&ctx, args).await;

		if let Some(id) = &request_id {
			self.requests.finish(id);
		}
		result
	}

	/// Like [`Self::call`], with the error turned into its serialisable record.
	pub async fn call_record(&self, method: &str, args: Value) -> Result<Value, ErrorRecord> {
		let result = self.call(method, args).await;
		crate::error::report_error(method, &result);
		result.map_err(ErrorRecord::from)
	}
}
