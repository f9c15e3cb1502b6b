use std::{
	fmt,
	future::Future,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use parking_lot::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::{
	backend::{BackendError, HdfsBackend},
	error::{Error, Result},
};

/// Live connection to one cluster, shared by every operation on its profile.
pub struct ClientHandle {
	profile_id: String,
	backend: Arc<dyn HdfsBackend>,
	last_used: Mutex<Instant>,
	closed: AtomicBool,
}

impl fmt::Debug for ClientHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientHandle")
			.field("profile_id", &self.profile_id)
			.field("backend", &self.backend.backend_type())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl ClientHandle {
	pub(crate) fn new(profile_id: impl Into<String>, backend: Arc<dyn HdfsBackend>) -> Self {
		Self {
			profile_id: profile_id.into(),
			backend,
			last_used: Mutex::new(Instant::now()),
			closed: AtomicBool::new(false),
		}
	}

	pub fn profile_id(&self) -> &str {
		&self.profile_id
	}

	pub(crate) fn backend(&self) -> &dyn HdfsBackend {
		self.backend.as_ref()
	}

	pub(crate) fn touch(&self) {
		*self.last_used.lock() = Instant::now();
	}

	pub fn idle_for(&self) -> Duration {
		self.last_used.lock().elapsed()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Runs one remote round trip bounded by `limit`.
	pub(crate) async fn call<T>(
		&self,
		operation: &'static str,
		path: &str,
		limit: Duration,
		request: impl Future<Output = Result<T, BackendError>>,
	) -> Result<T> {
		if self.is_closed() {
			return Err(Error::Connection {
				url: self.profile_id.clone(),
				message: format!("{operation}: client handle was closed"),
			});
		}

		self.touch();
		debug!(profile = %self.profile_id, operation, path, "Remote call");

		match timeout(limit, request).await {
			Ok(result) => result.map_err(|e| match e.into_error(operation, path) {
				Error::Timeout { operation, path, .. } => Error::Timeout {
					operation,
					path,
					after: limit,
				},
				other => other,
			}),
			Err(_) => {
				warn!(profile = %self.profile_id, operation, path, ?limit, "Remote call timed out");
				Err(Error::Timeout {
					operation,
					path: path.to_string(),
					after: limit,
				})
			}
		}
	}

	pub(crate) async fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		info!(profile = %self.profile_id, "Closing client handle");
		if let Err(e) = self.backend.close().await {
			warn!(profile = %self.profile_id, %e, "Backend did not close cleanly");
		}
	}
}
