use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancellation tokens of the requests currently running, by request id.
#[derive(Debug, Default)]
pub struct RequestTracker {
	running: Mutex<HashMap<String, CancellationToken>>,
}

impl RequestTracker {
	pub(crate) fn begin(&self, request_id: &str) -> CancellationToken {
		let token = CancellationToken::new();
		if let Some(previous) = self
			.running
			.lock()
			.insert(request_id.to_string(), token.clone())
		{
			warn!(request_id, "Request id reused while still running");
			previous.cancel();
		}
		token
	}

	pub(crate) fn finish(&self, request_id: &str) {
		self.running.lock().remove(request_id);
	}

	/// Signals the request to stop. Returns `false` for unknown ids.
	pub fn cancel(&self, request_id: &str) -> bool {
		match self.running.lock().get(request_id) {
			Some(token) => {
				debug!(request_id, "Cancelling request");
				token.cancel();
				true
			}
			None => false,
		}
	}

	pub fn is_running(&self, request_id: &str) -> bool {
		self.running.lock().contains_key(request_id)
	}
}
