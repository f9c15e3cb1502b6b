//! Operations against one resolved cluster
//!
//! A [`Namespace`] pairs a cached client handle with the gateway tunables.
//! Each submodule adds one family of operations to it.

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
	backend::{BackendError, HdfsBackend},
	config::GatewayConfig,
	error::Result,
	registry::ClientHandle,
};

pub mod acl;
pub mod batch;
pub mod columnar;
pub mod content;
pub mod files;

pub use batch::{BatchReport, PathFailure};
pub use files::delete::DeleteMode;

/// Operation executor bound to one profile.
#[derive(Debug, Clone)]
pub struct Namespace {
	handle: Arc<ClientHandle>,
	config: Arc<GatewayConfig>,
	timeout: Duration,
}

impl Namespace {
	pub(crate) fn new(handle: Arc<ClientHandle>, config: Arc<GatewayConfig>) -> Self {
		let timeout = config.request_timeout();
		Self {
			handle,
			config,
			timeout,
		}
	}

	/// Overrides the per round trip timeout for this namespace.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn profile_id(&self) -> &str {
		self.handle.profile_id()
	}

	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	pub(crate) fn backend(&self) -> &dyn HdfsBackend {
		self.handle.backend()
	}

	/// One remote round trip under the namespace timeout.
	pub(crate) async fn call<T>(
		&self,
		operation: &'static str,
		path: &str,
		request: impl Future<Output = Result<T, BackendError>>,
	) -> Result<T> {
		self.handle.call(operation, path, self.timeout, request).await
	}

	/// A remote call whose duration depends on the amount of data moved, so
	/// no overall deadline applies.
	pub(crate) async fn call_unbounded<T>(
		&self,
		operation: &'static str,
		path: &str,
		request: impl Future<Output = Result<T, BackendError>>,
	) -> Result<T> {
		self.handle.call(operation, path, Duration::MAX, request).await
	}
}
