#![warn(
	clippy::all,
	clippy::unwrap_used,
	clippy::expect_used,
	rust_2018_idioms,
	unused_qualifications
)]

//! HDFS gateway
//!
//! Resolves connection profiles to cached cluster clients and exposes
//! namespace, ACL, content and columnar operations over them, either as
//! typed methods on [`ops::Namespace`] or as named JSON calls through
//! [`api::Dispatcher`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

pub mod api;
pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod filetype;
pub mod logging;
pub mod ops;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::Dispatcher;
pub use config::GatewayConfig;
pub use error::{Error, ErrorRecord, Result};
pub use ops::Namespace;
pub use registry::{ConnectionRegistry, Connector, InMemoryProfileStore, ProfileStore, WebHdfsConnector};

/// Entry point: configuration plus the shared connection registry.
pub struct Gateway {
	config: Arc<GatewayConfig>,
	registry: Arc<ConnectionRegistry>,
}

impl Gateway {
	pub fn new(
		config: GatewayConfig,
		profiles: Arc<dyn ProfileStore>,
		connector: Arc<dyn Connector>,
	) -> Result<Self> {
		config.validate()?;

		let registry = ConnectionRegistry::new(
			profiles,
			connector,
			config.connect_timeout(),
			config.idle_timeout(),
		);

		Ok(Self {
			config: Arc::new(config),
			registry: Arc::new(registry),
		})
	}

	/// Gateway talking WebHDFS to every profile.
	pub fn with_webhdfs(config: GatewayConfig, profiles: Arc<dyn ProfileStore>) -> Result<Self> {
		let connector = Arc::new(WebHdfsConnector::new(config.connect_timeout()));
		Self::new(config, profiles, connector)
	}

	/// Operations on the cluster of `profile_id`, connecting if needed.
	pub async fn namespace(&self, profile_id: &str) -> Result<Namespace> {
		let handle = self.registry.resolve(profile_id).await?;
		Ok(Namespace::new(handle, self.config.clone()))
	}

	pub fn registry(&self) -> &ConnectionRegistry {
		&self.registry
	}

	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Starts closing idle connections in the background. Stops by itself
	/// once the gateway is dropped.
	pub fn start_sweeper(&self) -> JoinHandle<()> {
		self.registry.spawn_sweeper()
	}

	pub async fn shutdown(&self) {
		info!("Shutting down gateway");
		self.registry.shutdown().await;
	}
}
