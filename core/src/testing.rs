//! Test support: an in-memory cluster behind a real [`Gateway`].

use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
	api::Dispatcher,
	backend::{HdfsBackend, MemoryBackend},
	domain::ConnectionProfile,
	error::{Error, Result},
	ops::Namespace,
	registry::{Connector, InMemoryProfileStore},
	Gateway, GatewayConfig,
};

const DEFAULT_USER: &str = "hdfs";

/// Hands out one [`MemoryBackend`] per profile id, kept across reconnects so
/// a test can observe what a previous handle did.
#[derive(Debug, Default)]
pub struct MemoryConnector {
	backends: Mutex<HashMap<String, Arc<MemoryBackend>>>,
	unreachable: Mutex<HashSet<String>>,
	delay: Mutex<Option<Duration>>,
	attempts: AtomicUsize,
}

impl MemoryConnector {
	pub fn new() -> Self {
		Self::default()
	}

	/// The backend of `profile`, created on first use with the profile user.
	pub fn backend_for(&self, profile: &ConnectionProfile) -> Arc<MemoryBackend> {
		self.backends
			.lock()
			.entry(profile.id.clone())
			.or_insert_with(|| {
				let user = profile.user().unwrap_or_else(|| DEFAULT_USER.to_string());
				Arc::new(MemoryBackend::new(user))
			})
			.clone()
	}

	/// Makes connection attempts for `profile_id` fail.
	pub fn set_unreachable(&self, profile_id: &str, unreachable: bool) {
		let mut ids = self.unreachable.lock();
		if unreachable {
			ids.insert(profile_id.to_string());
		} else {
			ids.remove(profile_id);
		}
	}

	/// Delays every connection attempt.
	pub fn set_connect_delay(&self, delay: Option<Duration>) {
		*self.delay.lock() = delay;
	}

	/// Connection attempts made so far, successful or not.
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Connector for MemoryConnector {
	async fn connect(&self, profile: &ConnectionProfile) -> Result<Arc<dyn HdfsBackend>> {
		let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
		debug!(profile = %profile.id, attempt, "MemoryConnector connecting");

		let delay = *self.delay.lock();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		if self.unreachable.lock().contains(&profile.id) {
			return Err(Error::Connection {
				url: profile.url.clone(),
				message: "connection refused".to_string(),
			});
		}

		let backend = self.backend_for(profile);
		backend.reopen();
		Ok(backend as Arc<dyn HdfsBackend>)
	}
}

/// A gateway with a single in-memory cluster registered as [`TestCluster::PROFILE`].
pub struct TestCluster {
	pub gateway: Gateway,
	pub backend: Arc<MemoryBackend>,
	pub connector: Arc<MemoryConnector>,
	pub profiles: Arc<InMemoryProfileStore>,
}

impl TestCluster {
	pub const PROFILE: &'static str = "test-cluster";

	pub fn new() -> Result<Self> {
		Self::with_config(GatewayConfig::default())
	}

	pub fn with_config(config: GatewayConfig) -> Result<Self> {
		let profile = ConnectionProfile::new(Self::PROFILE, "Test cluster", "hdfs://test-nn:8020")
			.with_setting("user.name", DEFAULT_USER);

		let connector = Arc::new(MemoryConnector::new());
		let backend = connector.backend_for(&profile);
		let profiles = Arc::new(InMemoryProfileStore::from_profiles([profile]));
		let gateway = Gateway::new(config, profiles.clone(), connector.clone())?;

		Ok(Self {
			gateway,
			backend,
			connector,
			profiles,
		})
	}

	pub async fn namespace(&self) -> Result<Namespace> {
		self.gateway.namespace(Self::PROFILE).await
	}

	pub fn dispatcher(&self) -> Dispatcher<'_> {
		Dispatcher::new(&self.gateway)
	}
}
