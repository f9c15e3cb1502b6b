//! Connection registry
//!
//! Maps profile ids to cached [`ClientHandle`]s. Concurrent resolutions of the
//! same id share one connection attempt; a failed attempt is handed to every
//! waiter and then forgotten so the next call retries.

use std::{
	collections::HashMap,
	sync::{Arc, Weak},
	time::Duration,
};

use futures::{
	future::{BoxFuture, Shared},
	FutureExt,
};
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time};
use tracing::{debug, info, warn};

pub mod connector;
pub mod handle;
pub mod store;

pub use connector::{Connector, WebHdfsConnector};
pub use handle::ClientHandle;
pub use store::{InMemoryProfileStore, ProfileStore};

use crate::error::{Error, Result};

type ConnectFuture = Shared<BoxFuture<'static, Result<Arc<ClientHandle>>>>;

enum Slot {
	Connecting(ConnectFuture),
	Ready(Arc<ClientHandle>),
}

pub struct ConnectionRegistry {
	profiles: Arc<dyn ProfileStore>,
	connector: Arc<dyn Connector>,
	connect_timeout: Duration,
	idle_timeout: Duration,
	slots: Mutex<HashMap<String, Slot>>,
}

impl ConnectionRegistry {
	pub fn new(
		profiles: Arc<dyn ProfileStore>,
		connector: Arc<dyn Connector>,
		connect_timeout: Duration,
		idle_timeout: Duration,
	) -> Self {
		Self {
			profiles,
			connector,
			connect_timeout,
			idle_timeout,
			slots: Mutex::new(HashMap::new()),
		}
	}

	/// Cached handle for `profile_id`, connecting on first use.
	pub async fn resolve(&self, profile_id: &str) -> Result<Arc<ClientHandle>> {
		let attempt = {
			let mut slots = self.slots.lock();
			match slots.get(profile_id) {
				Some(Slot::Ready(handle)) if !handle.is_closed() => {
					handle.touch();
					return Ok(handle.clone());
				}
				Some(Slot::Connecting(attempt)) => attempt.clone(),
				_ => {
					let attempt = self.connect(profile_id).boxed().shared();
					slots.insert(profile_id.to_string(), Slot::Connecting(attempt.clone()));
					attempt
				}
			}
		};

		let result = attempt.clone().await;

		let mut slots = self.slots.lock();
		let still_ours = matches!(
			slots.get(profile_id),
			Some(Slot::Connecting(current)) if current.ptr_eq(&attempt)
		);
		if still_ours {
			match &result {
				Ok(handle) => {
					slots.insert(profile_id.to_string(), Slot::Ready(handle.clone()));
				}
				Err(_) => {
					slots.remove(profile_id);
				}
			}
		}

		result
	}

	fn connect(&self, profile_id: &str) -> impl std::future::Future<Output = Result<Arc<ClientHandle>>> + Send + 'static {
		let profiles = self.profiles.clone();
		let connector = self.connector.clone();
		let limit = self.connect_timeout;
		let id = profile_id.to_string();

		async move {
			let profile = profiles
				.get(&id)
				.await?
				.filter(|p| !p.deleted)
				.ok_or_else(|| Error::ProfileNotFound(id.clone()))?;

			info!(profile = %id, url = %profile.url, "Connecting");
			let backend = time::timeout(limit, connector.connect(&profile))
				.await
				.map_err(|_| Error::Timeout {
					operation: "connect",
					path: profile.url.clone(),
					after: limit,
				})?
				.map_err(|e| {
					warn!(profile = %id, %e, "Connection attempt failed");
					e
				})?;

			info!(profile = %id, backend = ?backend.backend_type(), "Connected");
			Ok(Arc::new(ClientHandle::new(id, backend)))
		}
	}

	/// Closes and forgets the handle of `profile_id`. Returns whether one was
	/// cached.
	pub async fn invalidate(&self, profile_id: &str) -> bool {
		let slot = self.slots.lock().remove(profile_id);
		match slot {
			Some(Slot::Ready(handle)) => {
				handle.close().await;
				true
			}
			Some(Slot::Connecting(_)) => true,
			None => false,
		}
	}

	/// Closes every handle unused for at least the idle timeout.
	pub async fn evict_idle(&self) -> usize {
		let idle = {
			let mut slots = self.slots.lock();
			let ids = slots
				.iter()
				.filter_map(|(id, slot)| match slot {
					Slot::Ready(handle) if handle.idle_for() >= self.idle_timeout => {
						Some(id.clone())
					}
					_ => None,
				})
				.collect::<Vec<_>>();

			ids.into_iter()
				.filter_map(|id| match slots.remove(&id) {
					Some(Slot::Ready(handle)) => Some(handle),
					_ => None,
				})
				.collect::<Vec<_>>()
		};

		for handle in &idle {
			debug!(profile = handle.profile_id(), idle = ?handle.idle_for(), "Evicting idle handle");
			handle.close().await;
		}

		idle.len()
	}

	/// Periodically evicts idle handles until the registry is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
		let registry: Weak<Self> = Arc::downgrade(self);
		let period = (self.idle_timeout / 2).max(Duration::from_millis(10));

		tokio::spawn(async move {
			let mut interval = time::interval(period);
			interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
			loop {
				interval.tick().await;
				let Some(registry) = registry.upgrade() else {
					break;
				};
				let evicted = registry.evict_idle().await;
				if evicted > 0 {
					info!(evicted, "Closed idle connections");
				}
			}
		})
	}

	pub fn is_cached(&self, profile_id: &str) -> bool {
		matches!(self.slots.lock().get(profile_id), Some(Slot::Ready(_)))
	}

	/// Closes every cached handle.
	pub async fn shutdown(&self) {
		let handles = self
			.slots
			.lock()
			.drain()
			.filter_map(|(_, slot)| match slot {
				Slot::Ready(handle) => Some(handle),
				Slot::Connecting(_) => None,
			})
			.collect::<Vec<_>>();

		info!(count = handles.len(), "Shutting down connection registry");
		for handle in handles {
			handle.close().await;
		}
	}
}
