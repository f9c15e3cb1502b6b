//! Integration tests for the connection registry
//!
//! Time is paused so connect delays, timeouts and idle eviction run on the
//! virtual clock.

mod helpers;

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use helpers::*;
use hx_core::{testing::TestCluster, GatewayConfig};
use pretty_assertions::assert_eq;

const PROFILE: &str = TestCluster::PROFILE;

#[tokio::test(start_paused = true)]
async fn test_concurrent_resolves_share_one_attempt() {
	let cluster = cluster();
	cluster.connector.set_connect_delay(Some(Duration::from_millis(500)));
	let registry = cluster.gateway.registry();

	let handles = join_all((0..8).map(|_| registry.resolve(PROFILE))).await;

	let first = handles[0].as_ref().unwrap();
	for handle in &handles {
		assert!(Arc::ptr_eq(first, handle.as_ref().unwrap()));
	}
	assert_eq!(cluster.connector.attempts(), 1);
	assert!(registry.is_cached(PROFILE));

	// cached from now on
	registry.resolve(PROFILE).await.unwrap();
	assert_eq!(cluster.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempts_are_shared_then_retried() {
	let cluster = cluster();
	cluster.connector.set_unreachable(PROFILE, true);
	cluster.connector.set_connect_delay(Some(Duration::from_millis(100)));
	let registry = cluster.gateway.registry();

	let results = join_all((0..4).map(|_| registry.resolve(PROFILE))).await;
	for result in &results {
		assert_eq!(result.as_ref().unwrap_err().code(), "CONNECTION_ERROR");
	}
	assert_eq!(cluster.connector.attempts(), 1);
	assert!(!registry.is_cached(PROFILE));

	cluster.connector.set_unreachable(PROFILE, false);
	registry.resolve(PROFILE).await.unwrap();
	assert_eq!(cluster.connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_connections_time_out() {
	let cluster = cluster_with(GatewayConfig {
		connect_timeout_ms: 1_000,
		..Default::default()
	});
	cluster.connector.set_connect_delay(Some(Duration::from_secs(5)));

	let err = cluster.gateway.namespace(PROFILE).await.unwrap_err();

	assert_eq!(err.code(), "TIMEOUT");
	assert!(!cluster.gateway.registry().is_cached(PROFILE));
}

#[tokio::test]
async fn test_unknown_and_deleted_profiles() {
	let cluster = cluster();

	let err = cluster.gateway.namespace("missing").await.unwrap_err();
	assert_eq!(err.code(), "PROFILE_NOT_FOUND");
	assert!(err.to_string().contains("missing"));

	assert!(cluster.profiles.soft_delete(PROFILE));
	let err = cluster.gateway.namespace(PROFILE).await.unwrap_err();
	assert_eq!(err.code(), "PROFILE_NOT_FOUND");
	assert_eq!(cluster.connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_handles_are_evicted_and_reconnected() {
	let cluster = cluster_with(GatewayConfig {
		idle_timeout_secs: 60,
		..Default::default()
	});
	let registry = cluster.gateway.registry();
	registry.resolve(PROFILE).await.unwrap();

	tokio::time::advance(Duration::from_secs(40)).await;
	// use resets the idle clock
	registry.resolve(PROFILE).await.unwrap();
	tokio::time::advance(Duration::from_secs(40)).await;
	assert_eq!(registry.evict_idle().await, 0);

	tokio::time::advance(Duration::from_secs(30)).await;
	assert_eq!(registry.evict_idle().await, 1);
	assert!(cluster.backend.is_closed());
	assert!(!registry.is_cached(PROFILE));

	let ns = cluster.gateway.namespace(PROFILE).await.unwrap();
	assert!(ns.stat("/").await.unwrap().is_directory);
	assert_eq!(cluster.connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_closes_idle_handles() {
	let cluster = cluster_with(GatewayConfig {
		idle_timeout_secs: 10,
		..Default::default()
	});
	let sweeper = cluster.gateway.start_sweeper();
	cluster.gateway.namespace(PROFILE).await.unwrap();

	tokio::time::sleep(Duration::from_secs(30)).await;

	assert!(!cluster.gateway.registry().is_cached(PROFILE));
	assert!(cluster.backend.is_closed());
	sweeper.abort();
}

#[tokio::test]
async fn test_invalidate_closes_outstanding_namespaces() {
	let cluster = cluster();
	let ns = cluster.namespace().await.unwrap();
	let registry = cluster.gateway.registry();

	assert!(registry.invalidate(PROFILE).await);
	assert!(!registry.invalidate(PROFILE).await);

	let err = ns.stat("/").await.unwrap_err();
	assert_eq!(err.code(), "CONNECTION_ERROR");

	// a fresh namespace reconnects
	let ns = cluster.namespace().await.unwrap();
	assert!(ns.stat("/").await.is_ok());
	assert_eq!(cluster.connector.attempts(), 2);
}

#[tokio::test]
async fn test_shutdown_closes_every_handle() {
	let cluster = cluster();
	cluster.namespace().await.unwrap();

	cluster.gateway.shutdown().await;

	assert!(cluster.backend.is_closed());
	assert!(!cluster.gateway.registry().is_cached(PROFILE));
}
