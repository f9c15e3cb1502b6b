use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::{
	backend::{HdfsBackend, WebHdfsBackend},
	domain::{path, ConnectionProfile},
	error::{Error, Result},
};

const DEFAULT_HTTP_PORT: u16 = 9870;
const DEFAULT_HTTPS_PORT: u16 = 9871;

/// Opens a backend for a profile.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self, profile: &ConnectionProfile) -> Result<Arc<dyn HdfsBackend>>;
}

/// Connects over WebHDFS and probes the root before handing the backend out.
#[derive(Debug, Clone)]
pub struct WebHdfsConnector {
	connect_timeout: Duration,
}

impl WebHdfsConnector {
	pub fn new(connect_timeout: Duration) -> Self {
		Self { connect_timeout }
	}

	/// NameNode HTTP endpoint for a profile url.
	///
	/// `hdfs://` urls carry the RPC port, so the HTTP address comes from
	/// `dfs.namenode.http-address` or the host with the WebHDFS port.
	pub fn endpoint(profile: &ConnectionProfile) -> Result<Url> {
		let invalid = |message: String| Error::Connection {
			url: profile.url.clone(),
			message,
		};

		let url = Url::parse(&profile.url).map_err(|e| invalid(format!("invalid url: {e}")))?;
		let settings = profile.settings();

		let (scheme, default_port) = match url.scheme() {
			"http" | "https" => return Ok(url),
			"hdfs" | "webhdfs" => ("http", DEFAULT_HTTP_PORT),
			"swebhdfs" => ("https", DEFAULT_HTTPS_PORT),
			other => return Err(invalid(format!("unsupported scheme {other:?}"))),
		};

		if url.scheme() == "hdfs" {
			if let Some(address) = settings.get("dfs.namenode.http-address") {
				return Url::parse(&format!("http://{address}"))
					.map_err(|e| invalid(format!("invalid dfs.namenode.http-address: {e}")));
			}
		}

		let host = url
			.host_str()
			.ok_or_else(|| invalid("url has no host".to_string()))?;
		let port = match url.scheme() {
			"hdfs" => settings
				.get("dfs.webhdfs.port")
				.and_then(|p| p.parse().ok())
				.unwrap_or(default_port),
			_ => url.port().unwrap_or(default_port),
		};

		Url::parse(&format!("{scheme}://{host}:{port}"))
			.map_err(|e| invalid(format!("invalid endpoint: {e}")))
	}
}

#[async_trait]
impl Connector for WebHdfsConnector {
	async fn connect(&self, profile: &ConnectionProfile) -> Result<Arc<dyn HdfsBackend>> {
		let endpoint = Self::endpoint(profile)?;
		let to_connection_error = |message: String| Error::Connection {
			url: endpoint.to_string(),
			message,
		};

		let backend = WebHdfsBackend::new(&endpoint, profile.user(), self.connect_timeout)
			.map_err(|e| to_connection_error(e.message))?;

		debug!(profile = %profile.id, %endpoint, "Probing namenode");
		backend
			.file_status(path::ROOT)
			.await
			.map_err(|e| to_connection_error(e.to_string()))?;

		Ok(Arc::new(backend))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn endpoint(url: &str, settings: &[(&str, &str)]) -> Result<String> {
		let profile = settings
			.iter()
			.fold(ConnectionProfile::new("p", "p", url), |p, (k, v)| {
				p.with_setting(k, v)
			});
		WebHdfsConnector::endpoint(&profile).map(|u| u.to_string())
	}

	#[test]
	fn profile_urls_map_to_http_endpoints() {
		assert_eq!(endpoint("hdfs://nn:8020", &[]).unwrap(), "http://nn:9870/");
		assert_eq!(
			endpoint("hdfs://nn:8020", &[("dfs.webhdfs.port", "50070")]).unwrap(),
			"http://nn:50070/"
		);
		assert_eq!(
			endpoint("hdfs://nn:8020", &[("dfs.namenode.http-address", "web.nn:9999")]).unwrap(),
			"http://web.nn:9999/"
		);
		assert_eq!(endpoint("webhdfs://nn", &[]).unwrap(), "http://nn:9870/");
		assert_eq!(endpoint("swebhdfs://nn:1443", &[]).unwrap(), "https://nn:1443/");
		assert_eq!(endpoint("http://gw:14000", &[]).unwrap(), "http://gw:14000/");
	}

	#[test]
	fn unusable_urls_are_connection_errors() {
		assert_eq!(endpoint("ftp://nn", &[]).unwrap_err().code(), "CONNECTION_ERROR");
		assert_eq!(endpoint("not a url", &[]).unwrap_err().code(), "CONNECTION_ERROR");
	}
}
