//! WebHDFS REST client
//!
//! Talks to the NameNode HTTP endpoint (`/webhdfs/v1`). Data calls (`CREATE`,
//! `OPEN`) are issued with `noredirect=true` and the returned DataNode
//! location is then contacted directly, so redirects are never followed
//! implicitly and the request body is only sent once.

use std::{io, ops::Range, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{channel::mpsc, SinkExt, StreamExt};
use reqwest::{
	header::{CONTENT_TYPE, LOCATION},
	redirect::Policy,
	Body, Client, Method, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, trace};
use url::Url;

use super::{
	BackendError, BackendErrorKind, BackendType, ByteStream, HdfsBackend, RawAclStatus,
	RawFileStatus,
};

pub const API_PREFIX: &str = "/webhdfs/v1";

#[derive(Debug, Clone)]
pub struct WebHdfsBackend {
	client: Client,
	base: Url,
	user: Option<String>,
}

impl WebHdfsBackend {
	/// `endpoint` is the NameNode HTTP address, e.g. `http://nn:9870`.
	pub fn new(
		endpoint: &Url,
		user: Option<String>,
		connect_timeout: Duration,
	) -> Result<Self, BackendError> {
		let client = Client::builder()
			.redirect(Policy::none())
			.connect_timeout(connect_timeout)
			.build()
			.map_err(|e| BackendError::new(BackendErrorKind::Connection, e.to_string()))?;

		let mut base = endpoint.clone();
		base.set_path(API_PREFIX);
		base.set_query(None);

		Ok(Self { client, base, user })
	}

	pub fn base_url(&self) -> &Url {
		&self.base
	}

	fn op_url(&self, path: &str, op: &str, params: &[(&str, &str)]) -> Result<Url, BackendError> {
		let mut url = self.base.clone();
		url.path_segments_mut()
			.map_err(|()| {
				BackendError::new(
					BackendErrorKind::InvalidArgument,
					format!("endpoint cannot carry a path: {}", self.base),
				)
			})?
			.pop_if_empty()
			.extend(segments_or_root(path));

		{
			let mut query = url.query_pairs_mut();
			query.append_pair("op", op);
			if let Some(user) = &self.user {
				query.append_pair("user.name", user);
			}
			for (key, value) in params {
				query.append_pair(key, value);
			}
		}

		Ok(url)
	}

	async fn send(&self, method: Method, url: Url) -> Result<Response, BackendError> {
		trace!(%method, %url, "WebHDFS request");
		let response = self
			.client
			.request(method, url)
			.send()
			.await
			.map_err(transport_error)?;
		check(response).await
	}

	async fn json<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		op: &str,
		params: &[(&str, &str)],
	) -> Result<T, BackendError> {
		let url = self.op_url(path, op, params)?;
		let body = self.send(method, url).await?.bytes().await.map_err(transport_error)?;
		serde_json::from_slice(&body).map_err(|e| {
			BackendError::new(
				BackendErrorKind::Other,
				format!("unexpected {op} response: {e}"),
			)
		})
	}

	async fn boolean(
		&self,
		method: Method,
		path: &str,
		op: &str,
		params: &[(&str, &str)],
	) -> Result<bool, BackendError> {
		self.json::<BooleanResponse>(method, path, op, params)
			.await
			.map(|r| r.boolean)
	}

	async fn empty(&self, path: &str, op: &str, params: &[(&str, &str)]) -> Result<(), BackendError> {
		let url = self.op_url(path, op, params)?;
		self.send(Method::PUT, url).await.map(|_| ())
	}

	/// Resolves a data call on the NameNode into the DataNode to talk to.
	async fn data_target(&self, method: Method, url: Url) -> Result<DataTarget, BackendError> {
		let response = self.send(method, url).await?;

		if response.status().is_redirection() {
			let location = response
				.headers()
				.get(LOCATION)
				.and_then(|v| v.to_str().ok())
				.ok_or_else(|| {
					BackendError::new(BackendErrorKind::Other, "redirect without a Location")
				})?;
			return parse_location(location).map(DataTarget::Location);
		}

		let is_json = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.is_some_and(|v| v.starts_with("application/json"));
		if !is_json {
			return Ok(DataTarget::Inline(response));
		}

		let body = response.bytes().await.map_err(transport_error)?;
		let LocationResponse { location } = serde_json::from_slice(&body).map_err(|e| {
			BackendError::new(BackendErrorKind::Other, format!("unexpected redirect body: {e}"))
		})?;
		parse_location(&location).map(DataTarget::Location)
	}

	async fn open_range(
		&self,
		path: &str,
		range: Option<Range<u64>>,
	) -> Result<Response, BackendError> {
		let offset;
		let length;
		let mut params = vec![("noredirect", "true")];
		if let Some(range) = range {
			offset = range.start.to_string();
			length = (range.end - range.start).to_string();
			params.push(("offset", &offset));
			params.push(("length", &length));
		}

		let url = self.op_url(path, "OPEN", &params)?;
		match self.data_target(Method::GET, url).await? {
			DataTarget::Location(location) => {
				debug!(%location, "Reading from datanode");
				self.send(Method::GET, location).await
			}
			DataTarget::Inline(response) => Ok(response),
		}
	}
}

enum DataTarget {
	Location(Url),
	/// The gateway answered with the data itself (HttpFS does that).
	Inline(Response),
}

/// The root is addressed as `/webhdfs/v1/`.
fn segments_or_root(path: &str) -> Vec<&str> {
	let segments = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
	if segments.is_empty() {
		vec![""]
	} else {
		segments
	}
}

fn parse_location(location: &str) -> Result<Url, BackendError> {
	Url::parse(location).map_err(|e| {
		BackendError::new(
			BackendErrorKind::Other,
			format!("invalid datanode location {location:?}: {e}"),
		)
	})
}

fn transport_error(e: reqwest::Error) -> BackendError {
	let kind = if e.is_timeout() {
		BackendErrorKind::Timeout
	} else if e.is_connect() || e.is_request() {
		BackendErrorKind::Connection
	} else {
		BackendErrorKind::Other
	};
	BackendError::new(kind, e.to_string())
}

async fn check(response: Response) -> Result<Response, BackendError> {
	let status = response.status();
	if status.is_success() || status.is_redirection() {
		return Ok(response);
	}

	let body = response.bytes().await.unwrap_or_default();
	Err(remote_error(status, &body))
}

fn remote_error(status: StatusCode, body: &[u8]) -> BackendError {
	match serde_json::from_slice::<RemoteExceptionResponse>(body) {
		Ok(RemoteExceptionResponse { remote_exception }) => BackendError::new(
			exception_kind(&remote_exception.exception),
			format!("{}: {}", remote_exception.exception, remote_exception.message),
		),
		Err(_) => {
			let kind = match status {
				StatusCode::NOT_FOUND => BackendErrorKind::NotFound,
				StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
					BackendErrorKind::PermissionDenied
				}
				StatusCode::BAD_REQUEST => BackendErrorKind::InvalidArgument,
				StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
					BackendErrorKind::Timeout
				}
				_ => BackendErrorKind::Other,
			};
			BackendError::new(
				kind,
				format!("HTTP {status}: {}", String::from_utf8_lossy(body).trim()),
			)
		}
	}
}

fn exception_kind(exception: &str) -> BackendErrorKind {
	match exception {
		"FileNotFoundException" => BackendErrorKind::NotFound,
		"FileAlreadyExistsException" => BackendErrorKind::AlreadyExists,
		"AccessControlException" | "SecurityException" | "AuthorizationException" => {
			BackendErrorKind::PermissionDenied
		}
		"ParentNotDirectoryException" => BackendErrorKind::NotADirectory,
		"IllegalArgumentException"
		| "HadoopIllegalArgumentException"
		| "AclException"
		| "PathIsNotEmptyDirectoryException"
		| "InvalidPathException"
		| "UnsupportedOperationException" => BackendErrorKind::InvalidArgument,
		"StandbyException" | "RetriableException" | "SafeModeException" => {
			BackendErrorKind::Connection
		}
		_ => BackendErrorKind::Other,
	}
}

fn parse_permission(octal: &str) -> Result<u16, BackendError> {
	u16::from_str_radix(octal, 8).map_err(|_| {
		BackendError::new(
			BackendErrorKind::Other,
			format!("invalid permission string {octal:?}"),
		)
	})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatusJson {
	#[serde(default)]
	access_time: i64,
	#[serde(default)]
	block_size: u64,
	#[serde(default)]
	children_num: Option<u64>,
	#[serde(default)]
	file_id: Option<u64>,
	group: String,
	length: u64,
	modification_time: i64,
	owner: String,
	#[serde(default)]
	path_suffix: String,
	permission: String,
	#[serde(default)]
	replication: u16,
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	storage_policy: Option<u8>,
	#[serde(default)]
	symlink: Option<String>,
	#[serde(default)]
	acl_bit: bool,
	#[serde(default)]
	enc_bit: bool,
	#[serde(default)]
	ec_bit: bool,
}

impl TryFrom<FileStatusJson> for RawFileStatus {
	type Error = BackendError;

	fn try_from(json: FileStatusJson) -> Result<Self, Self::Error> {
		Ok(Self {
			path_suffix: json.path_suffix,
			is_directory: json.kind == "DIRECTORY",
			length: json.length,
			owner: json.owner,
			group: json.group,
			permission: parse_permission(&json.permission)?,
			modification_time: json.modification_time,
			access_time: json.access_time,
			block_size: json.block_size,
			replication: json.replication,
			file_id: json.file_id,
			children_num: json.children_num,
			storage_policy: json.storage_policy,
			symlink: json.symlink,
			acl_bit: json.acl_bit,
			enc_bit: json.enc_bit,
			ec_bit: json.ec_bit,
		})
	}
}

#[derive(Debug, Deserialize)]
struct FileStatusResponse {
	#[serde(rename = "FileStatus")]
	file_status: FileStatusJson,
}

#[derive(Debug, Deserialize)]
struct FileStatusesResponse {
	#[serde(rename = "FileStatuses")]
	file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
struct FileStatuses {
	#[serde(rename = "FileStatus", default)]
	file_status: Vec<FileStatusJson>,
}

#[derive(Debug, Deserialize)]
struct BooleanResponse {
	boolean: bool,
}

#[derive(Debug, Deserialize)]
struct PathResponse {
	#[serde(rename = "Path")]
	path: String,
}

#[derive(Debug, Deserialize)]
struct LocationResponse {
	#[serde(rename = "Location")]
	location: String,
}

#[derive(Debug, Deserialize)]
struct AclStatusResponse {
	#[serde(rename = "AclStatus")]
	acl_status: AclStatusJson,
}

#[derive(Debug, Deserialize)]
struct AclStatusJson {
	#[serde(default)]
	entries: Vec<String>,
	group: String,
	owner: String,
	#[serde(default)]
	permission: Option<String>,
	#[serde(rename = "stickyBit", default)]
	sticky: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionResponse {
	#[serde(rename = "RemoteException")]
	remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
	exception: String,
	#[serde(default)]
	message: String,
}

#[async_trait]
impl HdfsBackend for WebHdfsBackend {
	async fn file_status(&self, path: &str) -> Result<RawFileStatus, BackendError> {
		self.json::<FileStatusResponse>(Method::GET, path, "GETFILESTATUS", &[])
			.await?
			.file_status
			.try_into()
	}

	async fn list_status(&self, path: &str) -> Result<Vec<RawFileStatus>, BackendError> {
		self.json::<FileStatusesResponse>(Method::GET, path, "LISTSTATUS", &[])
			.await?
			.file_statuses
			.file_status
			.into_iter()
			.map(RawFileStatus::try_from)
			.collect()
	}

	async fn mkdirs(&self, path: &str, permission: u16) -> Result<bool, BackendError> {
		let permission = format!("{permission:o}");
		self.boolean(Method::PUT, path, "MKDIRS", &[("permission", &permission)])
			.await
	}

	async fn create(
		&self,
		path: &str,
		data: ByteStream,
		overwrite: bool,
	) -> Result<(), BackendError> {
		let url = self.op_url(
			path,
			"CREATE",
			&[
				("overwrite", if overwrite { "true" } else { "false" }),
				("noredirect", "true"),
			],
		)?;

		let location = match self.data_target(Method::PUT, url).await? {
			DataTarget::Location(location) => location,
			DataTarget::Inline(_) => {
				return Err(BackendError::new(
					BackendErrorKind::Other,
					"CREATE did not return a datanode location",
				))
			}
		};

		debug!(%location, "Writing to datanode");
		let response = self
			.client
			.put(location)
			.header(CONTENT_TYPE, "application/octet-stream")
			.body(Body::wrap_stream(data))
			.send()
			.await
			.map_err(transport_error)?;
		check(response).await.map(|_| ())
	}

	async fn read_range(&self, path: &str, range: Range<u64>) -> Result<Bytes, BackendError> {
		if range.is_empty() {
			return Ok(Bytes::new());
		}
		self.open_range(path, Some(range))
			.await?
			.bytes()
			.await
			.map_err(transport_error)
	}

	async fn open(&self, path: &str) -> Result<ByteStream, BackendError> {
		let mut body = self.open_range(path, None).await?.bytes_stream();

		// Response bodies are not `Sync`, so they are pumped through a channel.
		let (mut tx, rx) = mpsc::channel::<io::Result<Bytes>>(4);
		tokio::spawn(async move {
			while let Some(chunk) = body.next().await {
				let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
				let failed = chunk.is_err();
				if tx.send(chunk).await.is_err() || failed {
					break;
				}
			}
		});

		Ok(Box::pin(rx))
	}

	async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<bool, BackendError> {
		if overwrite {
			// rename2 answers with an empty body and reports refusals as exceptions
			return self
				.empty(
					from,
					"RENAME",
					&[("destination", to), ("renameoptions", "OVERWRITE")],
				)
				.await
				.map(|()| true);
		}

		self.boolean(Method::PUT, from, "RENAME", &[("destination", to)])
			.await
	}

	async fn delete(&self, path: &str, recursive: bool) -> Result<bool, BackendError> {
		let recursive = if recursive { "true" } else { "false" };
		self.boolean(Method::DELETE, path, "DELETE", &[("recursive", recursive)])
			.await
	}

	async fn set_permission(&self, path: &str, permission: u16) -> Result<(), BackendError> {
		let permission = format!("{permission:o}");
		self.empty(path, "SETPERMISSION", &[("permission", &permission)])
			.await
	}

	async fn acl_status(&self, path: &str) -> Result<RawAclStatus, BackendError> {
		let acl = self
			.json::<AclStatusResponse>(Method::GET, path, "GETACLSTATUS", &[])
			.await?
			.acl_status;

		// Older NameNodes omit the permission, so fall back to a status call.
		let permission = match acl.permission {
			Some(p) => parse_permission(&p)?,
			None => self.file_status(path).await?.permission,
		};

		Ok(RawAclStatus {
			owner: acl.owner,
			group: acl.group,
			sticky: acl.sticky || permission & 0o1000 != 0,
			permission,
			entries: acl.entries,
		})
	}

	async fn modify_acl_entries(&self, path: &str, spec: &str) -> Result<(), BackendError> {
		self.empty(path, "MODIFYACLENTRIES", &[("aclspec", spec)])
			.await
	}

	async fn remove_acl_entries(&self, path: &str, spec: &str) -> Result<(), BackendError> {
		self.empty(path, "REMOVEACLENTRIES", &[("aclspec", spec)])
			.await
	}

	async fn remove_default_acl(&self, path: &str) -> Result<(), BackendError> {
		self.empty(path, "REMOVEDEFAULTACL", &[]).await
	}

	async fn remove_acl(&self, path: &str) -> Result<(), BackendError> {
		self.empty(path, "REMOVEACL", &[]).await
	}

	async fn home_directory(&self) -> Result<String, BackendError> {
		self.json::<PathResponse>(Method::GET, "/", "GETHOMEDIRECTORY", &[])
			.await
			.map(|r| r.path)
	}

	fn backend_type(&self) -> BackendType {
		BackendType::WebHdfs
	}
}
