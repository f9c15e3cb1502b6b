use async_trait::async_trait;
use serde::Deserialize;

use super::{CallContext, Operation};
use crate::error::Result;

/// Drops the cached connection of a profile, e.g. after its settings changed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateProfile {
	pub profile_id: String,
}

#[async_trait]
impl Operation for InvalidateProfile {
	const METHOD: &'static str = "invalidateProfile";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		Ok(ctx.gateway.registry().invalidate(&self.profile_id).await)
	}
}

/// Cancels a running transfer or export started with the same `requestId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancel {
	pub request_id: String,
}

#[async_trait]
impl Operation for Cancel {
	const METHOD: &'static str = "cancel";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		Ok(ctx.requests.cancel(&self.request_id))
	}
}
