//! Webhook subscription lifecycle.
//!
//! The host drives three operations around workflow activation: verify
//! that a previously created subscription still exists, create one, and
//! delete one. The only state is the per-workflow static-data record the
//! host hands in and persists back out; PagerDuty owns the subscription
//! itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TriggerParams;
use crate::error::{Result, TriggerError};
use crate::types::{
    NewDeliveryMethod, NewFilter, NewSubscription, SubscriptionRequest, WebhookSubscription,
};

/// The PagerDuty calls the lifecycle needs. Implemented by the REST
/// client; tests substitute an in-memory fake.
#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    async fn get_subscription(&self, id: &str) -> Result<WebhookSubscription>;
    async fn create_subscription(&self, request: &SubscriptionRequest)
        -> Result<WebhookSubscription>;
    async fn delete_subscription(&self, id: &str) -> Result<()>;
}

/// Cached reference to the remote subscription, stored in the host's
/// per-workflow static data under camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhook_events: Vec<String>,
    /// Delivery signing secret, returned only by the creation call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

impl SubscriptionState {
    /// Read the record out of the host blob. Unknown keys and malformed
    /// blobs degrade to "nothing stored" rather than failing activation.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Host-resolved context for the create call.
pub struct HookContext<'a> {
    /// The public URL PagerDuty will deliver events to.
    pub webhook_url: &'a str,
    pub workflow_name: &'a str,
    pub node_name: &'a str,
}

/// Check whether the cached subscription still exists remotely.
///
/// With nothing cached this answers without a network call. A 404 means
/// someone removed the subscription out from under us: the stale cache is
/// dropped and the answer is "absent" so the host re-creates it.
pub async fn check_exists<A: SubscriptionApi + ?Sized>(
    api: &A,
    state: &mut SubscriptionState,
) -> Result<bool> {
    let Some(id) = state.webhook_id.clone() else {
        return Ok(false);
    };

    match api.get_subscription(&id).await {
        Ok(_) => Ok(true),
        Err(error) if error.is_not_found() => {
            debug!(webhook_id = %id, "subscription vanished remotely, clearing cached reference");
            state.clear();
            Ok(false)
        }
        Err(error) => Err(error),
    }
}

/// Create the subscription and cache its identity.
pub async fn create<A: SubscriptionApi + ?Sized>(
    api: &A,
    context: &HookContext<'_>,
    params: &TriggerParams,
    state: &mut SubscriptionState,
) -> Result<()> {
    reject_local_delivery_url(context.webhook_url)?;

    let request = SubscriptionRequest {
        webhook_subscription: NewSubscription {
            kind: "webhook_subscription",
            active: true,
            delivery_method: NewDeliveryMethod {
                kind: "http_delivery_method",
                url: context.webhook_url.to_string(),
                custom_headers: params.options.custom_headers.clone(),
            },
            description: format!(
                "[Nexus] {} in {}",
                context.node_name, context.workflow_name
            ),
            events: params.events.clone(),
            filter: NewFilter {
                kind: params.scope.kind(),
                id: params.scope.id().map(str::to_string),
            },
        },
    };

    debug!(
        auth = ?params.auth,
        scope = params.scope.kind(),
        events = params.events.len(),
        "creating PagerDuty webhook subscription"
    );

    let subscription = api.create_subscription(&request).await?;

    // A 2xx response is not enough: without an id and active=true the
    // subscription is unusable and activation must fail.
    if subscription.id.is_empty() || !subscription.active {
        return Err(TriggerError::UnexpectedResponse);
    }

    state.webhook_id = Some(subscription.id);
    state.webhook_events = subscription.events;
    state.webhook_secret = subscription.delivery_method.secret;

    Ok(())
}

/// Delete the cached subscription, tolerating "already gone".
///
/// Failures are reported as `false` and leave the cached reference in
/// place so a later deactivation can retry; they never block teardown.
pub async fn delete<A: SubscriptionApi + ?Sized>(
    api: &A,
    state: &mut SubscriptionState,
) -> bool {
    let Some(id) = state.webhook_id.clone() else {
        return true;
    };

    match api.delete_subscription(&id).await {
        Ok(()) => {
            state.clear();
            true
        }
        Err(error) => {
            warn!(webhook_id = %id, %error, "failed to delete PagerDuty webhook subscription");
            false
        }
    }
}

/// PagerDuty cannot route deliveries to a loopback address, so creation
/// refuses before touching the network.
fn reject_local_delivery_url(webhook_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(webhook_url)
        .map_err(|_| TriggerError::config(format!("invalid delivery URL: {webhook_url}")))?;

    if matches!(url.host_str(), Some("localhost" | "127.0.0.1")) {
        return Err(TriggerError::config(
            "the webhook cannot be delivered to localhost; expose the host on a public domain or tunnel first",
        ));
    }

    Ok(())
}
