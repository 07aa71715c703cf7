//! Translation of inbound PagerDuty deliveries into workflow records.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::config::TriggerOptions;
use crate::subscription::SubscriptionState;
use crate::verification::verify_signature;

pub const SIGNATURE_HEADER: &str = "x-pagerduty-signature";

/// One delivered HTTP call, as forwarded by the host's webhook endpoint.
#[derive(Debug, Clone, Default)]
pub struct InboundDelivery {
    pub body: Value,
    /// The body exactly as received on the wire; only needed for the
    /// signature check, which is skipped when the host omits it.
    pub raw_body: Option<String>,
    pub headers: Map<String, Value>,
    pub query: Map<String, Value>,
}

/// What the host should do with a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Answer with this literal and do not run the workflow.
    Ack(&'static str),
    /// Signature check failed: answer non-OK, run nothing.
    Rejected,
    /// Run the workflow with these records.
    Emit(Vec<Value>),
}

/// Turn a delivery into workflow records.
///
/// The first call on a fresh subscription is a verification ping (a
/// `hook_id` with no `action`); it is acknowledged without running the
/// workflow. Everything else emits exactly one record: the body alone, or
/// the full `{body, headers, query}` composite when the user asked for it
/// or configured custom headers (whose values only show up in the header
/// map).
pub fn handle_delivery(
    delivery: &InboundDelivery,
    options: &TriggerOptions,
    state: &SubscriptionState,
) -> DeliveryOutcome {
    if let Some(outcome) = reject_bad_signature(delivery, state) {
        return outcome;
    }

    let is_ping =
        delivery.body.get("hook_id").is_some() && delivery.body.get("action").is_none();
    if is_ping {
        return DeliveryOutcome::Ack("OK");
    }

    let full_request = options.full_request || !options.custom_headers.is_empty();
    let record = if full_request {
        json!({
            "body": delivery.body,
            "headers": delivery.headers,
            "query": delivery.query,
        })
    } else {
        delivery.body.clone()
    };

    DeliveryOutcome::Emit(vec![record])
}

/// Verify the delivery signature when both sides of the check exist: a
/// stored signing secret and a signed raw body. With either missing the
/// delivery is passed through untouched.
fn reject_bad_signature(
    delivery: &InboundDelivery,
    state: &SubscriptionState,
) -> Option<DeliveryOutcome> {
    let secret = state.webhook_secret.as_deref()?;
    let raw_body = delivery.raw_body.as_deref()?;
    let signature = header_value(&delivery.headers, SIGNATURE_HEADER)?;

    if verify_signature(secret, raw_body.as_bytes(), signature) {
        None
    } else {
        warn!("rejecting PagerDuty delivery with an invalid signature");
        Some(DeliveryOutcome::Rejected)
    }
}

fn header_value<'a>(headers: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}
