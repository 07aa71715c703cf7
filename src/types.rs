//! Wire types for the PagerDuty REST API.

use serde::{Deserialize, Serialize};

use crate::config::{CustomHeader, EventType};

/// The slice of a webhook subscription response the trigger reads.
///
/// Every field defaults so that a structurally thin response still
/// deserializes; the lifecycle code validates `id`/`active` afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSubscription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryMethod {
    /// Signing secret, returned once in the creation response.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Envelope around single-subscription responses.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionEnvelope {
    #[serde(default)]
    pub webhook_subscription: WebhookSubscription,
}

/// Creation request, nested the way the API expects it.
#[derive(Debug, Serialize)]
pub struct SubscriptionRequest {
    pub webhook_subscription: NewSubscription,
}

#[derive(Debug, Serialize)]
pub struct NewSubscription {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub active: bool,
    pub delivery_method: NewDeliveryMethod,
    pub description: String,
    pub events: Vec<EventType>,
    pub filter: NewFilter,
}

#[derive(Debug, Serialize)]
pub struct NewDeliveryMethod {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
    pub custom_headers: Vec<CustomHeader>,
}

/// The `id` key is left out entirely for account-wide subscriptions.
#[derive(Debug, Serialize)]
pub struct NewFilter {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One page of a paginated collection listing.
///
/// PagerDuty uses classic offset pagination; `more` signals that another
/// page follows. The collection key differs per resource, so each listing
/// gets its own page type.
#[derive(Debug, Deserialize)]
pub struct TeamsPage {
    #[serde(default)]
    pub teams: Vec<NamedRef>,
    #[serde(default)]
    pub more: bool,
}

#[derive(Debug, Deserialize)]
pub struct ServicesPage {
    #[serde(default)]
    pub services: Vec<NamedRef>,
    #[serde(default)]
    pub more: bool,
}

/// Reference objects carry `summary` where full objects carry `name`.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub id: String,
    #[serde(alias = "summary")]
    pub name: String,
}

/// A selectable choice handed back to the host's configuration UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thin_subscription_response_still_deserializes() {
        let envelope: SubscriptionEnvelope =
            serde_json::from_value(json!({ "webhook_subscription": {} })).unwrap();
        assert!(envelope.webhook_subscription.id.is_empty());
        assert!(!envelope.webhook_subscription.active);

        let empty: SubscriptionEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(empty.webhook_subscription.id.is_empty());
    }

    #[test]
    fn named_ref_accepts_summary_alias() {
        let reference: NamedRef =
            serde_json::from_value(json!({ "id": "PT1", "summary": "Platform" })).unwrap();
        assert_eq!(reference.name, "Platform");
    }

    #[test]
    fn account_filter_serializes_without_id_key() {
        let filter = NewFilter {
            kind: "account_reference",
            id: None,
        };
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value, json!({ "type": "account_reference" }));
    }
}
