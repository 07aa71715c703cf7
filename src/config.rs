//! Typed view of the node's configuration parameters.
//!
//! The host hands every operation the raw parameter blob it collected
//! through the descriptor. Parsing happens once, up front, into the types
//! below; the lifecycle and delivery code never digs through JSON again.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TriggerError};

/// Which host credential is attached to outgoing PagerDuty calls.
///
/// The token itself is opaque; the host resolves and refreshes it. The
/// mode only decides which credential the host looks up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    #[default]
    ApiToken,
    OAuth2,
}

/// Scope of the subscription, resolved to its identifier at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Account,
    Team(String),
    Service(String),
}

impl ScopeFilter {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Account => "account_reference",
            Self::Team(_) => "team_reference",
            Self::Service(_) => "service_reference",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Account => None,
            Self::Team(id) | Self::Service(id) => Some(id),
        }
    }
}

/// The sixteen event tags a subscription can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "incident.acknowledged")]
    IncidentAcknowledged,
    #[serde(rename = "incident.annotated")]
    IncidentAnnotated,
    #[serde(rename = "incident.delegated")]
    IncidentDelegated,
    #[serde(rename = "incident.escalated")]
    IncidentEscalated,
    #[serde(rename = "incident.priority_updated")]
    IncidentPriorityUpdated,
    #[serde(rename = "incident.reassigned")]
    IncidentReassigned,
    #[serde(rename = "incident.reopened")]
    IncidentReopened,
    #[serde(rename = "incident.resolved")]
    IncidentResolved,
    #[serde(rename = "incident.responder.added")]
    IncidentResponderAdded,
    #[serde(rename = "incident.responder.replied")]
    IncidentResponderReplied,
    #[serde(rename = "incident.status_update_published")]
    IncidentStatusUpdatePublished,
    #[serde(rename = "incident.triggered")]
    IncidentTriggered,
    #[serde(rename = "incident.unacknowledged")]
    IncidentUnacknowledged,
    #[serde(rename = "service.created")]
    ServiceCreated,
    #[serde(rename = "service.deleted")]
    ServiceDeleted,
    #[serde(rename = "service.updated")]
    ServiceUpdated,
}

impl EventType {
    pub const ALL: [EventType; 16] = [
        Self::IncidentAcknowledged,
        Self::IncidentAnnotated,
        Self::IncidentDelegated,
        Self::IncidentEscalated,
        Self::IncidentPriorityUpdated,
        Self::IncidentReassigned,
        Self::IncidentReopened,
        Self::IncidentResolved,
        Self::IncidentResponderAdded,
        Self::IncidentResponderReplied,
        Self::IncidentStatusUpdatePublished,
        Self::IncidentTriggered,
        Self::IncidentUnacknowledged,
        Self::ServiceCreated,
        Self::ServiceDeleted,
        Self::ServiceUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncidentAcknowledged => "incident.acknowledged",
            Self::IncidentAnnotated => "incident.annotated",
            Self::IncidentDelegated => "incident.delegated",
            Self::IncidentEscalated => "incident.escalated",
            Self::IncidentPriorityUpdated => "incident.priority_updated",
            Self::IncidentReassigned => "incident.reassigned",
            Self::IncidentReopened => "incident.reopened",
            Self::IncidentResolved => "incident.resolved",
            Self::IncidentResponderAdded => "incident.responder.added",
            Self::IncidentResponderReplied => "incident.responder.replied",
            Self::IncidentStatusUpdatePublished => "incident.status_update_published",
            Self::IncidentTriggered => "incident.triggered",
            Self::IncidentUnacknowledged => "incident.unacknowledged",
            Self::ServiceCreated => "service.created",
            Self::ServiceDeleted => "service.deleted",
            Self::ServiceUpdated => "service.updated",
        }
    }

    /// Label shown in the host's multi-select.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IncidentAcknowledged => "Incident Acknowledged",
            Self::IncidentAnnotated => "Incident Annotated",
            Self::IncidentDelegated => "Incident Delegated",
            Self::IncidentEscalated => "Incident Escalated",
            Self::IncidentPriorityUpdated => "Incident Priority Updated",
            Self::IncidentReassigned => "Incident Reassigned",
            Self::IncidentReopened => "Incident Reopened",
            Self::IncidentResolved => "Incident Resolved",
            Self::IncidentResponderAdded => "Incident Responder Added",
            Self::IncidentResponderReplied => "Incident Responder Replied",
            Self::IncidentStatusUpdatePublished => "Incident Status Update Published",
            Self::IncidentTriggered => "Incident Triggered",
            Self::IncidentUnacknowledged => "Incident Unacknowledged",
            Self::ServiceCreated => "Service Created",
            Self::ServiceDeleted => "Service Deleted",
            Self::ServiceUpdated => "Service Updated",
        }
    }

    pub fn blurb(&self) -> &'static str {
        match self {
            Self::IncidentAcknowledged => "An incident was acknowledged",
            Self::IncidentAnnotated => "A note was added to an incident",
            Self::IncidentDelegated => "An incident was reassigned to another escalation policy",
            Self::IncidentEscalated => "An incident was escalated within its escalation level",
            Self::IncidentPriorityUpdated => "The priority of an incident changed",
            Self::IncidentReassigned => "An incident was reassigned to another user",
            Self::IncidentReopened => "An incident was reopened",
            Self::IncidentResolved => "An incident was resolved",
            Self::IncidentResponderAdded => "A responder was added to an incident",
            Self::IncidentResponderReplied => "A responder replied to a request",
            Self::IncidentStatusUpdatePublished => "A status update was published on an incident",
            Self::IncidentTriggered => "An incident was newly triggered",
            Self::IncidentUnacknowledged => "An incident was unacknowledged",
            Self::ServiceCreated => "A service was created",
            Self::ServiceDeleted => "A service was deleted",
            Self::ServiceUpdated => "A service was updated",
        }
    }
}

/// A header PagerDuty attaches to each delivery it sends us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// The optional settings group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerOptions {
    pub custom_headers: Vec<CustomHeader>,
    pub full_request: bool,
}

impl TriggerOptions {
    /// Read `options` out of the node's parameter blob. Absent keys fall
    /// back to defaults; the group itself is optional.
    pub fn from_params(params: &Value) -> Self {
        let options = params.get("options").cloned().unwrap_or(Value::Null);

        let custom_headers = options
            .get("customHeaders")
            .and_then(|headers| headers.get("parameter"))
            .and_then(|parameter| {
                serde_json::from_value::<Vec<CustomHeader>>(parameter.clone()).ok()
            })
            .unwrap_or_default();

        let full_request = options
            .get("fullRequest")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            custom_headers,
            full_request,
        }
    }
}

/// Everything the lifecycle operations need, parsed in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerParams {
    pub auth: AuthMode,
    pub scope: ScopeFilter,
    pub events: Vec<EventType>,
    pub options: TriggerOptions,
}

impl TriggerParams {
    pub fn from_params(params: &Value) -> Result<Self> {
        let auth = match params.get("authentication") {
            None | Some(Value::Null) => AuthMode::default(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| TriggerError::config(format!("unknown authentication mode: {value}")))?,
        };

        let scope = Self::resolve_scope(params)?;

        let events = match params.get("events") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| TriggerError::config(format!("unrecognized event selection: {value}")))?,
        };

        Ok(Self {
            auth,
            scope,
            events,
            options: TriggerOptions::from_params(params),
        })
    }

    /// The host's conditional-visibility rules make teamId/serviceId
    /// required when the matching scope is picked, but an empty
    /// identifier must still surface as a configuration error here, not
    /// as a malformed subscription request.
    fn resolve_scope(params: &Value) -> Result<ScopeFilter> {
        let filter = params
            .get("filter")
            .and_then(Value::as_str)
            .unwrap_or("account_reference");

        match filter {
            "account_reference" => Ok(ScopeFilter::Account),
            "team_reference" => {
                let id = require_scope_id(params, "teamId", "a team")?;
                Ok(ScopeFilter::Team(id))
            }
            "service_reference" => {
                let id = require_scope_id(params, "serviceId", "a service")?;
                Ok(ScopeFilter::Service(id))
            }
            other => Err(TriggerError::config(format!("unknown scope filter: {other}"))),
        }
    }
}

fn require_scope_id(params: &Value, key: &str, what: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            TriggerError::config(format!("the scope filter requires {what} to be selected"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_to_an_empty_blob() {
        let params = TriggerParams::from_params(&json!({})).unwrap();
        assert_eq!(params.auth, AuthMode::ApiToken);
        assert_eq!(params.scope, ScopeFilter::Account);
        assert!(params.events.is_empty());
        assert!(!params.options.full_request);
        assert!(params.options.custom_headers.is_empty());
    }

    #[test]
    fn full_blob_parses_into_typed_params() {
        let params = TriggerParams::from_params(&json!({
            "authentication": "oAuth2",
            "filter": "team_reference",
            "teamId": "PT4KHLK",
            "events": ["incident.triggered", "incident.resolved"],
            "options": {
                "fullRequest": true,
                "customHeaders": {
                    "parameter": [{ "name": "X-Env", "value": "prod" }]
                }
            }
        }))
        .unwrap();

        assert_eq!(params.auth, AuthMode::OAuth2);
        assert_eq!(params.scope, ScopeFilter::Team("PT4KHLK".into()));
        assert_eq!(
            params.events,
            vec![EventType::IncidentTriggered, EventType::IncidentResolved]
        );
        assert!(params.options.full_request);
        assert_eq!(params.options.custom_headers[0].name, "X-Env");
    }

    #[test]
    fn team_scope_without_id_is_a_config_error() {
        for blob in [
            json!({ "filter": "team_reference" }),
            json!({ "filter": "team_reference", "teamId": "" }),
        ] {
            let error = TriggerParams::from_params(&blob).unwrap_err();
            assert!(matches!(error, TriggerError::Config { .. }), "{error}");
        }
    }

    #[test]
    fn service_scope_resolves_its_own_id() {
        let params = TriggerParams::from_params(&json!({
            "filter": "service_reference",
            "serviceId": "PSVC123",
            // A leftover teamId from a previous scope choice is ignored.
            "teamId": "PT4KHLK",
        }))
        .unwrap();
        assert_eq!(params.scope, ScopeFilter::Service("PSVC123".into()));
        assert_eq!(params.scope.kind(), "service_reference");
        assert_eq!(params.scope.id(), Some("PSVC123"));
    }

    #[test]
    fn unknown_event_tag_is_rejected() {
        let error =
            TriggerParams::from_params(&json!({ "events": ["incident.exploded"] })).unwrap_err();
        assert!(matches!(error, TriggerError::Config { .. }));
    }

    #[test]
    fn event_tags_round_trip_through_serde() {
        for event in EventType::ALL {
            let tag = serde_json::to_value(event).unwrap();
            assert_eq!(tag, json!(event.as_str()));
            let back: EventType = serde_json::from_value(tag).unwrap();
            assert_eq!(back, event);
        }
    }
}
