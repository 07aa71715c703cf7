//! Static node descriptor consumed by the host's form renderer.
//!
//! Everything here is declarative data: the host decides how to draw the
//! fields, when to show them, and which credential to prompt for. The
//! descriptor has no behavior of its own.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::EventType;

pub const NODE_NAME: &str = "pagerDutyTrigger";
pub const DISPLAY_NAME: &str = "PagerDuty Trigger";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub group: &'static str,
    pub version: u32,
    pub credentials: Vec<CredentialRef>,
    pub properties: Vec<Property>,
}

/// Which host-managed credential the node needs, and when.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRef {
    pub name: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_when: Option<ShowWhen>,
}

/// Conditional visibility: show the field only while `field` holds one of
/// `values`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowWhen {
    pub field: &'static str,
    pub values: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: &'static str,
    pub display_name: &'static str,
    #[serde(flatten)]
    pub kind: PropertyKind,
    pub default: Value,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_when: Option<ShowWhen>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PropertyKind {
    /// Single choice, either from a fixed list or loaded at configuration
    /// time through the `load_options` operation.
    #[serde(rename_all = "camelCase")]
    Select {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        choices: Vec<Choice>,
        #[serde(skip_serializing_if = "Option::is_none")]
        load_from: Option<&'static str>,
    },
    /// Any subset of a fixed list.
    MultiSelect { choices: Vec<Choice> },
    Bool,
    Text,
    /// Optional settings grouped under one collapsed property.
    Group { properties: Vec<Property> },
    /// Repeatable tuple of fields, collected under `entry`.
    Repeating {
        entry: &'static str,
        fields: Vec<Property>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub name: &'static str,
    pub value: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

/// The full PagerDuty trigger descriptor.
pub fn descriptor() -> NodeDescriptor {
    NodeDescriptor {
        name: NODE_NAME,
        display_name: DISPLAY_NAME,
        description: "Starts the workflow when PagerDuty incident or service events occur",
        group: "trigger",
        version: 1,
        credentials: vec![
            CredentialRef {
                name: "pagerDutyApi",
                required: true,
                show_when: Some(ShowWhen {
                    field: "authentication",
                    values: vec!["apiToken"],
                }),
            },
            CredentialRef {
                name: "pagerDutyOAuth2Api",
                required: true,
                show_when: Some(ShowWhen {
                    field: "authentication",
                    values: vec!["oAuth2"],
                }),
            },
        ],
        properties: vec![
            Property {
                name: "authentication",
                display_name: "Authentication",
                kind: PropertyKind::Select {
                    choices: vec![
                        Choice {
                            name: "API Token",
                            value: "apiToken",
                            description: None,
                        },
                        Choice {
                            name: "OAuth2",
                            value: "oAuth2",
                            description: None,
                        },
                    ],
                    load_from: None,
                },
                default: json!("apiToken"),
                required: false,
                description: None,
                show_when: None,
            },
            Property {
                name: "filter",
                display_name: "Scope",
                kind: PropertyKind::Select {
                    choices: vec![
                        Choice {
                            name: "Account",
                            value: "account_reference",
                            description: Some("Receive events from everything in the account"),
                        },
                        Choice {
                            name: "Team",
                            value: "team_reference",
                            description: Some("Limit the events to a specific team"),
                        },
                        Choice {
                            name: "Service",
                            value: "service_reference",
                            description: Some("Limit the events to a specific service"),
                        },
                    ],
                    load_from: None,
                },
                default: json!("account_reference"),
                required: false,
                description: Some(
                    "Limit the events to a specific service or team. By default, events for the entire account are delivered.",
                ),
                show_when: None,
            },
            Property {
                name: "teamId",
                display_name: "Team",
                kind: PropertyKind::Select {
                    choices: vec![],
                    load_from: Some("teams"),
                },
                default: json!(""),
                required: true,
                description: None,
                show_when: Some(ShowWhen {
                    field: "filter",
                    values: vec!["team_reference"],
                }),
            },
            Property {
                name: "serviceId",
                display_name: "Service",
                kind: PropertyKind::Select {
                    choices: vec![],
                    load_from: Some("services"),
                },
                default: json!(""),
                required: true,
                description: None,
                show_when: Some(ShowWhen {
                    field: "filter",
                    values: vec!["service_reference"],
                }),
            },
            Property {
                name: "events",
                display_name: "Events",
                kind: PropertyKind::MultiSelect {
                    choices: event_choices(),
                },
                default: json!([]),
                required: true,
                description: Some("Which PagerDuty event types will trigger the workflow"),
                show_when: None,
            },
            Property {
                name: "options",
                display_name: "Options",
                kind: PropertyKind::Group {
                    properties: vec![
                        Property {
                            name: "customHeaders",
                            display_name: "Custom Headers",
                            kind: PropertyKind::Repeating {
                                entry: "parameter",
                                fields: vec![
                                    Property {
                                        name: "name",
                                        display_name: "Name",
                                        kind: PropertyKind::Text,
                                        default: json!(""),
                                        required: false,
                                        description: None,
                                        show_when: None,
                                    },
                                    Property {
                                        name: "value",
                                        display_name: "Value",
                                        kind: PropertyKind::Text,
                                        default: json!(""),
                                        required: false,
                                        description: None,
                                        show_when: None,
                                    },
                                ],
                            },
                            default: json!({}),
                            required: false,
                            description: Some(
                                "Headers PagerDuty will attach to every event it delivers to this subscription",
                            ),
                            show_when: None,
                        },
                        Property {
                            name: "fullRequest",
                            display_name: "Include Headers and Query Parameters",
                            kind: PropertyKind::Bool,
                            default: json!(false),
                            required: false,
                            description: Some(
                                "Whether to emit the full request (headers and query parameters) in addition to the body",
                            ),
                            show_when: None,
                        },
                    ],
                },
                default: json!({}),
                required: false,
                description: None,
                show_when: None,
            },
        ],
    }
}

fn event_choices() -> Vec<Choice> {
    EventType::ALL
        .iter()
        .map(|event| Choice {
            name: event.label(),
            value: event.as_str(),
            description: Some(event.blurb()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(value: &'a Value, name: &str) -> &'a Value {
        value["properties"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == name)
            .unwrap()
    }

    #[test]
    fn descriptor_serializes_with_conditional_selectors() {
        let value = serde_json::to_value(descriptor()).unwrap();

        assert_eq!(value["name"], "pagerDutyTrigger");
        assert_eq!(value["group"], "trigger");

        let team = find(&value, "teamId");
        assert_eq!(team["showWhen"]["field"], "filter");
        assert_eq!(team["showWhen"]["values"][0], "team_reference");
        assert_eq!(team["loadFrom"], "teams");
        assert_eq!(team["required"], true);

        let service = find(&value, "serviceId");
        assert_eq!(service["showWhen"]["values"][0], "service_reference");
        assert_eq!(service["loadFrom"], "services");
    }

    #[test]
    fn all_sixteen_events_are_selectable() {
        let value = serde_json::to_value(descriptor()).unwrap();
        let events = find(&value, "events");
        assert_eq!(events["type"], "multiSelect");
        assert_eq!(events["choices"].as_array().unwrap().len(), 16);
        assert_eq!(events["required"], true);
        assert!(events["choices"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["value"] == "incident.triggered"));
    }

    #[test]
    fn options_group_holds_headers_and_full_request() {
        let value = serde_json::to_value(descriptor()).unwrap();
        let options = find(&value, "options");
        let inner = options["properties"].as_array().unwrap();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0]["name"], "customHeaders");
        assert_eq!(inner[0]["entry"], "parameter");
        assert_eq!(inner[1]["name"], "fullRequest");
        assert_eq!(inner[1]["default"], false);
    }

    #[test]
    fn credentials_follow_the_authentication_mode() {
        let value = serde_json::to_value(descriptor()).unwrap();
        let credentials = value["credentials"].as_array().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0]["showWhen"]["values"][0], "apiToken");
        assert_eq!(credentials[1]["showWhen"]["values"][0], "oAuth2");
    }
}
