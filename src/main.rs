//! PagerDuty trigger extension for the Nexus workflow-automation host.
//!
//! The host spawns this binary and drives it over line-delimited JSON-RPC
//! on stdin/stdout: `describe` feeds the configuration UI, the
//! `*_webhook` operations run around workflow activation/deactivation,
//! and `handle_delivery` translates each PagerDuty callback the host's
//! webhook endpoint receives. Credentials, parameter resolution, HTTP
//! serving, and static-data persistence all live host-side; every request
//! carries what the operation needs and every lifecycle response returns
//! the updated static data.

mod client;
mod config;
mod delivery;
mod descriptor;
mod error;
mod subscription;
mod types;
mod verification;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

use client::PagerDutyClient;
use config::{TriggerOptions, TriggerParams};
use delivery::{handle_delivery, DeliveryOutcome, InboundDelivery};
use error::{Result, TriggerError};
use subscription::{HookContext, SubscriptionState};

// ─── JSON-RPC wire types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn ok_response(id: Value, data: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: Some(json!({
            "success": true,
            "data": data,
            "message": null
        })),
        error: None,
        id,
    }
}

fn err_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: None,
        error: Some(JsonRpcError { code, message }),
        id,
    }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let handle = tokio::runtime::Handle::current();

    // Stdin loop on a blocking thread to avoid blocking the async runtime.
    tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut line = String::new();

        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                _ => {}
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let resp =
                        err_response(Value::Number(0.into()), -32700, format!("Parse error: {e}"));
                    emit_line(&mut out, &resp);
                    continue;
                }
            };

            let is_shutdown = request.method == "shutdown";

            let response = handle.block_on(handle_request(&request));
            emit_line(&mut out, &response);

            if is_shutdown {
                break;
            }
        }
    })
    .await
    .context("stdin loop terminated abnormally")?;

    Ok(())
}

fn emit_line(out: &mut impl Write, resp: &JsonRpcResponse) {
    let line = serde_json::to_string(resp).expect("serialize response");
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

// ─── Request dispatch ─────────────────────────────────────────────────────────

async fn handle_request(req: &JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => JsonRpcResponse {
            jsonrpc: "2.0",
            result: Some(json!({ "ready": true })),
            error: None,
            id: req.id.clone(),
        },
        "shutdown" => JsonRpcResponse {
            jsonrpc: "2.0",
            result: Some(json!({})),
            error: None,
            id: req.id.clone(),
        },
        "execute" => handle_execute(req).await,
        _ => err_response(
            req.id.clone(),
            -32601,
            format!("Unknown method: {}", req.method),
        ),
    }
}

async fn handle_execute(req: &JsonRpcRequest) -> JsonRpcResponse {
    let operation = req
        .params
        .get("operation")
        .and_then(Value::as_str)
        .unwrap_or("");
    let input = req
        .params
        .get("input")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let result = match operation {
        "describe" => op_describe(),
        "load_options" => op_load_options(&input).await,
        "check_webhook" => op_check_webhook(&input).await,
        "create_webhook" => op_create_webhook(&input).await,
        "delete_webhook" => op_delete_webhook(&input).await,
        "handle_delivery" => op_handle_delivery(&input),
        _ => Err(TriggerError::config(format!(
            "unknown operation: {operation}"
        ))),
    };

    match result {
        Ok(data) => ok_response(req.id.clone(), data),
        Err(error) => err_response(req.id.clone(), -32000, error.to_string()),
    }
}

// ─── Operations ───────────────────────────────────────────────────────────────

fn op_describe() -> Result<Value> {
    serde_json::to_value(descriptor::descriptor())
        .map_err(|e| TriggerError::config(format!("descriptor serialization failed: {e}")))
}

/// Populate a selector at configuration time: `resource` is `teams` or
/// `services`. Errors bubble to the host UI as a load failure.
async fn op_load_options(input: &Value) -> Result<Value> {
    let resource = require_str(input, "resource")?;
    let client = client_from(input)?;

    let options = match resource {
        "teams" => client.list_teams().await?,
        "services" => client.list_services().await?,
        other => {
            return Err(TriggerError::config(format!(
                "unknown option resource: {other}"
            )))
        }
    };

    Ok(json!({ "options": options }))
}

async fn op_check_webhook(input: &Value) -> Result<Value> {
    let client = client_from(input)?;
    let mut state = state_from(input);

    let exists = subscription::check_exists(&client, &mut state).await?;

    Ok(json!({ "exists": exists, "static_data": state.to_value() }))
}

async fn op_create_webhook(input: &Value) -> Result<Value> {
    let client = client_from(input)?;
    let params = TriggerParams::from_params(params_blob(input))?;
    let mut state = state_from(input);

    let context = HookContext {
        webhook_url: require_str(input, "webhook_url")?,
        workflow_name: input
            .get("workflow_name")
            .and_then(Value::as_str)
            .unwrap_or("workflow"),
        node_name: input
            .get("node_name")
            .and_then(Value::as_str)
            .unwrap_or(descriptor::DISPLAY_NAME),
    };

    subscription::create(&client, &context, &params, &mut state).await?;

    Ok(json!({ "created": true, "static_data": state.to_value() }))
}

/// Deactivation must always complete: a failed remote delete reports
/// `deleted: false` but is not an RPC error.
async fn op_delete_webhook(input: &Value) -> Result<Value> {
    let client = client_from(input)?;
    let mut state = state_from(input);

    let deleted = subscription::delete(&client, &mut state).await;

    Ok(json!({ "deleted": deleted, "static_data": state.to_value() }))
}

fn op_handle_delivery(input: &Value) -> Result<Value> {
    let options = TriggerOptions::from_params(params_blob(input));
    let state = state_from(input);

    let inbound = InboundDelivery {
        body: input.get("body").cloned().unwrap_or(Value::Null),
        raw_body: input
            .get("raw_body")
            .and_then(Value::as_str)
            .map(String::from),
        headers: object_from(input, "headers"),
        query: object_from(input, "query"),
    };

    Ok(match handle_delivery(&inbound, &options, &state) {
        DeliveryOutcome::Ack(text) => json!({ "webhook_response": text }),
        DeliveryOutcome::Rejected => {
            json!({ "webhook_response": "invalid signature", "status": 401 })
        }
        DeliveryOutcome::Emit(records) => json!({ "records": records }),
    })
}

// ─── Input helpers ────────────────────────────────────────────────────────────

fn require_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TriggerError::config(format!("missing required field: {key}")))
}

fn client_from(input: &Value) -> Result<PagerDutyClient> {
    PagerDutyClient::new(require_str(input, "credential")?)
}

fn state_from(input: &Value) -> SubscriptionState {
    SubscriptionState::from_value(input.get("static_data").unwrap_or(&Value::Null))
}

fn params_blob(input: &Value) -> &Value {
    input.get("parameters").unwrap_or(&Value::Null)
}

fn object_from(input: &Value, key: &str) -> Map<String, Value> {
    input
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_returns_the_node_descriptor() {
        let data = op_describe().unwrap();
        assert_eq!(data["name"], "pagerDutyTrigger");
        assert_eq!(data["properties"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn handle_delivery_acks_the_verification_ping() {
        let data = op_handle_delivery(&json!({
            "body": { "hook_id": "h1" },
            "parameters": {},
            "static_data": {},
        }))
        .unwrap();
        assert_eq!(data, json!({ "webhook_response": "OK" }));
    }

    #[test]
    fn handle_delivery_emits_the_body_by_default() {
        let data = op_handle_delivery(&json!({
            "body": { "action": "trigger", "event": { "id": "01A" } },
            "headers": { "content-type": "application/json" },
            "query": {},
            "parameters": {},
            "static_data": { "webhookId": "PWH1" },
        }))
        .unwrap();
        assert_eq!(
            data,
            json!({ "records": [{ "action": "trigger", "event": { "id": "01A" } }] })
        );
    }

    #[test]
    fn handle_delivery_honors_full_request() {
        let data = op_handle_delivery(&json!({
            "body": { "action": "trigger" },
            "headers": { "x-env": "prod" },
            "query": { "a": "b" },
            "parameters": { "options": { "fullRequest": true } },
            "static_data": {},
        }))
        .unwrap();
        let record = &data["records"][0];
        assert_eq!(record["body"]["action"], "trigger");
        assert_eq!(record["headers"]["x-env"], "prod");
        assert_eq!(record["query"]["a"], "b");
    }

    #[test]
    fn missing_credential_is_a_config_error() {
        let error = client_from(&json!({})).unwrap_err();
        assert!(matches!(error, TriggerError::Config { .. }));
    }
}
