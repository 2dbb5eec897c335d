//! Pure classification of responses into pass/fail
//!
//! Every function here takes a response (or its decoded body) and either
//! returns the value a case needs or an error already classified into the
//! failure taxonomy. No I/O happens in this module.

use serde_json::{Map, Value};

use crate::error::{HarnessError, HarnessResult};
use crate::http_client::ApiResponse;
use crate::session::{id_to_string, AuthenticatedUser};

/// Marker the backend puts in the 400 body when bootstrap already happened
pub const USERS_ALREADY_EXIST: &str = "Users already exist";

/// Require an exact status code, anything else is a semantic failure
pub fn require_status(response: &ApiResponse, expected: u16) -> HarnessResult<()> {
    if response.status() == expected {
        Ok(())
    } else {
        Err(HarnessError::semantic(response.status(), response.body()))
    }
}

/// Require 200 and decode the JSON body
pub fn ok_json(response: &ApiResponse) -> HarnessResult<Value> {
    require_status(response, 200)?;
    response.json()
}

/// Require 200 and a JSON array
pub fn expect_list(response: &ApiResponse) -> HarnessResult<Vec<Value>> {
    match ok_json(response)? {
        Value::Array(items) => Ok(items),
        other => Err(HarnessError::protocol(format!(
            "expected a list, got {}",
            json_type(&other)
        ))),
    }
}

/// Require 200 and a JSON object
pub fn expect_object(response: &ApiResponse) -> HarnessResult<Map<String, Value>> {
    match ok_json(response)? {
        Value::Object(map) => Ok(map),
        other => Err(HarnessError::protocol(format!(
            "expected an object, got {}",
            json_type(&other)
        ))),
    }
}

/// Require 200, an object, and every listed field
pub fn expect_fields(response: &ApiResponse, required: &[&str]) -> HarnessResult<Map<String, Value>> {
    let map = expect_object(response)?;
    missing_fields(&map, required)?;
    Ok(map)
}

/// Fail with the names of all absent fields
pub fn missing_fields(map: &Map<String, Value>, required: &[&str]) -> HarnessResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| !map.contains_key(*field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::protocol(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// The created entity must echo the submitted value
pub fn expect_echo(body: &Value, field: &str, submitted: &str) -> HarnessResult<()> {
    match body.get(field).and_then(Value::as_str) {
        Some(echoed) if echoed == submitted => Ok(()),
        Some(echoed) => Err(HarnessError::protocol(format!(
            "echoed {} '{}' does not match submitted '{}'",
            field, echoed, submitted
        ))),
        None => Err(HarnessError::protocol(format!(
            "response does not echo '{}'",
            field
        ))),
    }
}

/// Server-assigned identifier of a created entity
pub fn extract_id(body: &Value) -> HarnessResult<String> {
    body.get("id")
        .and_then(id_to_string)
        .ok_or_else(|| HarnessError::protocol("response has no usable 'id'"))
}

/// Result of the first-admin bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
}

/// 200 creates; 400 mentioning existing users is an accepted no-op
pub fn classify_bootstrap(response: &ApiResponse) -> HarnessResult<BootstrapOutcome> {
    match response.status() {
        200 => Ok(BootstrapOutcome::Created),
        400 if response.body().contains(USERS_ALREADY_EXIST) => Ok(BootstrapOutcome::AlreadyExists),
        status => Err(HarnessError::semantic(status, response.body())),
    }
}

/// Token and identity from a login response
pub fn extract_login(response: &ApiResponse) -> HarnessResult<(String, AuthenticatedUser)> {
    let map = expect_fields(response, &["access_token", "user"])?;

    let token = map
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HarnessError::protocol("'access_token' is not a non-empty string"))?
        .to_string();

    let user = match map.get("user") {
        Some(value @ Value::Object(_)) => AuthenticatedUser::from_json(value),
        _ => return Err(HarnessError::protocol("'user' is not an object")),
    };

    Ok((token, user))
}

/// Broadcast id from an accepted emergency broadcast
pub fn check_broadcast(response: &ApiResponse) -> HarnessResult<String> {
    let body = ok_json(response)?;

    if !is_truthy(body.get("success")) {
        return Err(HarnessError::protocol("broadcast was not acknowledged as successful"));
    }

    body.get("broadcast_id")
        .and_then(id_to_string)
        .ok_or_else(|| HarnessError::protocol("broadcast has no 'broadcast_id'"))
}

/// Sum of all group sizes in a status-keyed structure
pub fn grouped_total(groups: &Map<String, Value>) -> usize {
    groups
        .values()
        .map(|group| match group {
            Value::Array(items) => items.len(),
            Value::Object(inner) => inner
                .get("users")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
            _ => 0,
        })
        .sum()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Null) | None => false,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
