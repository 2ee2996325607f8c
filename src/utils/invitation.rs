//! Invitation link codec
//!
//! Invitations travel as an absolute URI whose `c_i` query parameter is the
//! URL-escaped Base64 of a UTF-8 JSON document carrying an `@type` field.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;

use crate::utils::errors::{AgentBuddyError, Result};

/// Query parameter carrying the encoded invitation
pub const INVITATION_PARAM: &str = "c_i";

/// Encode a payload into `{endpoint}?c_i=<escaped base64 json>`
pub fn encode_invitation<T: Serialize>(endpoint: &str, payload: &T) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    let encoded = BASE64.encode(json.as_bytes());
    Ok(format!("{}?{}={}", endpoint, INVITATION_PARAM, urlencoding::encode(&encoded)))
}

/// Decode the `c_i` parameter of an invitation URI into raw JSON
pub fn decode_invitation(uri: &str) -> Result<Value> {
    let url = Url::parse(uri)?;
    let raw = raw_query_param(&url, INVITATION_PARAM).ok_or_else(|| {
        AgentBuddyError::MalformedPayload(format!("no {} parameter in {}", INVITATION_PARAM, uri))
    })?;

    // query_pairs() would turn '+' into a space and corrupt the base64 body
    let unescaped = urlencoding::decode(raw)
        .map_err(|e| AgentBuddyError::MalformedPayload(e.to_string()))?;
    let bytes = BASE64.decode(unescaped.trim().as_bytes())?;
    let json = String::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(&json)?;

    if !value.is_object() {
        return Err(AgentBuddyError::MalformedPayload("invitation is not a JSON object".to_string()));
    }
    Ok(value)
}

/// Decode an invitation into a typed message
pub fn decode_invitation_as<T: DeserializeOwned>(uri: &str) -> Result<T> {
    let value = decode_invitation(uri)?;
    serde_json::from_value(value).map_err(|e| AgentBuddyError::MalformedPayload(e.to_string()))
}

/// The `@type` discriminator of a decoded invitation
pub fn invitation_type(payload: &Value) -> Option<&str> {
    payload.get("@type").and_then(Value::as_str)
}

fn raw_query_param<'a>(url: &'a Url, name: &str) -> Option<&'a str> {
    url.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}
