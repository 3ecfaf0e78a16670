//! Field extraction from raw messaging events

use super::types::{AUDIO_KIND, KNOWN_KINDS, MessageInfo, UNKNOWN_KIND};
use crate::utils::error::{RelayError, Result};
use serde_json::Value;

pub(super) fn message_info(event: &Value) -> Result<MessageInfo> {
    let event = event
        .as_object()
        .ok_or_else(|| RelayError::filter("event payload must be a JSON object"))?;

    let message = match event.get("message") {
        None | Some(Value::Null) => None,
        Some(Value::Object(message)) => Some(message),
        Some(other) => {
            return Err(RelayError::filter(format!(
                "message must be an object, got {}",
                json_type(other)
            )));
        }
    };

    let kind = message
        .and_then(|m| {
            KNOWN_KINDS
                .iter()
                .find(|kind| m.get(**kind).is_some_and(is_present))
        })
        .copied()
        .unwrap_or(UNKNOWN_KIND);

    let is_text = kind == "conversation" || kind == "extendedTextMessage";
    let text = message.and_then(|m| {
        m.get("conversation")
            .and_then(Value::as_str)
            .or_else(|| {
                m.get("extendedTextMessage")
                    .and_then(|ext| ext.get("text"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
    });

    let audio = message.and_then(|m| m.get(AUDIO_KIND)).filter(|a| is_present(a));
    let audio_size = audio.and_then(|a| a.get("fileLength")).and_then(file_length);
    let audio_duration = match audio {
        Some(a) => audio_duration(a)?,
        None => None,
    };

    let remote_jid = event
        .get("key")
        .and_then(|key| key.get("remoteJid"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(MessageInfo {
        kind: kind.to_string(),
        is_text,
        text,
        audio_size,
        audio_duration,
        remote_jid,
    })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// `fileLength` arrives as a number, a numeric string or a `{low, high}` long
fn file_length(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(long) => long.get("low").and_then(Value::as_u64),
        _ => None,
    }
}

fn audio_duration(audio: &Value) -> Result<Option<f64>> {
    let raw = audio.get("seconds").or_else(|| audio.get("duration"));
    let seconds = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => Ok(Some(s)),
        Some(s) => Err(RelayError::filter(format!("invalid audio duration {}", s))),
        None => Err(RelayError::filter("audio duration is not numeric")),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
