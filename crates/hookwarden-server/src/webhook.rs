//! Delivery validation.
//!
//! Checks run in a fixed order and the first failure wins: method, required
//! headers, content type, signature, payload syntax. A delivery only becomes
//! a [`WebhookEvent`] once its signature matched the live HMAC secret.

use crate::error::{HookError, HookResult};
use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use hookwarden_common_secret::TokenGenerator;
use hookwarden_plugin::{EventKind, WebhookEvent};
use serde::de::IgnoredAny;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

fn required<'a>(headers: &'a HeaderMap, name: &'static str) -> HookResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(HookError::MissingHeader(name))
}

fn is_json(headers: &HeaderMap) -> Result<(), String> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if mime.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(content_type.to_string())
    }
}

/// Validate a delivery and turn it into a [`WebhookEvent`].
pub fn validate(method: &Method, headers: &HeaderMap, body: Bytes, hmac: &TokenGenerator) -> HookResult<WebhookEvent> {
    if method != Method::POST {
        return Err(HookError::MethodNotAllowed(method.to_string()));
    }

    let kind = EventKind::parse(required(headers, EVENT_HEADER)?);
    let delivery = required(headers, DELIVERY_HEADER)?.to_string();
    let signature = required(headers, SIGNATURE_HEADER)?;
    is_json(headers).map_err(HookError::UnsupportedContentType)?;

    if !hmac.verify(&body, signature) {
        return Err(HookError::InvalidSignature);
    }

    serde_json::from_slice::<IgnoredAny>(&body).map_err(|e| HookError::InvalidPayload(e.to_string()))?;

    Ok(WebhookEvent::new(kind, delivery, body))
}
