//! Messages crossing the isolation boundary between host and plugin.
//!
//! Plugins talk back to the host with a `finish` message when the user is
//! done with a card. The host may push cosmetic events into the mounted
//! plugin. Plugin traffic is untrusted: it is origin-checked first and then
//! decoded leniently into a closed set of types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::{Origin, Url};

use crate::error::HostError;
use crate::loader::Generation;

/// Wire tag of the plugin → host completion message.
pub const FINISH_TYPE: &str = "finish";

// ─── Plugin → host ──────────────────────────────────────────────────────

/// Why a plugin reported that it is done with a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Success,
    Failure,
    Timeout,
}

impl FinishReason {
    /// Unknown or missing reasons are treated as failure so a garbled signal
    /// never counts as a successful review.
    fn parse(raw: Option<&Value>) -> Self {
        match raw.and_then(Value::as_str) {
            Some("success") => FinishReason::Success,
            Some("timeout") => FinishReason::Timeout,
            _ => FinishReason::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Success => "success",
            FinishReason::Failure => "failure",
            FinishReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded completion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub reason: FinishReason,
    /// `None` when the plugin did not send an integer status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
}

impl Completion {
    /// Every decodable completion means the plugin is done, whatever the
    /// reason. The reason only labels the outcome.
    pub fn has_finished(&self) -> bool {
        true
    }
}

/// Decode an untyped value received from a plugin.
///
/// Total: any input yields either a completion or `None`.
pub fn decode(raw: &Value) -> Option<Completion> {
    let obj = raw.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some(FINISH_TYPE) {
        return None;
    }

    Some(Completion {
        reason: FinishReason::parse(obj.get("reason")),
        status_code: obj.get("statusCode").and_then(Value::as_i64),
    })
}

// ─── Origins & envelopes ────────────────────────────────────────────────

/// The host's own origin. Only plugin traffic from this origin is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOrigin {
    url: Url,
    origin: Origin,
}

impl HostOrigin {
    pub fn parse(raw: &str) -> Result<Self, HostError> {
        let url = Url::parse(raw)?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(HostError::Url(url::ParseError::EmptyHost));
        }
        Ok(Self { url, origin })
    }

    /// Whether a declared message origin is exactly ours. Opaque origins
    /// such as `"null"` and unparseable strings never match.
    pub fn matches(&self, declared: &str) -> bool {
        match Url::parse(declared) {
            Ok(url) => url.origin() == self.origin,
            Err(_) => false,
        }
    }

    /// Base URL that mount targets are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.url
    }

    /// `scheme://host[:port]`, the form browsers put in `event.origin`.
    pub fn serialized(&self) -> String {
        self.origin.ascii_serialization()
    }
}

impl fmt::Display for HostOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized())
    }
}

/// A plugin message as delivered by the host surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Origin the boundary declared for the sender.
    pub origin: String,
    /// Generation of the mount the message came from.
    pub generation: Generation,
    /// Raw message body.
    #[serde(default)]
    pub data: Value,
}

/// Why an envelope did not yield a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    CrossOrigin,
    NotCompletion,
}

/// Origin-check an envelope, then decode its body.
///
/// Cross-origin traffic is dropped before the decoder ever sees it.
pub fn accept(envelope: &Envelope, host_origin: &HostOrigin) -> Result<Completion, Rejection> {
    if !host_origin.matches(&envelope.origin) {
        return Err(Rejection::CrossOrigin);
    }
    decode(&envelope.data).ok_or(Rejection::NotCompletion)
}

impl From<Rejection> for HostError {
    fn from(rejection: Rejection) -> Self {
        let detail = match rejection {
            Rejection::CrossOrigin => "sender origin does not match the host",
            Rejection::NotCompletion => "not a finish message",
        };
        HostError::MalformedMessage(detail.to_string())
    }
}

// ─── Host → plugin ──────────────────────────────────────────────────────

/// Background colors a host may ask a plugin to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    pub const PALETTE: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    /// Next color in palette order, wrapping around.
    pub fn next(self) -> Color {
        let idx = Self::PALETTE.iter().position(|c| *c == self).unwrap_or(0);
        Self::PALETTE[(idx + 1) % Self::PALETTE.len()]
    }
}

/// Messages the host sends into a mounted plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    ChangeBackgroundColor { color: Color },
}
