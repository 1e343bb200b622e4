//! Core domain types for callflow
//!
//! These types mirror the records served by the call API. They are read-only
//! inputs: nothing in this crate mutates them, and every derived view
//! ([`Stage`], [`crate::journey::CallJourney`]) is rebuilt from them on demand.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Call** | One voice/chat session between a caller and the agent |
//! | **Transcript message** | A single utterance or tool message inside a call |
//! | **Tool invocation** | A structured side effect requested by the agent (escalation, engagement logging) |
//! | **Webhook event** | A lifecycle notification (`call.started`, `call.joined`, `call.ended`) |
//! | **Stage** | A derived, ordered unit of a call's timeline |
//! | **Speaker** | Who said a transcript message, as shown to the reader |
//!
//! Timestamps are kept as the raw strings the API returns. The server stores
//! them without a zone designator, so they must go through
//! [`crate::time::normalize_timestamp`] before being compared or displayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================
// Calls
// ============================================

/// Lifecycle status of a call as reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Call was created but nobody has connected yet
    #[default]
    Created,
    /// The vendor reported the call as started
    Started,
    /// A caller connected
    Joined,
    /// Call is over
    Ended,
    /// Any status string this crate does not know about
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Created => "created",
            CallStatus::Started => "started",
            CallStatus::Joined => "joined",
            CallStatus::Ended => "ended",
            CallStatus::Unknown => "unknown",
        }
    }

    /// Whether the call is currently in progress (someone is on the line)
    pub fn is_active(&self) -> bool {
        matches!(self, CallStatus::Joined | CallStatus::Started)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(CallStatus::Created),
            "started" => Ok(CallStatus::Started),
            "joined" => Ok(CallStatus::Joined),
            "ended" => Ok(CallStatus::Ended),
            _ => Err(format!("unknown call status: {}", s)),
        }
    }
}

/// A call record as returned by `GET /api/calls` and `GET /api/calls/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Opaque call identifier
    pub call_id: String,
    /// Current status
    #[serde(default)]
    pub status: CallStatus,
    /// When the call was created (naive UTC string)
    pub created_at: Option<String>,
    /// When a caller connected
    pub joined_at: Option<String>,
    /// When the call ended
    pub ended_at: Option<String>,
    /// Why the call ended (e.g. "user_hangup")
    pub end_reason: Option<String>,
    /// Whether the vendor recorded audio for this call
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub recording_enabled: bool,
    /// Free-form metadata; either a JSON object or a JSON-encoded string
    pub metadata: Option<Value>,
    /// Full summary produced at the end of the call
    pub summary: Option<String>,
    /// One-line summary produced at the end of the call
    pub short_summary: Option<String>,
}

impl CallRecord {
    /// Decoded metadata mapping; malformed metadata decodes to an empty map.
    pub fn metadata_map(&self) -> Map<String, Value> {
        decode_json_object(self.metadata.as_ref())
    }

    /// Whether a recording can be played back (recorded and finished)
    pub fn has_playable_recording(&self) -> bool {
        self.recording_enabled && self.ended_at.is_some()
    }
}

// ============================================
// Transcript
// ============================================

/// Explicit time span of a transcript message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timespan {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Role tag the vendor uses when it does not know who spoke
pub const UNSPECIFIED_ROLE: &str = "MESSAGE_ROLE_UNSPECIFIED";

/// A transcript message as returned by `GET /api/calls/{id}/messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Vendor role tag (`MESSAGE_ROLE_AGENT`, `MESSAGE_ROLE_USER`, ...)
    pub role: Option<String>,
    /// Message text
    pub text: Option<String>,
    /// Alternate text field used by chat transcripts
    pub content: Option<String>,
    /// Set when the message belongs to a tool call or result
    #[serde(rename = "toolName", alias = "tool_name")]
    pub tool_name: Option<String>,
    /// Groups messages into call stages
    #[serde(rename = "callStageId", alias = "call_stage_id")]
    pub call_stage_id: Option<String>,
    /// Explicit time span, when the vendor provides one
    pub timespan: Option<Timespan>,
    /// Fallback creation time
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
}

impl TranscriptMessage {
    /// Displayable text: `text`, then `content`, then a placeholder.
    pub fn body(&self) -> &str {
        non_empty(self.text.as_deref())
            .or_else(|| non_empty(self.content.as_deref()))
            .unwrap_or("No text")
    }

    /// Non-empty tool name, if any
    pub fn tool(&self) -> Option<&str> {
        non_empty(self.tool_name.as_deref())
    }

    /// Span start if present, else the creation time
    pub fn representative_time(&self) -> Option<&str> {
        self.timespan
            .as_ref()
            .and_then(|span| non_empty(span.start.as_deref()))
            .or_else(|| non_empty(self.created_at.as_deref()))
    }
}

/// Who spoke a transcript message, as presented to a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The voice agent
    Agent,
    /// The caller
    User,
    /// A tool call or result
    Tool,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::User => "user",
            Speaker::Tool => "tool",
        }
    }

    /// Short avatar label for chat-style rendering
    pub fn avatar(&self) -> &'static str {
        match self {
            Speaker::Agent => "AI",
            Speaker::User => "You",
            Speaker::Tool => "T",
        }
    }

    /// The other party in an agent/user alternation
    pub fn counterpart(&self) -> Speaker {
        match self {
            Speaker::Agent => Speaker::User,
            Speaker::User => Speaker::Agent,
            Speaker::Tool => Speaker::Tool,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Speaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Speaker::Agent),
            "user" => Ok(Speaker::User),
            "tool" => Ok(Speaker::Tool),
            _ => Err(format!("unknown speaker: {}", s)),
        }
    }
}

// ============================================
// Tools and Webhooks
// ============================================

/// A tool invocation logged by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Database row id
    pub id: Option<i64>,
    /// Call this invocation belongs to
    pub call_id: Option<String>,
    /// Tool name (`escalate_to_human`, `log_call_engagement`, ...)
    pub tool_name: String,
    /// Parameters, usually a JSON-encoded string
    #[serde(default)]
    pub parameters: Value,
    /// Creation time (timeline feeds)
    pub created_at: Option<String>,
    /// Invocation time (database rows)
    pub invoked_at: Option<String>,
}

impl ToolInvocation {
    /// When the tool was invoked: `created_at`, falling back to `invoked_at`
    pub fn time(&self) -> Option<&str> {
        non_empty(self.created_at.as_deref()).or_else(|| non_empty(self.invoked_at.as_deref()))
    }

    /// Decoded parameters; malformed parameters decode to an empty map.
    pub fn parameters_map(&self) -> Map<String, Value> {
        decode_json_object(Some(&self.parameters))
    }

    /// Decoded parameters, or `None` when they are not a JSON object.
    pub fn try_parameters_map(&self) -> Option<Map<String, Value>> {
        try_decode_json_object(&self.parameters)
    }
}

/// A lifecycle webhook received from the voice vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Option<i64>,
    pub call_id: Option<String>,
    #[serde(default = "unknown_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    pub received_at: Option<String>,
}

fn unknown_event_type() -> String {
    "unknown".to_string()
}

impl WebhookEvent {
    /// Display label: `call.ended` becomes `Ended`
    pub fn label(&self) -> String {
        crate::format::humanize_key(self.event_type.trim_start_matches("call."))
    }

    /// Decoded payload; malformed payloads decode to an empty map.
    pub fn payload_map(&self) -> Map<String, Value> {
        decode_json_object(Some(&self.payload))
    }
}

/// Envelope returned by `GET /api/calls/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDetails {
    pub call: CallRecord,
    #[serde(default)]
    pub webhooks: Vec<WebhookEvent>,
    #[serde(default)]
    pub tool_invocations: Vec<ToolInvocation>,
}

// ============================================
// Stages (derived)
// ============================================

/// Category of a timeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    System,
    User,
    Agent,
    Tool,
}

impl StageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageCategory::System => "system",
            StageCategory::User => "user",
            StageCategory::Agent => "agent",
            StageCategory::Tool => "tool",
        }
    }
}

impl std::fmt::Display for StageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data attached to a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    /// Transcript messages of a message-group stage, in input order
    Messages { messages: Vec<TranscriptMessage> },
    /// A tool invocation and its decoded parameters
    Tool {
        invocation: ToolInvocation,
        parameters: Map<String, Value>,
    },
}

/// A derived unit of a call's timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    /// Stable identifier (`created`, `joined`, group id, `tool-N`, `ended`)
    pub id: String,
    /// Display name
    pub name: String,
    /// One-line description
    pub description: String,
    /// Raw representative time
    pub time: Option<String>,
    /// Normalized representative time (`None` if missing or malformed)
    pub instant: Option<DateTime<Utc>>,
    /// Short icon tag
    pub icon: String,
    /// Stage category
    pub category: StageCategory,
    /// Attached messages or tool invocation
    pub payload: Option<StagePayload>,
}

impl Stage {
    /// Messages attached to this stage (empty for non-message stages)
    pub fn messages(&self) -> &[TranscriptMessage] {
        match &self.payload {
            Some(StagePayload::Messages { messages }) => messages,
            _ => &[],
        }
    }

    /// Number of attached messages, for message-group stages only
    pub fn message_count(&self) -> Option<usize> {
        match &self.payload {
            Some(StagePayload::Messages { messages }) => Some(messages.len()),
            _ => None,
        }
    }
}

// ============================================
// Helpers
// ============================================

/// Decode a JSON object that may arrive as an object or a JSON-encoded string.
///
/// Anything else (null, malformed text, non-object JSON) decodes to an empty map.
pub fn decode_json_object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        None | Some(Value::Null) => Map::new(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
        Some(value) => try_decode_json_object(value).unwrap_or_else(|| {
            tracing::debug!("Ignoring malformed JSON payload");
            Map::new()
        }),
    }
}

/// Strict form of [`decode_json_object`]: `None` unless the value is an
/// object or a string holding one.
pub fn try_decode_json_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(raw) => serde_json::from_str::<Map<String, Value>>(raw).ok(),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// SQLite hands booleans back as 0/1, so accept either form.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    })
}
