//! Per-call views: the journey (detail page) and list rows.
//!
//! Both are plain values built from API data plus an explicit `now`, so a
//! renderer receives everything it needs without reaching for shared state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::format::{format_relative_time_opt, short_id};
use crate::insights::{collect_engagements, collect_escalations, Engagement, Escalation};
use crate::time::{call_duration, format_timestamp, normalize_opt, CallDuration};
use crate::timeline::build_timeline;
use crate::types::{CallDetails, CallRecord, CallStatus, Stage, TranscriptMessage, WebhookEvent};

/// Everything the call detail view shows for one call.
#[derive(Debug, Clone, Serialize)]
pub struct CallJourney {
    pub call: CallRecord,
    /// Ordered timeline
    pub stages: Vec<Stage>,
    /// Creation to end, or creation to `now` while the call is running
    pub duration: CallDuration,
    pub message_count: usize,
    pub tool_count: usize,
    /// Recording enabled and the call has ended
    pub recording_available: bool,
    /// Decoded call metadata (empty when malformed)
    pub metadata: Map<String, Value>,
    pub escalations: Vec<Escalation>,
    pub engagements: Vec<Engagement>,
    pub webhooks: Vec<WebhookEvent>,
}

impl CallJourney {
    /// Build the journey for a call.
    pub fn build(details: &CallDetails, messages: &[TranscriptMessage], now: DateTime<Utc>) -> Self {
        let call = &details.call;
        let tools = &details.tool_invocations;

        Self {
            call: call.clone(),
            stages: build_timeline(call, messages, tools),
            duration: call_duration(call, now),
            message_count: messages.len(),
            tool_count: tools.len(),
            recording_available: call.has_playable_recording(),
            metadata: call.metadata_map(),
            escalations: collect_escalations(&call.call_id, tools),
            engagements: collect_engagements(&call.call_id, tools),
            webhooks: details.webhooks.clone(),
        }
    }

    /// Number of timeline stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Look up a stage by id
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Short summary if present, else the full summary
    pub fn summary(&self) -> Option<&str> {
        self.call
            .short_summary
            .as_deref()
            .or(self.call.summary.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Marker for calls that have neither ended nor been joined
pub const ONGOING_LABEL: &str = "Ongoing";

/// One row of the calls list.
#[derive(Debug, Clone, Serialize)]
pub struct CallRow {
    pub call_id: String,
    pub short_id: String,
    pub status: CallStatus,
    /// Display form of the creation time
    pub created: String,
    /// Creation time relative to `now`
    pub created_relative: String,
    /// Duration text; `Ongoing` until the call is joined
    pub duration: String,
    pub end_reason: Option<String>,
}

impl CallRow {
    pub fn new(call: &CallRecord, now: DateTime<Utc>) -> Self {
        let duration = if call.ended_at.is_some() || call.joined_at.is_some() {
            call_duration(call, now).to_string()
        } else {
            ONGOING_LABEL.to_string()
        };

        Self {
            call_id: call.call_id.clone(),
            short_id: short_id(&call.call_id, 12),
            status: call.status,
            created: format_timestamp(call.created_at.as_deref()),
            created_relative: format_relative_time_opt(
                normalize_opt(call.created_at.as_deref()),
                now,
            ),
            duration,
            end_reason: call.end_reason.clone(),
        }
    }
}

/// Rows for the most recent `limit` calls, newest first.
///
/// Calls whose creation time cannot be normalized go last.
pub fn recent_calls(calls: &[CallRecord], limit: usize, now: DateTime<Utc>) -> Vec<CallRow> {
    let mut sorted: Vec<&CallRecord> = calls.iter().collect();
    sorted.sort_by_key(|c| std::cmp::Reverse(normalize_opt(c.created_at.as_deref())));
    sorted
        .into_iter()
        .take(limit)
        .map(|c| CallRow::new(c, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(value: Value) -> CallRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_journey_counts_and_flags() {
        let details: CallDetails = serde_json::from_value(json!({
            "call": {
                "call_id": "call-123",
                "status": "ended",
                "created_at": "2024-01-01 00:00:00",
                "joined_at": "2024-01-01 00:00:05",
                "ended_at": "2024-01-01 00:02:05",
                "recording_enabled": true,
                "short_summary": "Caller asked about billing",
                "metadata": "{\"customer_tier\": \"gold\"}"
            },
            "webhooks": [{"event_type": "call.ended", "payload": "{}", "received_at": "2024-01-01 00:02:06"}],
            "tool_invocations": [
                {"tool_name": "escalate_to_human", "parameters": "{\"escalation_reason\": \"refund\"}", "invoked_at": "2024-01-01 00:01:00"}
            ]
        }))
        .unwrap();
        let messages = vec![TranscriptMessage {
            text: Some("Hello".to_string()),
            created_at: Some("2024-01-01 00:00:10".to_string()),
            ..Default::default()
        }];

        let journey = CallJourney::build(&details, &messages, now());
        assert_eq!(journey.duration, CallDuration::Finished(125));
        assert_eq!(journey.message_count, 1);
        assert_eq!(journey.tool_count, 1);
        assert_eq!(journey.stage_count(), 5);
        assert!(journey.recording_available);
        assert_eq!(journey.metadata["customer_tier"], "gold");
        assert_eq!(journey.escalations.len(), 1);
        assert_eq!(journey.summary(), Some("Caller asked about billing"));
        assert!(journey.stage("tool-0").is_some());
    }

    #[test]
    fn test_running_call_duration_is_ongoing() {
        let details = CallDetails {
            call: record(json!({
                "call_id": "live",
                "status": "joined",
                "created_at": "2024-01-01 00:59:00",
                "joined_at": "2024-01-01 00:59:10",
                "recording_enabled": true
            })),
            webhooks: vec![],
            tool_invocations: vec![],
        };
        let journey = CallJourney::build(&details, &[], now());
        assert_eq!(journey.duration.to_string(), "1m 0s (ongoing)");
        assert!(!journey.recording_available);
    }

    #[test]
    fn test_call_row_durations() {
        let unjoined = record(json!({"call_id": "a", "created_at": "2024-01-01 00:30:00"}));
        assert_eq!(CallRow::new(&unjoined, now()).duration, ONGOING_LABEL);

        let joined = record(json!({
            "call_id": "b",
            "created_at": "2024-01-01 00:30:00",
            "joined_at": "2024-01-01 00:30:05"
        }));
        assert_eq!(CallRow::new(&joined, now()).duration, "30m 0s (ongoing)");

        let ended = record(json!({
            "call_id": "c",
            "created_at": "2024-01-01 00:30:00",
            "ended_at": "2024-01-01 00:31:30",
            "end_reason": "agent_hangup"
        }));
        let row = CallRow::new(&ended, now());
        assert_eq!(row.duration, "1m 30s");
        assert_eq!(row.created_relative, "30m ago");
        assert_eq!(row.end_reason.as_deref(), Some("agent_hangup"));
    }

    #[test]
    fn test_recent_calls_newest_first() {
        let calls = vec![
            record(json!({"call_id": "old", "created_at": "2024-01-01 00:00:00"})),
            record(json!({"call_id": "broken", "created_at": "??"})),
            record(json!({"call_id": "new", "created_at": "2024-01-01 00:50:00"})),
        ];
        let rows = recent_calls(&calls, 10, now());
        let ids: Vec<_> = rows.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "broken"]);
        assert_eq!(recent_calls(&calls, 1, now()).len(), 1);
    }
}
