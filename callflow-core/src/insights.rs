//! Escalation and engagement insights
//!
//! The voice agent reports outcomes through two tools:
//!
//! - `escalate_to_human`: the caller needs a person
//! - `log_call_engagement`: end-of-call engagement metrics
//!
//! This module decodes their parameters into typed records and aggregates
//! them into [`DashboardStats`] for the calls overview.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::normalize_opt;
use crate::types::{CallDetails, CallRecord, ToolInvocation, WebhookEvent};

/// Tool name used for escalations
pub const ESCALATE_TOOL: &str = "escalate_to_human";

/// Tool name used for engagement logs
pub const ENGAGEMENT_TOOL: &str = "log_call_engagement";

/// Parameters of an `escalate_to_human` invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationParams {
    pub escalation_reason: Option<String>,
    /// low, medium, high, critical
    pub priority_level: Option<String>,
    pub context_summary: Option<String>,
    /// angry, frustrated, neutral, satisfied, very_satisfied
    pub customer_sentiment: Option<String>,
}

impl EscalationParams {
    /// Priority, defaulting to `medium` when the agent omitted it
    pub fn priority(&self) -> &str {
        self.priority_level.as_deref().unwrap_or("medium")
    }
}

/// Parameters of a `log_call_engagement` invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementParams {
    /// initial_contact, understanding_issue, providing_solution, closing_conversation
    pub call_phase: Option<String>,
    pub customer_sentiment: Option<String>,
    /// 0-100
    pub resolution_likelihood: Option<u8>,
    pub issue_resolved: bool,
    pub engagement_notes: Option<String>,
}

/// An escalation attributed to a call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Escalation {
    pub call_id: String,
    pub invoked_at: Option<String>,
    pub params: EscalationParams,
}

/// An engagement log attributed to a call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Engagement {
    pub call_id: String,
    pub invoked_at: Option<String>,
    pub params: EngagementParams,
}

/// Decode typed parameters from a tool invocation.
///
/// Returns `None` (and logs a warning) when the parameters cannot be decoded.
fn decode_params<T>(tool: &ToolInvocation) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(params) = tool.try_parameters_map() else {
        tracing::warn!(tool = %tool.tool_name, "Skipping tool invocation with malformed parameters");
        return None;
    };

    match serde_json::from_value(Value::Object(params)) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(tool = %tool.tool_name, error = %e, "Skipping tool invocation with unexpected parameters");
            None
        }
    }
}

/// Escalations among a call's tool invocations, in input order.
pub fn collect_escalations(call_id: &str, tools: &[ToolInvocation]) -> Vec<Escalation> {
    tools
        .iter()
        .filter(|t| t.tool_name == ESCALATE_TOOL)
        .filter_map(|t| {
            decode_params(t).map(|params| Escalation {
                call_id: call_id.to_string(),
                invoked_at: t.time().map(String::from),
                params,
            })
        })
        .collect()
}

/// Engagement logs among a call's tool invocations, in input order.
pub fn collect_engagements(call_id: &str, tools: &[ToolInvocation]) -> Vec<Engagement> {
    tools
        .iter()
        .filter(|t| t.tool_name == ENGAGEMENT_TOOL)
        .filter_map(|t| {
            decode_params(t).map(|params| Engagement {
                call_id: call_id.to_string(),
                invoked_at: t.time().map(String::from),
                params,
            })
        })
        .collect()
}

/// Default size of the recent webhook feed
pub const WEBHOOK_FEED_LIMIT: usize = 20;

/// Webhooks from every call, newest first, each attributed to its call.
///
/// Events whose receive time cannot be normalized go last.
pub fn recent_webhooks(details: &[CallDetails], limit: usize) -> Vec<WebhookEvent> {
    let mut events: Vec<WebhookEvent> = details
        .iter()
        .flat_map(|d| {
            d.webhooks.iter().map(move |w| WebhookEvent {
                call_id: Some(d.call.call_id.clone()),
                ..w.clone()
            })
        })
        .collect();

    events.sort_by_key(|w| std::cmp::Reverse(normalize_opt(w.received_at.as_deref())));
    events.truncate(limit);
    events
}

/// Aggregate numbers for the calls overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Total number of calls
    pub total_calls: usize,
    /// Calls currently joined or started
    pub active_calls: usize,
    /// Calls with at least one escalation
    pub escalated_calls: usize,
    /// Calls with an engagement log
    pub logged_calls: usize,
    /// Logged calls whose engagement reports the issue resolved
    pub resolved_calls: usize,
}

impl DashboardStats {
    /// Count call statuses only; tool-derived counters stay at zero.
    pub fn from_calls(calls: &[CallRecord]) -> Self {
        Self {
            total_calls: calls.len(),
            active_calls: calls.iter().filter(|c| c.status.is_active()).count(),
            ..Default::default()
        }
    }

    /// Full statistics from per-call details.
    ///
    /// Each call counts once: as escalated if it invoked the escalation tool
    /// at all, and as logged according to its first engagement invocation.
    /// A logged call is resolved when that invocation decodes and reports
    /// the issue resolved.
    pub fn from_details(details: &[CallDetails]) -> Self {
        let calls: Vec<CallRecord> = details.iter().map(|d| d.call.clone()).collect();
        let mut stats = Self::from_calls(&calls);

        for detail in details {
            let tools = &detail.tool_invocations;
            if tools.iter().any(|t| t.tool_name == ESCALATE_TOOL) {
                stats.escalated_calls += 1;
            }
            if let Some(first) = tools.iter().find(|t| t.tool_name == ENGAGEMENT_TOOL) {
                stats.logged_calls += 1;
                if decode_params::<EngagementParams>(first).is_some_and(|p| p.issue_resolved) {
                    stats.resolved_calls += 1;
                }
            }
        }

        stats
    }

    /// Resolution rate as a rounded percentage (0 when nothing was logged).
    pub fn resolution_rate(&self) -> u32 {
        if self.logged_calls == 0 {
            return 0;
        }
        ((self.resolved_calls as f64 / self.logged_calls as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallStatus;
    use serde_json::json;

    fn tool(name: &str, parameters: Value) -> ToolInvocation {
        ToolInvocation {
            id: None,
            call_id: None,
            tool_name: name.to_string(),
            parameters,
            created_at: None,
            invoked_at: Some("2024-01-01 00:02:00".to_string()),
        }
    }

    fn details(call_id: &str, status: CallStatus, tools: Vec<ToolInvocation>) -> CallDetails {
        let call: CallRecord =
            serde_json::from_value(json!({"call_id": call_id, "status": status})).unwrap();
        CallDetails {
            call,
            webhooks: vec![],
            tool_invocations: tools,
        }
    }

    fn engagement(resolved: bool) -> ToolInvocation {
        tool(
            ENGAGEMENT_TOOL,
            json!(format!(
                "{{\"call_phase\": \"closing_conversation\", \"customer_sentiment\": \"neutral\", \"resolution_likelihood\": 80, \"issue_resolved\": {resolved}}}"
            )),
        )
    }

    #[test]
    fn test_collect_escalations() {
        let tools = vec![
            tool(
                ESCALATE_TOOL,
                json!("{\"escalation_reason\": \"billing dispute\", \"priority_level\": \"high\"}"),
            ),
            engagement(true),
        ];
        let escalations = collect_escalations("call-1", &tools);
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].call_id, "call-1");
        assert_eq!(
            escalations[0].params.escalation_reason.as_deref(),
            Some("billing dispute")
        );
        assert_eq!(escalations[0].params.priority(), "high");
        assert_eq!(escalations[0].invoked_at.as_deref(), Some("2024-01-01 00:02:00"));
    }

    #[test]
    fn test_missing_priority_defaults_to_medium() {
        let tools = vec![tool(ESCALATE_TOOL, json!({"escalation_reason": "angry"}))];
        assert_eq!(collect_escalations("c", &tools)[0].params.priority(), "medium");
    }

    #[test]
    fn test_collect_engagements() {
        let engagements = collect_engagements("call-1", &[engagement(false)]);
        assert_eq!(engagements.len(), 1);
        let params = &engagements[0].params;
        assert_eq!(params.call_phase.as_deref(), Some("closing_conversation"));
        assert_eq!(params.resolution_likelihood, Some(80));
        assert!(!params.issue_resolved);
    }

    #[test]
    fn test_malformed_parameters_are_skipped() {
        crate::logging::init_test();
        let tools = vec![
            tool(ESCALATE_TOOL, json!("{broken")),
            tool(ESCALATE_TOOL, json!("{}")),
            tool(ESCALATE_TOOL, json!("{ }")),
            tool(ESCALATE_TOOL, json!("{\n}")),
        ];
        let escalations = collect_escalations("c", &tools);
        assert_eq!(escalations.len(), 3);
        assert!(escalations
            .iter()
            .all(|e| e.params == EscalationParams::default()));
    }

    #[test]
    fn test_malformed_escalation_still_counts_as_escalated() {
        let all = vec![
            details("a", CallStatus::Ended, vec![tool(ESCALATE_TOOL, json!("{not json"))]),
            details(
                "b",
                CallStatus::Ended,
                vec![tool(ENGAGEMENT_TOOL, json!("{not json")), engagement(true)],
            ),
        ];

        let stats = DashboardStats::from_details(&all);
        assert_eq!(stats.escalated_calls, 1);
        // First engagement is the malformed one: logged, not resolved
        assert_eq!(stats.logged_calls, 1);
        assert_eq!(stats.resolved_calls, 0);
        assert!(collect_escalations("a", &all[0].tool_invocations).is_empty());
    }

    #[test]
    fn test_recent_webhooks_newest_first() {
        let webhook = |event_type: &str, received_at: &str| -> WebhookEvent {
            serde_json::from_value(json!({
                "event_type": event_type,
                "payload": "{}",
                "received_at": received_at
            }))
            .unwrap()
        };
        let mut a = details("a", CallStatus::Ended, vec![]);
        a.webhooks = vec![
            webhook("call.started", "2024-01-01 00:00:00"),
            webhook("call.ended", "2024-01-01 00:05:00"),
        ];
        let mut b = details("b", CallStatus::Joined, vec![]);
        b.webhooks = vec![
            webhook("call.joined", "2024-01-01T00:03:00Z"),
            webhook("call.started", "garbage"),
        ];

        let feed = recent_webhooks(&[a.clone(), b.clone()], WEBHOOK_FEED_LIMIT);
        let order: Vec<_> = feed
            .iter()
            .map(|w| (w.call_id.as_deref().unwrap(), w.event_type.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", "call.ended"),
                ("b", "call.joined"),
                ("a", "call.started"),
                ("b", "call.started"),
            ]
        );

        assert_eq!(recent_webhooks(&[a, b], 2).len(), 2);
    }

    #[test]
    fn test_dashboard_stats() {
        let all = vec![
            details("a", CallStatus::Ended, vec![engagement(true)]),
            details(
                "b",
                CallStatus::Joined,
                vec![
                    tool(ESCALATE_TOOL, json!("{}")),
                    tool(ESCALATE_TOOL, json!("{}")),
                    engagement(false),
                    engagement(true),
                ],
            ),
            details("c", CallStatus::Started, vec![]),
            details("d", CallStatus::Created, vec![engagement(true)]),
        ];

        let stats = DashboardStats::from_details(&all);
        assert_eq!(stats.total_calls, 4);
        assert_eq!(stats.active_calls, 2);
        assert_eq!(stats.escalated_calls, 1);
        assert_eq!(stats.logged_calls, 3);
        assert_eq!(stats.resolved_calls, 2);
        assert_eq!(stats.resolution_rate(), 67);
    }

    #[test]
    fn test_resolution_rate_without_logs() {
        assert_eq!(DashboardStats::default().resolution_rate(), 0);
    }
}
