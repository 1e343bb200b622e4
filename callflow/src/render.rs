//! Plain-text rendering for the callflow commands.
//!
//! Each renderer builds the whole view in a `String` so commands can print
//! it in one go; formatting errors propagate as [`fmt::Error`].

use std::fmt::{self, Write};

use callflow_core::format::{humanize_key, truncate_preview};
use callflow_core::insights::{Engagement, Escalation};
use callflow_core::time::format_timestamp;
use callflow_core::{
    CallJourney, CallRow, DashboardStats, RoleInference, Stage, StagePayload, WebhookEvent,
};
use serde_json::Value;

/// Max characters of a transcript line shown under a stage
const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Render the calls list as an aligned table.
pub fn calls_table(rows: &[CallRow]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{:<16} {:<8} {:<18} {:<10} {:<16} END REASON",
        "CALL", "STATUS", "CREATED", "AGE", "DURATION"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<16} {:<8} {:<18} {:<10} {:<16} {}",
            row.short_id,
            row.status.as_str(),
            row.created,
            row.created_relative,
            row.duration,
            row.end_reason.as_deref().unwrap_or("-")
        )?;
    }
    Ok(out)
}

/// Render a call journey: header, timeline, then insights and metadata.
pub fn journey(journey: &CallJourney, roles: &RoleInference) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let call = &journey.call;

    writeln!(out, "Call {} ({})", call.call_id, call.status)?;
    writeln!(
        out,
        "Duration: {}   Messages: {}   Tools: {}   Stages: {}",
        journey.duration,
        journey.message_count,
        journey.tool_count,
        journey.stage_count()
    )?;
    if journey.recording_available {
        writeln!(out, "Recording: available")?;
    }
    if let Some(summary) = journey.summary() {
        writeln!(out, "Summary: {}", summary)?;
    }

    writeln!(out, "\nTimeline")?;
    for stage in &journey.stages {
        stage_lines(&mut out, stage, roles)?;
    }

    if !journey.escalations.is_empty() {
        writeln!(out, "\nEscalations")?;
        for escalation in &journey.escalations {
            escalation_line(&mut out, escalation)?;
        }
    }

    if !journey.engagements.is_empty() {
        writeln!(out, "\nEngagement")?;
        for engagement in &journey.engagements {
            engagement_line(&mut out, engagement)?;
        }
    }

    if !journey.webhooks.is_empty() {
        writeln!(out, "\nWebhooks")?;
        for event in &journey.webhooks {
            writeln!(
                out,
                "  {:<12} {}",
                event.label(),
                format_timestamp(event.received_at.as_deref())
            )?;
        }
    }

    if !journey.metadata.is_empty() {
        writeln!(out, "\nMetadata")?;
        for (key, value) in &journey.metadata {
            writeln!(out, "  {}: {}", humanize_key(key), display_value(value))?;
        }
    }

    Ok(out)
}

fn stage_lines(out: &mut String, stage: &Stage, roles: &RoleInference) -> fmt::Result {
    writeln!(
        out,
        "  [{}] {:<20} {:<18} {}",
        stage.icon,
        stage.name,
        format_timestamp(stage.time.as_deref()),
        stage.description
    )?;

    match &stage.payload {
        Some(StagePayload::Messages { messages }) => {
            for (msg, speaker) in messages.iter().zip(roles.speakers(messages)) {
                writeln!(
                    out,
                    "        {:<3} {}",
                    speaker.avatar(),
                    truncate_preview(msg.body(), MESSAGE_PREVIEW_CHARS)
                )?;
            }
        }
        Some(StagePayload::Tool { parameters, .. }) => {
            for (key, value) in parameters {
                writeln!(out, "        {}: {}", humanize_key(key), display_value(value))?;
            }
        }
        None => {}
    }
    Ok(())
}

fn escalation_line(out: &mut String, escalation: &Escalation) -> fmt::Result {
    let params = &escalation.params;
    writeln!(
        out,
        "  [{}] {} {}",
        params.priority(),
        params.escalation_reason.as_deref().unwrap_or("(no reason given)"),
        format_timestamp(escalation.invoked_at.as_deref())
    )?;
    if let Some(context) = params.context_summary.as_deref() {
        writeln!(out, "        {}", context)?;
    }
    Ok(())
}

fn engagement_line(out: &mut String, engagement: &Engagement) -> fmt::Result {
    let params = &engagement.params;
    writeln!(
        out,
        "  {} | sentiment: {} | resolution: {} | resolved: {}",
        params.call_phase.as_deref().unwrap_or("-"),
        params.customer_sentiment.as_deref().unwrap_or("-"),
        params
            .resolution_likelihood
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "-".to_string()),
        if params.issue_resolved { "yes" } else { "no" }
    )?;
    if let Some(notes) = params.engagement_notes.as_deref() {
        writeln!(out, "        {}", notes)?;
    }
    Ok(())
}

/// Render dashboard statistics followed by the escalation list, the
/// engagement logs and the recent webhook feed.
pub fn insights(
    stats: &DashboardStats,
    escalations: &[Escalation],
    engagements: &[Engagement],
    webhooks: &[WebhookEvent],
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Total calls:      {}", stats.total_calls)?;
    writeln!(out, "Active calls:     {}", stats.active_calls)?;
    writeln!(out, "Escalated calls:  {}", stats.escalated_calls)?;
    writeln!(out, "Logged calls:     {}", stats.logged_calls)?;
    writeln!(out, "Resolution rate:  {}%", stats.resolution_rate())?;

    if !escalations.is_empty() {
        writeln!(out, "\nEscalations")?;
        for escalation in escalations {
            writeln!(out, "  {}", escalation.call_id)?;
            escalation_line(&mut out, escalation)?;
        }
    }

    if !engagements.is_empty() {
        writeln!(out, "\nEngagement")?;
        for engagement in engagements {
            writeln!(
                out,
                "  {} {}",
                engagement.call_id,
                format_timestamp(engagement.invoked_at.as_deref())
            )?;
            engagement_line(&mut out, engagement)?;
        }
    }

    if !webhooks.is_empty() {
        writeln!(out, "\nRecent webhooks")?;
        for event in webhooks {
            writeln!(
                out,
                "  {:<18} {:<12} {}",
                format_timestamp(event.received_at.as_deref()),
                event.label(),
                event.call_id.as_deref().unwrap_or("-")
            )?;
        }
    }

    Ok(out)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
