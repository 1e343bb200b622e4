//! Call timeline construction
//!
//! [`build_timeline`] turns a call record, its transcript and its tool
//! invocations into an ordered list of [`Stage`]s:
//!
//! 1. `created` (always)
//! 2. `joined` (if the call has a join time)
//! 3. one stage per message group (`callStageId`, or one implicit group)
//! 4. one stage per tool invocation
//! 5. `ended` (if the call has an end time)
//!
//! The list is then stably sorted by normalized time, so stages sharing a
//! timestamp keep the construction order above. Stages whose time cannot be
//! normalized sort after every datable stage.
//!
//! Speaker attribution for transcript messages happens at render time through
//! [`RoleInference`]; it is not stored on the stage.

use std::collections::HashMap;

use serde::Deserialize;

use crate::time::normalize_opt;
use crate::types::{
    CallRecord, Speaker, Stage, StageCategory, StagePayload, ToolInvocation, TranscriptMessage,
    UNSPECIFIED_ROLE,
};

/// Group id used for messages without a `callStageId`
pub const DEFAULT_GROUP_ID: &str = "default";

/// Build the ordered stage list for a call.
///
/// Pure function of its inputs: calling it twice with the same data yields
/// identical stages. Malformed timestamps or tool parameters never fail the
/// build.
pub fn build_timeline(
    call: &CallRecord,
    messages: &[TranscriptMessage],
    tools: &[ToolInvocation],
) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(3 + tools.len());

    stages.push(stage(
        "created",
        "Created",
        "Session initialized",
        call.created_at.as_deref(),
        "1",
        StageCategory::System,
        None,
    ));

    if let Some(joined_at) = call.joined_at.as_deref() {
        stages.push(stage(
            "joined",
            "Joined",
            "User connected",
            Some(joined_at),
            "2",
            StageCategory::User,
            None,
        ));
    }

    for (index, (group_id, group)) in group_messages(messages).into_iter().enumerate() {
        let time = group.first().and_then(|msg| msg.representative_time());
        let icon = (stages.len() + 1).to_string();
        stages.push(stage(
            group_id,
            &format!("Stage {}", index + 1),
            &format!("{} messages", group.len()),
            time,
            &icon,
            StageCategory::Agent,
            Some(StagePayload::Messages {
                messages: group.into_iter().cloned().collect(),
            }),
        ));
    }

    for (index, tool) in tools.iter().enumerate() {
        stages.push(stage(
            &format!("tool-{}", index),
            &tool.tool_name,
            "Tool invoked",
            tool.time(),
            "T",
            StageCategory::Tool,
            Some(StagePayload::Tool {
                invocation: tool.clone(),
                parameters: tool.parameters_map(),
            }),
        ));
    }

    if let Some(ended_at) = call.ended_at.as_deref() {
        let description = call
            .end_reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
            .unwrap_or("Completed");
        stages.push(stage(
            "ended",
            "Ended",
            description,
            Some(ended_at),
            "✓",
            StageCategory::System,
            None,
        ));
    }

    // Stable: equal keys keep construction order.
    stages.sort_by_key(|s| (s.instant.is_none(), s.instant));

    tracing::debug!(
        call_id = %call.call_id,
        stages = stages.len(),
        messages = messages.len(),
        tools = tools.len(),
        "Built call timeline"
    );

    stages
}

fn stage(
    id: &str,
    name: &str,
    description: &str,
    time: Option<&str>,
    icon: &str,
    category: StageCategory,
    payload: Option<StagePayload>,
) -> Stage {
    Stage {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        time: time.map(String::from),
        instant: normalize_opt(time),
        icon: icon.to_string(),
        category,
        payload,
    }
}

/// Group messages by stage id, in order of first appearance.
fn group_messages(messages: &[TranscriptMessage]) -> Vec<(&str, Vec<&TranscriptMessage>)> {
    let mut groups: Vec<(&str, Vec<&TranscriptMessage>)> = Vec::new();
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();

    for msg in messages {
        let group_id = msg
            .call_stage_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_GROUP_ID);

        let slot = *index_by_id.entry(group_id).or_insert_with(|| {
            groups.push((group_id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(msg);
    }

    groups
}

// ============================================
// Role inference
// ============================================

/// Speaker attribution for transcript messages.
///
/// Messages without a usable role tag are attributed by alternation within
/// their stage, starting with `first_speaker`. Transcripts normally open with
/// the agent greeting the caller, hence the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoleInference {
    #[serde(default = "default_first_speaker")]
    pub first_speaker: Speaker,
}

impl Default for RoleInference {
    fn default() -> Self {
        Self {
            first_speaker: default_first_speaker(),
        }
    }
}

fn default_first_speaker() -> Speaker {
    Speaker::Agent
}

impl RoleInference {
    /// Speaker for the message at `index` within its stage.
    pub fn speaker(&self, msg: &TranscriptMessage, index: usize) -> Speaker {
        if msg.tool().is_some() {
            return Speaker::Tool;
        }

        match msg.role.as_deref().filter(|role| !role.is_empty()) {
            Some(role) => {
                let role = role.to_ascii_uppercase();
                if role.contains("USER") || role.contains("HUMAN") {
                    Speaker::User
                } else if role.contains("AGENT") || role.contains("ASSISTANT") {
                    Speaker::Agent
                } else if role.contains("TOOL") {
                    Speaker::Tool
                } else if role == UNSPECIFIED_ROLE {
                    self.alternate(index)
                } else {
                    Speaker::Agent
                }
            }
            None => self.alternate(index),
        }
    }

    /// Speakers for a whole stage's message list.
    pub fn speakers(&self, messages: &[TranscriptMessage]) -> Vec<Speaker> {
        messages
            .iter()
            .enumerate()
            .map(|(index, msg)| self.speaker(msg, index))
            .collect()
    }

    fn alternate(&self, index: usize) -> Speaker {
        if index % 2 == 0 {
            self.first_speaker
        } else {
            self.first_speaker.counterpart()
        }
    }
}

/// Speaker for the message at `index`, assuming the agent speaks first.
pub fn infer_speaker(msg: &TranscriptMessage, index: usize) -> Speaker {
    RoleInference::default().speaker(msg, index)
}
