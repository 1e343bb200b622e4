//! Call data sources
//!
//! Front ends never talk to the backend directly. They go through the
//! [`CallSource`] trait, which has two implementations:
//!
//! | Source | Reads from |
//! |--------|-----------|
//! | [`HttpCallSource`] | The call backend's REST API |
//! | [`FileCallSource`] | Saved JSON responses on disk |

mod client;
mod file;

pub use client::{ApiClient, CallList, MessageList};
pub use file::FileCallSource;

use chrono::{DateTime, Utc};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::journey::CallJourney;
use crate::types::{CallDetails, CallRecord, TranscriptMessage};

/// Read-only access to calls, their details and transcripts.
pub trait CallSource {
    /// All known calls
    fn list_calls(&self) -> Result<Vec<CallRecord>>;

    /// A call with its webhooks and tool invocations
    fn call_details(&self, call_id: &str) -> Result<CallDetails>;

    /// A call's transcript (empty when unavailable)
    fn call_messages(&self, call_id: &str) -> Result<Vec<TranscriptMessage>>;
}

/// Blocking [`CallSource`] over the async [`ApiClient`].
pub struct HttpCallSource {
    client: ApiClient,
    runtime: tokio::runtime::Runtime,
}

impl HttpCallSource {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Api(format!("failed to build tokio runtime: {e}")))?;

        Ok(Self {
            client: ApiClient::new(config)?,
            runtime,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Check if the backend is reachable
    pub fn health_check(&self) -> Result<bool> {
        self.runtime.block_on(self.client.health_check())
    }

    /// Download a call's audio recording
    pub fn call_recording(&self, call_id: &str) -> Result<Vec<u8>> {
        self.runtime.block_on(self.client.call_recording(call_id))
    }
}

impl CallSource for HttpCallSource {
    fn list_calls(&self) -> Result<Vec<CallRecord>> {
        self.runtime.block_on(self.client.list_calls())
    }

    fn call_details(&self, call_id: &str) -> Result<CallDetails> {
        self.runtime.block_on(self.client.call_details(call_id))
    }

    fn call_messages(&self, call_id: &str) -> Result<Vec<TranscriptMessage>> {
        Ok(self.runtime.block_on(self.client.call_messages(call_id)))
    }
}

/// Fetch everything needed for a call's journey and build it.
pub fn load_journey(
    source: &dyn CallSource,
    call_id: &str,
    now: DateTime<Utc>,
) -> Result<CallJourney> {
    let details = source.call_details(call_id)?;
    let messages = source.call_messages(call_id).unwrap_or_else(|e| {
        tracing::warn!(call_id, error = %e, "No messages available");
        Vec::new()
    });
    Ok(CallJourney::build(&details, &messages, now))
}

/// Details for every call; calls whose details fail to load are skipped.
pub fn load_all_details(source: &dyn CallSource) -> Result<Vec<CallDetails>> {
    let calls = source.list_calls()?;
    let mut details = Vec::with_capacity(calls.len());

    for call in &calls {
        match source.call_details(&call.call_id) {
            Ok(d) => details.push(d),
            Err(e) => {
                tracing::warn!(call_id = %call.call_id, error = %e, "Error loading call details");
            }
        }
    }

    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory source for exercising the helpers.
    struct MemorySource {
        details: HashMap<String, CallDetails>,
        messages_fail: bool,
    }

    impl CallSource for MemorySource {
        fn list_calls(&self) -> Result<Vec<CallRecord>> {
            let mut calls: Vec<_> = self.details.values().map(|d| d.call.clone()).collect();
            calls.push(serde_json::from_value(json!({"call_id": "ghost"})).unwrap());
            Ok(calls)
        }

        fn call_details(&self, call_id: &str) -> Result<CallDetails> {
            self.details
                .get(call_id)
                .cloned()
                .ok_or_else(|| Error::CallNotFound(call_id.to_string()))
        }

        fn call_messages(&self, _call_id: &str) -> Result<Vec<TranscriptMessage>> {
            if self.messages_fail {
                Err(Error::Api("status 500: boom".to_string()))
            } else {
                Ok(vec![TranscriptMessage {
                    text: Some("Hi".to_string()),
                    created_at: Some("2024-01-01 00:00:30".to_string()),
                    ..Default::default()
                }])
            }
        }
    }

    fn source(messages_fail: bool) -> MemorySource {
        let details: CallDetails = serde_json::from_value(json!({
            "call": {"call_id": "c-1", "status": "ended",
                     "created_at": "2024-01-01 00:00:00", "ended_at": "2024-01-01 00:01:00"}
        }))
        .unwrap();
        MemorySource {
            details: HashMap::from([("c-1".to_string(), details)]),
            messages_fail,
        }
    }

    #[test]
    fn test_load_journey() {
        let journey = load_journey(&source(false), "c-1", Utc::now()).unwrap();
        assert_eq!(journey.message_count, 1);
        assert_eq!(journey.stage_count(), 3);
    }

    #[test]
    fn test_load_journey_survives_missing_transcript() {
        let journey = load_journey(&source(true), "c-1", Utc::now()).unwrap();
        assert_eq!(journey.message_count, 0);
        assert_eq!(journey.stage_count(), 2);
    }

    #[test]
    fn test_load_journey_unknown_call() {
        let err = load_journey(&source(false), "nope", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::CallNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_load_all_details_skips_failures() {
        let details = load_all_details(&source(false)).unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].call.call_id, "c-1");
    }
}
