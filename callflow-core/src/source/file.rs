//! Offline source backed by saved API responses
//!
//! The details file holds either a full `GET /api/calls/{id}` response or
//! a bare call record. The optional messages file holds either the
//! `GET /api/calls/{id}/messages` response or a bare array of messages.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::CallSource;
use crate::error::{Error, Result};
use crate::types::{CallDetails, CallRecord, TranscriptMessage};

#[derive(Deserialize)]
#[serde(untagged)]
enum DetailsFile {
    Details(CallDetails),
    Record(CallRecord),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesFile {
    List(Vec<TranscriptMessage>),
    Envelope(super::MessageList),
}

/// A single call read from JSON files.
#[derive(Debug)]
pub struct FileCallSource {
    details: CallDetails,
    messages: Vec<TranscriptMessage>,
}

impl FileCallSource {
    /// Load a call from `details_path` and, if given, its transcript.
    pub fn open(details_path: &Path, messages_path: Option<&Path>) -> Result<Self> {
        let details = match read_json::<DetailsFile>(details_path)? {
            DetailsFile::Details(d) => d,
            DetailsFile::Record(call) => CallDetails {
                call,
                webhooks: Vec::new(),
                tool_invocations: Vec::new(),
            },
        };

        let messages = match messages_path {
            Some(path) => match read_json::<MessagesFile>(path)? {
                MessagesFile::List(m) => m,
                MessagesFile::Envelope(list) => list.messages,
            },
            None => Vec::new(),
        };

        tracing::debug!(
            call_id = %details.call.call_id,
            messages = messages.len(),
            tools = details.tool_invocations.len(),
            "Loaded call from files"
        );

        Ok(Self { details, messages })
    }

    /// Id of the loaded call
    pub fn call_id(&self) -> &str {
        &self.details.call.call_id
    }

    fn check_id(&self, call_id: &str) -> Result<()> {
        if call_id == self.call_id() {
            Ok(())
        } else {
            Err(Error::CallNotFound(call_id.to_string()))
        }
    }
}

impl CallSource for FileCallSource {
    fn list_calls(&self) -> Result<Vec<CallRecord>> {
        Ok(vec![self.details.call.clone()])
    }

    fn call_details(&self, call_id: &str) -> Result<CallDetails> {
        self.check_id(call_id)?;
        Ok(self.details.clone())
    }

    fn call_messages(&self, call_id: &str) -> Result<Vec<TranscriptMessage>> {
        self.check_id(call_id)?;
        Ok(self.messages.clone())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
