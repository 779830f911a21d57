//! In-memory mail server.
//!
//! Holds folders and raw messages in memory and records every select and
//! fetch it receives. Used by the test suite; also handy for
//! dry runs against canned data.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::TransportError;
use crate::model::MessageId;

use super::MailTransport;

#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    credentials: Option<(String, String)>,
    folders: BTreeMap<String, BTreeMap<MessageId, Vec<u8>>>,
    failing_fetches: BTreeSet<MessageId>,
    failing_search: bool,
    selected: Option<String>,
    select_attempts: Vec<String>,
    fetched: Vec<MessageId>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept this principal/secret pair. Without it any login succeeds.
    pub fn with_credentials(mut self, principal: &str, secret: &str) -> Self {
        self.credentials = Some((principal.to_string(), secret.to_string()));
        self
    }

    /// Add an empty folder.
    pub fn with_folder(mut self, name: &str) -> Self {
        self.folders.entry(name.to_string()).or_default();
        self
    }

    /// Add a message to a folder, creating the folder if needed.
    pub fn with_message(mut self, folder: &str, id: u32, raw: &[u8]) -> Self {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .insert(MessageId(id), raw.to_vec());
        self
    }

    /// Make every fetch of `id` fail.
    pub fn failing_fetch(mut self, id: u32) -> Self {
        self.failing_fetches.insert(MessageId(id));
        self
    }

    /// Make `search_all` fail.
    pub fn failing_search(mut self) -> Self {
        self.failing_search = true;
        self
    }

    /// Folder names passed to `select`, in call order.
    pub fn select_attempts(&self) -> &[String] {
        &self.select_attempts
    }

    /// Ids passed to `fetch`, in call order.
    pub fn fetched(&self) -> &[MessageId] {
        &self.fetched
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn selected_messages(&self) -> Option<&BTreeMap<MessageId, Vec<u8>>> {
        self.selected.as_ref().and_then(|f| self.folders.get(f))
    }
}

impl MailTransport for MemoryTransport {
    fn authenticate(&mut self, principal: &str, secret: &str) -> Result<(), TransportError> {
        match &self.credentials {
            Some((p, s)) if p != principal || s != secret => Err(TransportError::Auth {
                principal: principal.to_string(),
                reason: "invalid credentials".into(),
            }),
            _ => Ok(()),
        }
    }

    fn select(&mut self, folder: &str) -> Result<u32, TransportError> {
        self.select_attempts.push(folder.to_string());
        match self.folders.get(folder) {
            Some(messages) => {
                self.selected = Some(folder.to_string());
                Ok(messages.len() as u32)
            }
            None => {
                self.selected = None;
                Err(TransportError::Select {
                    folder: folder.to_string(),
                    reason: "NO Mailbox doesn't exist".into(),
                })
            }
        }
    }

    fn list_folders(&mut self) -> Result<Vec<String>, TransportError> {
        Ok(self.folders.keys().cloned().collect())
    }

    fn search_all(&mut self) -> Result<Vec<MessageId>, TransportError> {
        if self.failing_search {
            return Err(TransportError::Search("BAD search not permitted".into()));
        }
        self.selected_messages()
            .map(|messages| messages.keys().copied().collect())
            .ok_or_else(|| TransportError::Search("no folder selected".into()))
    }

    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, TransportError> {
        self.fetched.push(id);
        if self.failing_fetches.contains(&id) {
            return Err(TransportError::Fetch {
                id,
                reason: "connection reset".into(),
            });
        }
        self.selected_messages()
            .and_then(|messages| messages.get(&id).cloned())
            .ok_or_else(|| TransportError::Fetch {
                id,
                reason: "no such message".into(),
            })
    }

    fn close(&mut self) {
        self.selected = None;
        self.closed = true;
    }
}
