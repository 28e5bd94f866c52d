//! Ordered conversation transcript.
//!
//! Append-only, except that the report message of the running analysis is
//! updated in place until its turn ends.

use analyst_types::message::{ChatMessage, MessageBody, ReportGeneration};

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id
    pub fn push(&mut self, message: ChatMessage) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Mutate the report message with the given id. Returns false if the id
    /// is unknown or does not refer to a report.
    pub fn update_report(&mut self, id: &str, update: impl FnOnce(&mut ReportGeneration)) -> bool {
        let Some(message) = self.messages.iter_mut().rev().find(|m| m.id == id) else {
            return false;
        };
        match &mut message.body {
            MessageBody::Report(report) => {
                update(report);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
