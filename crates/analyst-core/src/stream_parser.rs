//! Line decoder for the push-stream response body.
//!
//! Chunks arrive at arbitrary byte boundaries. Bytes are buffered until a
//! newline so multi-byte UTF-8 sequences split across chunks decode intact.

use analyst_types::event::{TransportEvent, decode_frame};

const DATA_PREFIX: &str = "data:";

#[derive(Debug, Default)]
pub struct PushStreamDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl PushStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the events completed by it. Nothing is
    /// returned after a terminal event.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<TransportEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(self.decode_line(&line));
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// End of body: decode whatever is left without a trailing newline.
    pub fn finish(&mut self) -> Vec<TransportEvent> {
        if self.finished || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Every `error` frame ends the stream. One naming an agent is
    /// followed by a synthesized `Done` so the turn still closes.
    fn decode_line(&mut self, raw: &[u8]) -> Vec<TransportEvent> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() || line.starts_with(':') {
            return Vec::new();
        }
        let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim_start();
        if payload.is_empty() || payload == "[DONE]" {
            return Vec::new();
        }

        let event = decode_frame(payload);
        log::debug!("Stream event: {:?}", event);
        match event {
            TransportEvent::AgentError { .. } => {
                self.finished = true;
                vec![event, TransportEvent::Done]
            }
            event if event.is_terminal() => {
                self.finished = true;
                vec![event]
            }
            event => vec![event],
        }
    }
}
