//! Staged configuration ingestion
//!
//! Transports deliver a configuration in arbitrarily sized chunks. Chunks are
//! appended to one buffer and a full JSON parse is attempted after each; the
//! first successful parse completes the document and empties the buffer.
//! A buffer that receives nothing for longer than the inactivity timeout is
//! discarded, either when the next chunk arrives or on an explicit expiry
//! check.

use crate::error::ConfigureError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug)]
pub enum Staged {
    /// More data is needed
    Incomplete,
    /// The buffer parsed as JSON; carries the document and its raw bytes
    Complete(Value, Vec<u8>),
}

#[derive(Debug)]
pub struct StagingBuffer {
    buffer: Vec<u8>,
    last_chunk: Option<Instant>,
    timeout: Duration,
}

impl StagingBuffer {
    pub fn new(timeout: Duration) -> Self {
        StagingBuffer {
            buffer: Vec::new(),
            last_chunk: None,
            timeout,
        }
    }

    pub fn push(&mut self, chunk: &[u8], now: Instant) -> Staged {
        self.expire(now);
        self.buffer.extend_from_slice(chunk);
        self.last_chunk = Some(now);
        info!(
            received = chunk.len(),
            total = self.buffer.len(),
            "configuration chunk received"
        );

        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(document) => {
                info!(bytes = self.buffer.len(), "complete configuration received");
                self.last_chunk = None;
                Staged::Complete(document, std::mem::take(&mut self.buffer))
            }
            Err(_) => Staged::Incomplete,
        }
    }

    /// Discard a buffer that has been idle past the timeout.
    /// Returns whether anything was discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.last_chunk {
            Some(last) if now.saturating_duration_since(last) > self.timeout => {
                warn!(
                    discarded = self.buffer.len(),
                    "configuration timed out, discarding partial data"
                );
                self.buffer.clear();
                self.last_chunk = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_chunk = None;
    }
}

/// Result of feeding one chunk to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigureOutcome {
    /// The buffered data is not yet a complete document
    Incomplete,
    Applied(ConfigureSummary),
    /// The document was complete but could not be applied; the engine is
    /// left with no running wires and an empty store
    Rejected(ConfigureError),
}

impl ConfigureOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ConfigureOutcome::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureSummary {
    pub variables: usize,
    pub wires: usize,
    /// `Wires` entries without a usable `Nodes` array
    pub skipped_wires: usize,
    pub sensors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_completes() {
        let mut staging = StagingBuffer::new(Duration::from_secs(10));
        match staging.push(br#"{"Wires": []}"#, Instant::now()) {
            Staged::Complete(doc, raw) => {
                assert_eq!(doc["Wires"], serde_json::json!([]));
                assert_eq!(raw, br#"{"Wires": []}"#.to_vec());
            }
            Staged::Incomplete => panic!("expected complete"),
        }
        assert_eq!(staging.pending(), 0);
    }

    #[test]
    fn test_chunks_accumulate() {
        let mut staging = StagingBuffer::new(Duration::from_secs(10));
        let now = Instant::now();
        let text = br#"{"Device": {}, "Variables": [], "Wires": []}"#;
        let (a, b) = text.split_at(17);
        assert!(matches!(staging.push(a, now), Staged::Incomplete));
        assert_eq!(staging.pending(), 17);
        assert!(matches!(
            staging.push(b, now + Duration::from_secs(9)),
            Staged::Complete(..)
        ));
    }

    #[test]
    fn test_idle_buffer_expires_before_next_chunk() {
        let mut staging = StagingBuffer::new(Duration::from_secs(10));
        let now = Instant::now();
        assert!(matches!(staging.push(b"{\"Wires\":", now), Staged::Incomplete));
        // the tail arrives too late: the head was dropped, so this alone is not JSON
        let late = now + Duration::from_secs(11);
        assert!(matches!(staging.push(b" []}", late), Staged::Incomplete));
        assert_eq!(staging.pending(), 4);
    }

    #[test]
    fn test_each_chunk_restarts_the_timeout() {
        let mut staging = StagingBuffer::new(Duration::from_secs(10));
        let now = Instant::now();
        staging.push(b"[1,", now);
        staging.push(b"2,", now + Duration::from_secs(8));
        assert!(!staging.expire(now + Duration::from_secs(16)));
        assert!(staging.expire(now + Duration::from_secs(19)));
        assert_eq!(staging.pending(), 0);
        assert!(!staging.expire(now + Duration::from_secs(30)));
    }
}
