//! Sequence-number to timestamp bookkeeping for the encoder.
//!
//! Hardware encoders may reorder frames. Every submitted frame gets a fresh
//! sequence number; the caller's timestamp is parked under it and attached
//! back to the packet the encoder produces for that sequence.

use std::collections::HashMap;

use crate::provider::EncodedPacket;
use crate::CodecError;

/// An encoded packet carrying the timestamp of its input frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedPacket {
    pub timestamp: i64,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct TimestampLedger {
    next: u64,
    pending: HashMap<u64, i64>,
}

impl TimestampLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number. Sequence numbers start at 0 and
    /// never repeat within a session.
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next;
        self.next += 1;
        sequence
    }

    /// Record `timestamp` for `sequence`.
    pub fn submit(&mut self, sequence: u64, timestamp: i64) -> Result<(), CodecError> {
        if self.pending.contains_key(&sequence) {
            return Err(CodecError::DuplicateSequence(sequence));
        }
        self.pending.insert(sequence, timestamp);
        Ok(())
    }

    /// Take the timestamp recorded for `sequence`.
    pub fn resolve(&mut self, sequence: u64) -> Result<i64, CodecError> {
        self.pending
            .remove(&sequence)
            .ok_or(CodecError::UnknownSequence(sequence))
    }

    /// Attach timestamps to a batch of packets.
    ///
    /// The batch is all or nothing: if any packet carries a sequence that
    /// was never submitted, nothing is consumed.
    pub fn rewrite(&mut self, packets: Vec<EncodedPacket>) -> Result<Vec<TimestampedPacket>, CodecError> {
        if let Some(missing) = packets
            .iter()
            .find(|p| !self.pending.contains_key(&p.sequence))
        {
            return Err(CodecError::UnknownSequence(missing.sequence));
        }

        packets
            .into_iter()
            .map(|packet| {
                Ok(TimestampedPacket {
                    timestamp: self.resolve(packet.sequence)?,
                    data: packet.data,
                })
            })
            .collect()
    }

    /// Frames submitted but not yet seen in the output.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
