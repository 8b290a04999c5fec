//! Per-session chunk bookkeeping

use std::collections::BTreeMap;

use super::chunk::{Chunk, UploadState};
use crate::domain::recording::AudioData;

/// Hands out chunk sequence indices for one session.
///
/// Starts at 0 and only ever moves forward.
#[derive(Debug, Default)]
pub struct ChunkSequencer {
    next: u64,
}

impl ChunkSequencer {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Claim the next index
    pub fn advance(&mut self) -> u64 {
        let index = self.next;
        self.next += 1;
        index
    }

    /// Number of indices handed out so far
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// All chunks produced during one session, keyed by sequence index
#[derive(Debug, Default)]
pub struct ChunkLedger {
    chunks: BTreeMap<u64, Chunk>,
}

impl ChunkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly produced chunk. Returns false for a duplicate index.
    pub fn record(&mut self, chunk: Chunk) -> bool {
        let index = chunk.sequence_index();
        if self.chunks.contains_key(&index) {
            return false;
        }
        self.chunks.insert(index, chunk);
        true
    }

    pub fn get(&self, index: u64) -> Option<&Chunk> {
        self.chunks.get(&index)
    }

    /// Mark a pending chunk in flight and return its payload for upload
    pub fn begin_upload(&mut self, index: u64) -> Option<AudioData> {
        self.chunks.get_mut(&index)?.begin_upload()
    }

    pub fn confirm(&mut self, index: u64) -> bool {
        self.chunks
            .get_mut(&index)
            .map(Chunk::confirm)
            .unwrap_or(false)
    }

    pub fn fail(&mut self, index: u64) -> bool {
        self.chunks
            .get_mut(&index)
            .map(Chunk::fail)
            .unwrap_or(false)
    }

    pub fn produced_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn confirmed_indices(&self) -> Vec<u64> {
        self.indices_in(|state| state == UploadState::Confirmed)
    }

    pub fn failed_indices(&self) -> Vec<u64> {
        self.indices_in(|state| state == UploadState::Failed)
    }

    /// Chunks still pending or in flight
    pub fn outstanding_indices(&self) -> Vec<u64> {
        self.indices_in(|state| !state.is_settled())
    }

    /// Whether the confirmed set is exactly `0..produced_count`
    pub fn is_contiguous(&self) -> bool {
        self.confirmed_indices()
            .into_iter()
            .eq(0..self.produced_count() as u64)
    }

    /// Audio bytes still held in memory
    pub fn buffered_bytes(&self) -> usize {
        self.chunks
            .values()
            .filter_map(Chunk::payload)
            .map(AudioData::size_bytes)
            .sum()
    }

    fn indices_in(&self, mut pred: impl FnMut(UploadState) -> bool) -> Vec<u64> {
        self.chunks
            .values()
            .filter(|chunk| pred(chunk.upload_state()))
            .map(Chunk::sequence_index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::AudioMimeType;

    fn chunk(index: u64) -> Chunk {
        Chunk::new(index, AudioData::new(vec![1u8; 10], AudioMimeType::Flac)).unwrap()
    }

    #[test]
    fn sequencer_counts_from_zero() {
        let mut seq = ChunkSequencer::new();
        assert_eq!(seq.advance(), 0);
        assert_eq!(seq.advance(), 1);
        assert_eq!(seq.advance(), 2);
        assert_eq!(seq.issued(), 3);
    }

    #[test]
    fn duplicate_index_is_refused() {
        let mut ledger = ChunkLedger::new();
        assert!(ledger.record(chunk(0)));
        assert!(!ledger.record(chunk(0)));
        assert_eq!(ledger.produced_count(), 1);
    }

    #[test]
    fn out_of_order_confirmation_is_contiguous() {
        let mut ledger = ChunkLedger::new();
        for i in 0..3 {
            ledger.record(chunk(i));
            ledger.begin_upload(i).unwrap();
        }
        assert!(ledger.confirm(2));
        assert!(ledger.confirm(0));
        assert!(!ledger.is_contiguous());
        assert!(ledger.confirm(1));

        assert_eq!(ledger.confirmed_indices(), vec![0, 1, 2]);
        assert!(ledger.is_contiguous());
        assert_eq!(ledger.buffered_bytes(), 0);
    }

    #[test]
    fn failure_leaves_gap() {
        let mut ledger = ChunkLedger::new();
        for i in 0..5 {
            ledger.record(chunk(i));
            ledger.begin_upload(i).unwrap();
        }
        for i in [0, 1, 2, 4] {
            ledger.confirm(i);
        }
        ledger.fail(3);

        assert_eq!(ledger.failed_indices(), vec![3]);
        assert_eq!(ledger.confirmed_indices(), vec![0, 1, 2, 4]);
        assert!(!ledger.is_contiguous());
        assert!(ledger.outstanding_indices().is_empty());
    }

    #[test]
    fn outstanding_tracks_pending_and_in_flight() {
        let mut ledger = ChunkLedger::new();
        ledger.record(chunk(0));
        ledger.record(chunk(1));
        ledger.begin_upload(0);

        assert_eq!(ledger.outstanding_indices(), vec![0, 1]);
        assert_eq!(ledger.buffered_bytes(), 20);
        assert_eq!(
            ledger.get(0).map(Chunk::upload_state),
            Some(UploadState::InFlight)
        );
    }

    #[test]
    fn unknown_indices_are_ignored() {
        let mut ledger = ChunkLedger::new();
        assert!(ledger.begin_upload(9).is_none());
        assert!(!ledger.confirm(9));
        assert!(!ledger.fail(9));
        assert!(ledger.is_contiguous());
    }
}
