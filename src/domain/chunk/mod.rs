//! Chunk domain module

#[allow(clippy::module_inception)]
mod chunk;
mod ledger;

pub use chunk::{Chunk, UploadState};
pub use ledger::{ChunkLedger, ChunkSequencer};
