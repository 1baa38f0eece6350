//! Chunked streaming execution.
//!
//! Small inputs are handed to the executor as a single chunk. Inputs above
//! their category's streaming threshold are read and processed slice by
//! slice, with cancellation and memory checks at every chunk boundary.

mod executor;
mod planner;
mod source;

pub use executor::{ChunkOutcome, StreamReport, StreamingExecutor};
pub use planner::{
    CRITICAL_CHUNK_CAP, DEFAULT_CHUNK_SIZE, HIGH_CHUNK_CAP, LARGE_FILE_CHUNK_CAP,
    LARGE_FILE_THRESHOLD, MIN_CHUNK_SIZE, chunk_count, recommend_chunk_size,
};
pub use source::{ByteSource, FileSource, MemorySource};
