//! Chunk Planner: pressure-adaptive chunk sizing.

use crate::memory::MemorySnapshot;
use crate::profile::ResourceProfile;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Base chunk size before the category multiplier.
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * MIB;

/// Smallest chunk the planner will ever return.
pub const MIN_CHUNK_SIZE: u64 = 512 * KIB;

/// Ceiling under critical memory pressure.
pub const CRITICAL_CHUNK_CAP: u64 = 512 * KIB;

/// Ceiling under high memory pressure.
pub const HIGH_CHUNK_CAP: u64 = MIB;

/// Ceiling for large files under normal pressure.
pub const LARGE_FILE_CHUNK_CAP: u64 = 2 * MIB;

/// Files above this size always use conservative chunks.
pub const LARGE_FILE_THRESHOLD: u64 = 50 * MIB;

/// Recommends a chunk size for streaming a file of `file_size` bytes.
///
/// Pure function of its inputs. Callers re-evaluate it at every chunk
/// boundary. An unavailable snapshot plans as normal pressure.
pub fn recommend_chunk_size(
    file_size: u64,
    profile: &ResourceProfile,
    snapshot: Option<&MemorySnapshot>,
) -> u64 {
    let default_chunk = (DEFAULT_CHUNK_SIZE as f64 * profile.chunk_size_multiplier) as u64;

    let planned = match snapshot {
        Some(snapshot) if snapshot.is_critical_usage() => default_chunk.min(CRITICAL_CHUNK_CAP),
        Some(snapshot) if snapshot.is_high_usage() => default_chunk.min(HIGH_CHUNK_CAP),
        _ if file_size > LARGE_FILE_THRESHOLD => default_chunk.min(LARGE_FILE_CHUNK_CAP),
        _ => default_chunk,
    };

    planned.max(MIN_CHUNK_SIZE)
}

/// Number of chunks needed to cover `bytes` at `chunk_size`.
pub fn chunk_count(bytes: u64, chunk_size: u64) -> usize {
    if bytes == 0 {
        return 0;
    }
    bytes.div_ceil(chunk_size.max(1)) as usize
}
