pub mod json_lines;
pub mod memory;

pub use json_lines::JsonLinesSource;
pub use memory::MemorySource;

use statpipe_common::{Record, Result};

pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// Bulk enumeration of key/value records, backend-agnostic. Sequences are
/// finite and not assumed restartable; callers that need a second pass must
/// fetch again. A malformed record surfaces as a per-record `Err` item so
/// the driver can tally it; an unreachable backend fails the whole fetch
/// with `SourceUnavailable`.
pub trait RecordSource: Send + Sync {
    fn fetch_all(&self) -> Result<RecordIter>;

    /// How many independent partitions `partitions()` will yield. 1 means
    /// the source is effectively sequential.
    fn partition_hint(&self) -> usize {
        1
    }

    /// Split the source into independently consumable partitions for
    /// parallel fan-out. The default is a single partition wrapping
    /// `fetch_all`.
    fn partitions(&self) -> Result<Vec<RecordIter>> {
        Ok(vec![self.fetch_all()?])
    }
}
