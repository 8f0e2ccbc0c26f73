//! Bounded enumeration of shard ordinals for newest/oldest scans.

/// Walks skip positions `0..shard_count` over a conversation's shards.
///
/// The bound is the shard count observed when the scan starts, so a scan
/// visits each existing shard at most once and always terminates. The store
/// reporting no shard at a position (for example after a concurrent purge)
/// also ends the scan; that exit is taken by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrdinalScan {
    next: u64,
    end: u64,
}

impl OrdinalScan {
    pub fn new(shard_count: u64) -> Self {
        Self {
            next: 0,
            end: shard_count,
        }
    }

    /// Positions not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.end - self.next
    }
}

impl Iterator for OrdinalScan {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next += 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}
