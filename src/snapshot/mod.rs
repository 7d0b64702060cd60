// Snapshot management for reverse stepping

/// Append-only history of interpreter states.
///
/// The first entry is the state before any step and is never removed, so the
/// history is never empty. Every entry is an owned clone: recording copies
/// the live state in, restoring copies a stored state out.
#[derive(Debug, Clone)]
pub struct SnapshotHistory<T: Clone> {
    initial: T,
    steps: Vec<T>,
}

#[allow(clippy::len_without_is_empty)]
impl<T: Clone> SnapshotHistory<T> {
    pub fn new(initial: &T) -> Self {
        SnapshotHistory {
            initial: initial.clone(),
            steps: Vec::new(),
        }
    }

    /// Store an independent copy of `state` as the newest snapshot
    pub fn record(&mut self, state: &T) {
        self.steps.push(state.clone());
    }

    /// Discard the newest snapshot and return a fresh copy of the one
    /// before it. Returns `None` when only the initial snapshot remains.
    pub fn rewind(&mut self) -> Option<T> {
        self.steps.pop()?;
        Some(self.restore_latest())
    }

    /// Fresh copy of the newest snapshot
    pub fn restore_latest(&self) -> T {
        self.latest().clone()
    }

    pub fn latest(&self) -> &T {
        self.steps.last().unwrap_or(&self.initial)
    }

    /// Number of snapshots, including the initial one
    pub fn len(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn is_at_start(&self) -> bool {
        self.steps.is_empty()
    }
}
