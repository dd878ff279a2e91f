//! Batch-scoped state shared between prompt runners and the progress monitor.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use loadgen_common::{LoadgenError, Result};

/// In-flight indices and partial output for one batch. Built fresh for every
/// batch and dropped when the batch drains.
///
/// Each partial entry has a single writer (the runner that owns the index);
/// the monitor only reads. Entries outlive their runner.
#[derive(Debug, Default)]
pub struct BatchState {
    in_flight: Mutex<BTreeSet<usize>>,
    partials: Mutex<HashMap<usize, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningPrompt {
    pub index: usize,
    pub text: String,
}

/// What the monitor renders. Entries are ordered by index. Not atomic with
/// respect to concurrent writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub running: Vec<RunningPrompt>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool { self.running.is_empty() }

    pub fn indices(&self) -> Vec<usize> { self.running.iter().map(|r| r.index).collect() }
}

impl BatchState {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Marks `index` as in flight until the returned guard drops.
    pub fn enter(self: &Arc<Self>, index: usize) -> Result<InFlightGuard> {
        let inserted = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).insert(index);
        if !inserted {
            return Err(LoadgenError::DuplicateIndex(index));
        }
        loadgen_obs::prompt_started();
        Ok(InFlightGuard { state: self.clone(), index, completed: false })
    }

    fn leave(&self, index: usize) {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&index);
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    pub fn in_flight(&self) -> Vec<usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).iter().copied().collect()
    }

    pub fn append_partial(&self, index: usize, chunk: &str) {
        let mut partials = self.partials.lock().unwrap_or_else(PoisonError::into_inner);
        partials.entry(index).or_default().push_str(chunk);
    }

    pub fn partial(&self, index: usize) -> Option<String> {
        self.partials.lock().unwrap_or_else(PoisonError::into_inner).get(&index).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        let indices = self.in_flight();
        let partials = self.partials.lock().unwrap_or_else(PoisonError::into_inner);
        let running = indices
            .into_iter()
            .map(|index| RunningPrompt { index, text: partials.get(&index).cloned().unwrap_or_default() })
            .collect();
        Snapshot { running }
    }
}

/// Removes its index from the in-flight set on drop, whichever way the owning
/// runner exits (return, error, panic or task abort).
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<BatchState>,
    index: usize,
    completed: bool,
}

impl InFlightGuard {
    pub fn index(&self) -> usize { self.index }

    pub fn state(&self) -> &BatchState { &self.state }

    pub(crate) fn complete(&mut self) { self.completed = true; }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.leave(self.index);
        loadgen_obs::prompt_finished(!self.completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_leaves_on_drop_and_rejects_duplicates() {
        let state = BatchState::new();
        let guard = state.enter(3).unwrap();
        assert!(matches!(state.enter(3), Err(LoadgenError::DuplicateIndex(3))));
        assert_eq!(state.in_flight(), vec![3]);
        assert_eq!(guard.index(), 3);
        drop(guard);
        assert!(state.is_idle());
        assert!(state.enter(3).is_ok());
    }

    #[test]
    fn partials_survive_their_runner() {
        let state = BatchState::new();
        let guard = state.enter(0).unwrap();
        state.append_partial(0, "Once");
        state.append_partial(0, " upon");
        assert_eq!(state.snapshot().running, vec![RunningPrompt { index: 0, text: "Once upon".into() }]);
        drop(guard);
        assert!(state.snapshot().is_empty());
        assert_eq!(state.partial(0).as_deref(), Some("Once upon"));
    }
}
