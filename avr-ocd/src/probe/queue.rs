use std::fmt;
use std::{collections::HashMap, sync::Arc};

use crate::probe::{
    scan_bits, DebugProbeError, JtagTap, ScanBits, ScanCommand, ScanRegister, TapState,
};

/// An error that occurred during batched execution of JTAG scans.
#[derive(thiserror::Error, Debug)]
pub struct BatchExecutionError {
    /// The error that occurred during execution.
    #[source]
    pub error: DebugProbeError,

    /// The results of the scans that were executed before the error occurred.
    pub results: DeferredResultSet<ScanBits>,
}

impl BatchExecutionError {
    /// Creates a new error from the probe error and the results collected so far.
    pub fn new(error: DebugProbeError, results: DeferredResultSet<ScanBits>) -> Self {
        Self { error, results }
    }
}

impl fmt::Display for BatchExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error cause was {}. Successful command count {}",
            self.error,
            self.results.len()
        )
    }
}

/// The set of results returned by executing a batch of scans.
pub struct DeferredResultSet<T>(HashMap<DeferredResultIndex, T>);

impl<T: fmt::Debug> fmt::Debug for DeferredResultSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredResultSet").field(&self.0).finish()
    }
}

impl<T> Default for DeferredResultSet<T> {
    fn default() -> Self {
        Self(HashMap::default())
    }
}

impl<T> DeferredResultSet<T> {
    /// Creates a new empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty result set with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(HashMap::with_capacity(capacity))
    }

    /// Stores the result of the scan identified by `idx`.
    pub fn push(&mut self, idx: &DeferredResultIndex, result: T) {
        self.0.insert(idx.clone(), result);
    }

    /// Returns the number of results in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn merge_from(&mut self, other: DeferredResultSet<T>) {
        self.0.extend(other.0);
        self.0.retain(|k, _| k.should_capture());
    }

    /// Takes a result from the set.
    pub fn take(&mut self, index: DeferredResultIndex) -> Result<T, DeferredResultIndex> {
        self.0.remove(&index).ok_or(index)
    }
}

/// An index type used to retrieve the result of a deferred scan.
///
/// This type can detect if the result of a scan is not used.
#[derive(Eq)]
pub struct DeferredResultIndex(Arc<()>);

impl PartialEq for DeferredResultIndex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DeferredResultIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredResultIndex")
            .field(&self.id())
            .finish()
    }
}

impl DeferredResultIndex {
    // Intentionally private. User code must not be able to create these.
    fn new() -> Self {
        Self(Arc::new(()))
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Returns `true` if some code other than the current holder still waits for this result.
    ///
    /// Probe drivers use this to skip capturing bits nobody is going to read.
    pub fn should_capture(&self) -> bool {
        // The queue (or result set) and the issuing code hold at most one reference each. Once the
        // issuing code drops its index, the captured bits are unreachable.
        Arc::strong_count(&self.0) > 1
    }

    // Intentionally private. User code must not be able to clone these.
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl std::hash::Hash for DeferredResultIndex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

/// A batch of IR and DR scans that will be executed by the probe in one go.
///
/// The queue keeps track of which scans' results can still be read by the issuing code, which
/// lets the probe skip capturing the others.
#[derive(Debug, Default)]
pub struct ScanQueue {
    commands: Vec<(DeferredResultIndex, ScanCommand)>,
}

impl ScanQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a command for later execution.
    ///
    /// Returns a token that can be used to retrieve the captured bits once the queue was executed.
    pub fn schedule(&mut self, command: ScanCommand) -> DeferredResultIndex {
        let index = DeferredResultIndex::new();
        self.commands.push((index.clone(), command));
        index
    }

    /// Schedules an instruction register scan of `len` bits shifting out `value`.
    pub fn enqueue_ir_scan(
        &mut self,
        tap: JtagTap,
        len: u32,
        value: u32,
        end_state: TapState,
    ) -> DeferredResultIndex {
        self.schedule(ScanCommand {
            tap,
            register: ScanRegister::Instruction,
            out_bits: scan_bits(value, len),
            end_state,
        })
    }

    /// Schedules a data register scan of `len` bits shifting out `value`.
    pub fn enqueue_dr_scan(
        &mut self,
        tap: JtagTap,
        len: u32,
        value: u32,
        end_state: TapState,
    ) -> DeferredResultIndex {
        self.schedule(ScanCommand {
            tap,
            register: ScanRegister::Data,
            out_bits: scan_bits(value, len),
            end_state,
        })
    }

    /// Returns the number of scans in the queue.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates over the queued scans in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &(DeferredResultIndex, ScanCommand)> {
        self.commands.iter()
    }

    /// Iterates over the queued scans, without their result tokens.
    pub fn commands(&self) -> impl Iterator<Item = &ScanCommand> {
        self.commands.iter().map(|(_, command)| command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dropped_index_is_not_captured() {
        let mut queue = ScanQueue::new();
        let tap = JtagTap::new(0, 4);

        let kept = queue.enqueue_ir_scan(tap, 4, 0xB, TapState::Idle);
        queue.enqueue_dr_scan(tap, 5, 9, TapState::Idle);

        let captures: Vec<bool> = queue.iter().map(|(idx, _)| idx.should_capture()).collect();
        assert_eq!(captures, vec![true, false]);

        drop(kept);
        assert!(queue.iter().all(|(idx, _)| !idx.should_capture()));
    }

    #[test]
    fn merged_results_drop_unreachable_entries() {
        let mut queue = ScanQueue::new();
        let tap = JtagTap::new(0, 4);
        let kept = queue.enqueue_dr_scan(tap, 8, 1, TapState::Idle);
        let dropped = queue.enqueue_dr_scan(tap, 8, 2, TapState::Idle);

        let mut results = DeferredResultSet::new();
        for (idx, command) in queue.iter() {
            results.push(idx, command.out_bits.clone());
        }
        drop(queue);
        drop(dropped);

        let mut merged = DeferredResultSet::new();
        merged.merge_from(results);
        assert_eq!(merged.len(), 1);

        let bits = merged.take(kept).expect("result for the kept index");
        assert_eq!(bits, scan_bits(1, 8));
    }

    #[test]
    fn queue_preserves_order() {
        let mut queue = ScanQueue::new();
        let tap = JtagTap::new(0, 4);
        queue.enqueue_ir_scan(tap, 4, 0xC, TapState::Idle);
        queue.enqueue_dr_scan(tap, 1, 1, TapState::Idle);

        let registers: Vec<ScanRegister> = queue.commands().map(|c| c.register).collect();
        assert_eq!(
            registers,
            vec![ScanRegister::Instruction, ScanRegister::Data]
        );
        assert_eq!(queue.len(), 2);
    }
}
