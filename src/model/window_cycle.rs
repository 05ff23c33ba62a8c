//! Round-robin rotation through a process's windows.
//!
//! The order is frozen when a stack is built and only rebuilt when the live
//! window count changes, so enumeration jitter cannot reorder a rotation in
//! progress. A rebuild resumes after the window raised last.

use tracing::{debug, trace};

use crate::common::collections::HashMap;
use crate::sys::app::ProcessId;
use crate::sys::window::{WindowHandle, WindowInfo, WindowSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCycleEntry {
    pub handle: WindowHandle,
    /// Native window number, or a synthetic one past every native number.
    pub order: u64,
    pub title: String,
}

/// Sorts windows by native number. Windows without one keep their
/// enumeration order and go after all numbered windows.
pub fn cycle_order(windows: Vec<WindowInfo>) -> Vec<WindowCycleEntry> {
    let synthetic_base = u64::from(u32::MAX) + 1;
    let mut entries: Vec<WindowCycleEntry> = windows
        .into_iter()
        .enumerate()
        .map(|(idx, info)| WindowCycleEntry {
            handle: info.handle,
            order: info.number.map_or(synthetic_base + idx as u64, u64::from),
            title: info.title,
        })
        .collect();
    entries.sort_by_key(|e| e.order);
    entries
}

#[derive(Debug, Default)]
struct CycleStack {
    entries: Vec<WindowCycleEntry>,
    /// `None` when there is nothing to rotate to.
    index: Option<usize>,
}

impl CycleStack {
    /// Starts over from `entries`, resuming after `last` if it survived.
    fn rebuild(entries: Vec<WindowCycleEntry>, last: Option<WindowHandle>) -> Self {
        let index = (entries.len() >= 2).then(|| {
            last.and_then(|handle| entries.iter().position(|e| e.handle == handle)).unwrap_or(0)
        });
        CycleStack { entries, index }
    }

    fn advance(&mut self, is_live: impl Fn(WindowHandle) -> bool) -> Option<WindowCycleEntry> {
        let current = self.index?;
        let current_handle = self.entries.get(current).map(|e| e.handle);
        let mut next = current + 1;
        let attempts = self.entries.len() * 2;

        for _ in 0..attempts {
            if self.entries.is_empty() {
                break;
            }
            next %= self.entries.len();
            let candidate = &self.entries[next];
            if is_live(candidate.handle) {
                self.index = Some(next);
                if Some(candidate.handle) == current_handle {
                    trace!("only the current window is left to cycle to");
                    return None;
                }
                return Some(candidate.clone());
            }
            debug!(handle = ?candidate.handle, "dropping stale window from cycle stack");
            self.entries.remove(next);
        }

        self.entries.clear();
        self.index = None;
        None
    }
}

#[derive(Debug, Default)]
pub struct WindowCycler {
    stacks: HashMap<ProcessId, CycleStack>,
}

impl WindowCycler {
    pub fn new() -> Self { Self::default() }

    /// Picks the next window of `pid` to raise, pruning stale entries along
    /// the way. Returns `None` when there is nothing to cycle to.
    pub fn cycle(&mut self, pid: ProcessId, source: &dyn WindowSource) -> Option<WindowCycleEntry> {
        let mut listed = source.windows(pid);
        listed.retain(|info| source.is_live(info.handle));
        let live = cycle_order(listed);
        let stack = self.stacks.entry(pid).or_default();
        if stack.entries.is_empty() || stack.entries.len() != live.len() {
            trace!(%pid, cached = stack.entries.len(), live = live.len(), "rebuilding cycle stack");
            let last = stack.index.and_then(|idx| stack.entries.get(idx)).map(|e| e.handle);
            *stack = CycleStack::rebuild(live, last);
        }
        stack.advance(|handle| source.is_live(handle))
    }

    /// Forgets every stack except the one belonging to `pid`.
    pub fn reset_all_except(&mut self, pid: ProcessId) { self.stacks.retain(|owner, _| *owner == pid); }

    pub fn cached_len(&self, pid: ProcessId) -> Option<usize> {
        self.stacks.get(&pid).map(|s| s.entries.len())
    }

    /// The entry last raised for `pid`, if its stack has anything to rotate.
    pub fn current(&self, pid: ProcessId) -> Option<&WindowCycleEntry> {
        let stack = self.stacks.get(&pid)?;
        stack.entries.get(stack.index?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::collections::HashSet;
    use crate::sys::SysError;

    const PID: ProcessId = ProcessId(42);

    #[derive(Default)]
    struct FakeWindows {
        listed: Vec<WindowInfo>,
        dead: HashSet<WindowHandle>,
    }

    impl FakeWindows {
        fn with(numbers: &[(u64, Option<u32>)]) -> Self {
            FakeWindows {
                listed: numbers
                    .iter()
                    .map(|&(handle, number)| WindowInfo {
                        handle: WindowHandle(handle),
                        number,
                        title: format!("window {handle}"),
                    })
                    .collect(),
                dead: HashSet::default(),
            }
        }
    }

    impl WindowSource for FakeWindows {
        fn windows(&self, _pid: ProcessId) -> Vec<WindowInfo> { self.listed.clone() }

        fn is_live(&self, handle: WindowHandle) -> bool { !self.dead.contains(&handle) }

        fn raise(&mut self, _handle: WindowHandle) -> Result<(), SysError> { Ok(()) }
    }

    fn handle(entry: Option<WindowCycleEntry>) -> Option<u64> { entry.map(|e| e.handle.0) }

    #[test]
    fn orders_by_number_with_unnumbered_last() {
        let ordered = cycle_order(FakeWindows::with(&[(1, None), (2, Some(30)), (3, Some(10)), (4, None)]).listed);
        let handles: Vec<u64> = ordered.iter().map(|e| e.handle.0).collect();
        assert_eq!(handles, vec![3, 2, 1, 4]);
    }

    #[test]
    fn rotates_round_robin() {
        let source = FakeWindows::with(&[(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        let mut cycler = WindowCycler::new();
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(2));
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(3));
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(1));
    }

    #[test]
    fn single_window_has_nothing_to_cycle() {
        let source = FakeWindows::with(&[(1, Some(1))]);
        let mut cycler = WindowCycler::new();
        assert_eq!(cycler.cycle(PID, &source), None);
        assert_eq!(cycler.current(PID), None);

        let empty = FakeWindows::default();
        assert_eq!(cycler.cycle(PID, &empty), None);
    }

    #[test]
    fn keeps_cached_order_when_count_is_unchanged() {
        let mut source = FakeWindows::with(&[(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        let mut cycler = WindowCycler::new();
        cycler.cycle(PID, &source);

        // Same windows, enumeration now reports different numbers.
        source.listed[0].number = Some(9);
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(3));
    }

    #[test]
    fn stale_middle_entry_is_skipped_and_dropped() {
        let mut source = FakeWindows::with(&[(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        let mut cycler = WindowCycler::new();
        // Three full rotations leave the index back at the first window.
        for _ in 0..3 {
            cycler.cycle(PID, &source);
        }
        assert_eq!(cycler.current(PID).map(|e| e.handle.0), Some(1));

        source.dead.insert(WindowHandle(2));
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(3));
        assert_eq!(cycler.cached_len(PID), Some(2));
        assert_eq!(cycler.current(PID).map(|e| e.handle.0), Some(3));
    }

    #[test]
    fn stale_window_still_listed_stays_out_of_the_rotation() {
        let mut source = FakeWindows::with(&[(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        let mut cycler = WindowCycler::new();
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(2));
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(3));

        source.dead.insert(WindowHandle(1));
        let raised: Vec<_> = (0..4).map(|_| handle(cycler.cycle(PID, &source))).collect();
        assert_eq!(raised, vec![Some(2), Some(3), Some(2), Some(3)]);
        assert_eq!(cycler.cached_len(PID), Some(2));
    }

    #[test]
    fn all_stale_empties_the_stack() {
        let mut source = FakeWindows::with(&[(1, Some(1)), (2, Some(2)), (3, Some(3))]);
        let mut cycler = WindowCycler::new();
        cycler.cycle(PID, &source);
        source.dead.extend([WindowHandle(1), WindowHandle(2), WindowHandle(3)]);
        assert_eq!(cycler.cycle(PID, &source), None);
        assert_eq!(cycler.cached_len(PID), Some(0));
        assert_eq!(cycler.current(PID), None);
    }

    #[test]
    fn count_change_forces_rebuild() {
        let mut source = FakeWindows::with(&[(1, Some(1)), (2, Some(2))]);
        let mut cycler = WindowCycler::new();
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(2));

        source.listed.push(WindowInfo {
            handle: WindowHandle(3),
            number: Some(3),
            title: "new".into(),
        });
        assert_eq!(handle(cycler.cycle(PID, &source)), Some(3));
        assert_eq!(cycler.cached_len(PID), Some(3));
    }

    #[test]
    fn reset_keeps_only_the_named_process() {
        let source = FakeWindows::with(&[(1, Some(1)), (2, Some(2))]);
        let mut cycler = WindowCycler::new();
        cycler.cycle(ProcessId(1), &source);
        cycler.cycle(ProcessId(2), &source);
        cycler.reset_all_except(ProcessId(2));
        assert_eq!(cycler.cached_len(ProcessId(1)), None);
        assert_eq!(cycler.cached_len(ProcessId(2)), Some(2));
    }
}
