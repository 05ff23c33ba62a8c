use tracing::trace;

use crate::sys::app::{ProcessHandle, ProcessId};

/// Most-recently-used order of switchable processes, most recent first.
///
/// Never contains duplicates or the engine's own process. Entries that fail
/// the eligibility check are pruned before every read.
#[derive(Debug)]
pub struct MruTracker {
    own_pid: ProcessId,
    entries: Vec<ProcessHandle>,
}

impl MruTracker {
    pub fn new(own_pid: ProcessId) -> Self { Self { own_pid, entries: Vec::new() } }

    pub fn own_pid(&self) -> ProcessId { self.own_pid }

    /// Rebuilds the list from scratch: the frontmost process first, then the
    /// remaining candidates in enumeration order.
    pub fn seed(&mut self, frontmost: Option<ProcessHandle>, candidates: Vec<ProcessHandle>) {
        self.entries.clear();
        for handle in frontmost.into_iter().chain(candidates) {
            if handle.pid == self.own_pid || self.position(handle.pid).is_some() {
                continue;
            }
            self.entries.push(handle);
        }
        trace!(len = self.entries.len(), "seeded mru list");
    }

    pub fn on_process_activated(
        &mut self,
        handle: ProcessHandle,
        is_switchable: impl Fn(ProcessId) -> bool,
    ) {
        if let Some(idx) = self.position(handle.pid) {
            self.entries.remove(idx);
        }
        self.entries.insert(0, handle);
        self.prune(is_switchable);
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<ProcessHandle> {
        let idx = self.position(pid)?;
        Some(self.entries.remove(idx))
    }

    pub fn snapshot(&mut self, is_switchable: impl Fn(ProcessId) -> bool) -> Vec<ProcessHandle> {
        self.prune(is_switchable);
        self.entries.clone()
    }

    /// Target of a quick switch: the previous process, or the only one.
    pub fn quick_switch_target(
        &mut self,
        is_switchable: impl Fn(ProcessId) -> bool,
    ) -> Option<ProcessHandle> {
        self.prune(is_switchable);
        self.entries.get(1).or_else(|| self.entries.first()).cloned()
    }

    fn prune(&mut self, is_switchable: impl Fn(ProcessId) -> bool) {
        let own_pid = self.own_pid;
        self.entries.retain(|h| h.pid != own_pid && is_switchable(h.pid));
    }

    fn position(&self, pid: ProcessId) -> Option<usize> {
        self.entries.iter().position(|h| h.pid == pid)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::collections::HashSet;

    const OWN: ProcessId = ProcessId(1);

    fn pids(list: &[ProcessHandle]) -> Vec<u32> { list.iter().map(|h| h.pid.0).collect() }

    fn all(_: ProcessId) -> bool { true }

    #[test]
    fn seed_puts_frontmost_first_and_dedups() {
        let mut mru = MruTracker::new(OWN);
        mru.seed(Some(ProcessHandle::new(30, "C")), vec![
            ProcessHandle::new(10, "A"),
            ProcessHandle::new(1, "self"),
            ProcessHandle::new(30, "C"),
            ProcessHandle::new(20, "B"),
            ProcessHandle::new(10, "A"),
        ]);
        assert_eq!(pids(&mru.snapshot(all)), vec![30, 10, 20]);
    }

    #[test]
    fn activation_moves_to_front_and_is_idempotent() {
        let mut mru = MruTracker::new(OWN);
        mru.seed(None, vec![ProcessHandle::new(10, "A"), ProcessHandle::new(20, "B")]);
        mru.on_process_activated(ProcessHandle::new(20, "B"), all);
        mru.on_process_activated(ProcessHandle::new(20, "B"), all);
        assert_eq!(pids(&mru.snapshot(all)), vec![20, 10]);
    }

    #[test]
    fn never_contains_own_process_or_duplicates() {
        let mut mru = MruTracker::new(OWN);
        let sequence = [10, 1, 20, 10, 30, 1, 20, 20, 40, 10];
        for pid in sequence {
            mru.on_process_activated(ProcessHandle::new(pid, format!("p{pid}")), all);
            let snapshot = pids(&mru.snapshot(all));
            let unique: HashSet<u32> = snapshot.iter().copied().collect();
            assert_eq!(unique.len(), snapshot.len());
            assert!(!snapshot.contains(&OWN.0));
        }
        assert_eq!(pids(&mru.snapshot(all)), vec![10, 40, 20, 30]);
    }

    #[test]
    fn dead_entries_are_pruned_on_read() {
        let mut mru = MruTracker::new(OWN);
        mru.seed(None, vec![
            ProcessHandle::new(10, "A"),
            ProcessHandle::new(20, "B"),
            ProcessHandle::new(30, "C"),
        ]);
        assert_eq!(pids(&mru.snapshot(|pid| pid != ProcessId(20))), vec![10, 30]);
    }

    #[test]
    fn quick_switch_target_selection() {
        let mut mru = MruTracker::new(OWN);
        assert_eq!(mru.quick_switch_target(all), None);

        mru.seed(None, vec![ProcessHandle::new(10, "A")]);
        assert_eq!(mru.quick_switch_target(all).map(|h| h.pid), Some(ProcessId(10)));

        mru.seed(None, vec![ProcessHandle::new(10, "A"), ProcessHandle::new(20, "B")]);
        assert_eq!(mru.quick_switch_target(all).map(|h| h.pid), Some(ProcessId(20)));
    }
}
