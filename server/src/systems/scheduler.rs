// world_server_core/server/src/systems/scheduler.rs
use smallvec::SmallVec;

#[derive(Clone, Debug)]
struct ScheduledTask<A> {
    due: u64,
    /// Re-arm interval for repeating tasks.
    repeat: Option<u64>,
    group: u32,
    action: A,
}

/// Per-entity list of (due time, action) pairs. Driven by the owner's update;
/// due actions are handed back to the caller instead of being run here.
#[derive(Clone, Debug)]
pub struct TaskScheduler<A> {
    now: u64,
    tasks: Vec<ScheduledTask<A>>,
}

impl<A> Default for TaskScheduler<A> {
    fn default() -> Self {
        TaskScheduler { now: 0, tasks: Vec::new() }
    }
}

impl<A: Clone> TaskScheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay_ms: u64, action: A) {
        self.push(delay_ms, None, 0, action);
    }

    pub fn schedule_repeating(&mut self, interval_ms: u64, group: u32, action: A) {
        self.push(interval_ms, Some(interval_ms.max(1)), group, action);
    }

    fn push(&mut self, delay: u64, repeat: Option<u64>, group: u32, action: A) {
        self.tasks.push(ScheduledTask { due: self.now + delay, repeat, group, action });
    }

    pub fn cancel_group(&mut self, group: u32) {
        self.tasks.retain(|t| t.group != group);
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Advances the clock and returns due actions in due order. A repeating
    /// task that fell several intervals behind fires once per interval.
    pub fn update(&mut self, diff: u32) -> SmallVec<[A; 4]> {
        self.now += diff as u64;
        let mut fired: SmallVec<[(u64, A); 4]> = SmallVec::new();
        let now = self.now;
        self.tasks.retain_mut(|task| {
            while task.due <= now {
                fired.push((task.due, task.action.clone()));
                match task.repeat {
                    Some(interval) => task.due += interval,
                    None => return false,
                }
            }
            true
        });
        fired.sort_by_key(|(due, _)| *due);
        fired.into_iter().map(|(_, a)| a).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut s = TaskScheduler::new();
        s.schedule(100, "a");
        assert!(s.update(50).is_empty());
        assert_eq!(s.update(50).as_slice(), &["a"]);
        assert!(s.update(500).is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn repeating_keeps_cadence() {
        let mut s = TaskScheduler::new();
        s.schedule_repeating(1000, 1, 7u32);
        assert_eq!(s.update(2500).len(), 2);
        assert_eq!(s.update(500).len(), 1);
        s.cancel_group(1);
        assert!(s.update(5000).is_empty());
    }

    #[test]
    fn fires_in_due_order() {
        let mut s = TaskScheduler::new();
        s.schedule(300, 3);
        s.schedule(100, 1);
        s.schedule(200, 2);
        assert_eq!(s.update(1000).as_slice(), &[1, 2, 3]);
    }
}
