use std::fmt;
use std::mem;
use std::time::{Duration, Instant};

use super::AppContext;

/// One-shot callback run on the control thread when its timer comes due.
pub type TimerCallback = Box<dyn FnOnce(&AppContext) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

struct Timer {
    id: TimerId,
    due: Instant,
    callback: TimerCallback,
}

/// Pending one-shot timers, kept in issuance order.
pub struct TimerQueue {
    next_id: u64,
    timers: Vec<Timer>,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            timers: Vec::new(),
        }
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            due: now + delay,
            callback,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    /// Remove every timer due at `now`, in the order they were scheduled.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerId, TimerCallback)> {
        let (due, pending): (Vec<Timer>, Vec<Timer>) = mem::take(&mut self.timers)
            .into_iter()
            .partition(|timer| timer.due <= now);
        self.timers = pending;
        due.into_iter()
            .map(|timer| (timer.id, timer.callback))
            .collect()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.due).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("next_id", &self.next_id)
            .field("pending", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TimerCallback {
        Box::new(|_: &AppContext| {})
    }

    #[test]
    fn due_timers_come_out_in_issuance_order() {
        let mut queue = TimerQueue::new();
        let start = Instant::now();
        let late = queue.schedule(start, Duration::from_millis(30), noop());
        let early = queue.schedule(start, Duration::from_millis(10), noop());
        let pending = queue.schedule(start, Duration::from_secs(60), noop());

        let fired: Vec<TimerId> = queue
            .take_due(start + Duration::from_millis(40))
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(fired, vec![late, early]);
        assert_eq!(queue.len(), 1);
        assert!(queue.cancel(pending));
        assert!(queue.is_empty());
    }

    #[test]
    fn nothing_fires_before_its_due_time() {
        let mut queue = TimerQueue::new();
        let start = Instant::now();
        queue.schedule(start, Duration::from_millis(50), noop());
        assert!(queue.take_due(start + Duration::from_millis(49)).is_empty());
        assert_eq!(queue.next_due(), Some(start + Duration::from_millis(50)));
        assert_eq!(queue.take_due(start + Duration::from_millis(50)).len(), 1);
    }

    #[test]
    fn cancel_unknown_timer_is_false() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(Instant::now(), Duration::ZERO, noop());
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
    }
}
