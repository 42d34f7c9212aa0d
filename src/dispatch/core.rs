use std::ops::AddAssign;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::block::{BlockEvent, BlockId, HandlerToken};
use crate::config::{BarConfig, DrainPolicy};
use crate::logging::{LogLevel, emit, json_kv};
use crate::store::StoreState;

use super::{AppContext, DISPATCH_TARGET};

/// Callback bound to a block, invoked on the dispatcher thread for each event
/// drained from that block's queue.
pub trait Handler: Send {
    fn call(&mut self, ctx: &AppContext, block: BlockId, event: BlockEvent);
}

impl<F> Handler for F
where
    F: FnMut(&AppContext, BlockId, BlockEvent) + Send,
{
    fn call(&mut self, ctx: &AppContext, block: BlockId, event: BlockEvent) {
        self(ctx, block, event)
    }
}

/// What one dispatcher tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub events_dispatched: usize,
    pub events_dropped_unbound: usize,
    pub timers_fired: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

impl AddAssign for TickReport {
    fn add_assign(&mut self, other: Self) {
        self.events_dispatched += other.events_dispatched;
        self.events_dropped_unbound += other.events_dropped_unbound;
        self.timers_fired += other.timers_fired;
    }
}

struct Pending {
    block: BlockId,
    event: BlockEvent,
    handler: HandlerToken,
}

/// Drains block event queues into their handlers and fires due timers.
#[derive(Debug)]
pub struct Dispatcher {
    ctx: AppContext,
    policy: DrainPolicy,
    interval: Duration,
}

impl Dispatcher {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            policy: DrainPolicy::OnePerTick,
            interval: Duration::from_millis(10),
        }
    }

    pub fn from_config(ctx: AppContext, config: &BarConfig) -> Self {
        Self::new(ctx)
            .with_policy(config.event_drain)
            .with_interval(config.dispatch_interval)
    }

    pub fn with_policy(mut self, policy: DrainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Dispatch queued events per the drain policy, then fire every timer due
    /// at `now`. Handlers and callbacks run with no store lock held.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let (pending, dropped) = {
            let mut state = self.ctx.store().lock();
            collect_events(&mut state, self.policy)
        };

        for (block, count) in dropped {
            report.events_dropped_unbound += count;
            emit(
                self.ctx.logger(),
                LogLevel::Debug,
                DISPATCH_TARGET,
                "events_dropped_unbound",
                [
                    json_kv("block", json!(block.as_raw())),
                    json_kv("count", json!(count)),
                ],
            );
        }

        for item in pending {
            item.handler.invoke(&self.ctx, item.block, item.event);
            report.events_dispatched += 1;
        }

        let due = self.ctx.timers().take_due(now);
        for (_, callback) in due {
            callback(&self.ctx);
            report.timers_fired += 1;
        }

        report
    }

    /// Tick every interval until `stop` returns true. Sleeps are shortened
    /// when a timer comes due sooner.
    pub fn run_until<F>(&mut self, mut stop: F) -> TickReport
    where
        F: FnMut() -> bool,
    {
        let mut total = TickReport::default();
        emit(
            self.ctx.logger(),
            LogLevel::Info,
            DISPATCH_TARGET,
            "dispatcher_started",
            [json_kv("interval_ms", json!(self.interval.as_millis() as u64))],
        );

        while !stop() {
            total += self.tick(Instant::now());

            let now = Instant::now();
            let wait = match self.ctx.timers().next_due() {
                Some(due) => due.saturating_duration_since(now).min(self.interval),
                None => self.interval,
            };
            thread::sleep(wait);
        }

        emit(
            self.ctx.logger(),
            LogLevel::Info,
            DISPATCH_TARGET,
            "dispatcher_stopped",
            [
                json_kv("events", json!(total.events_dispatched)),
                json_kv("timers", json!(total.timers_fired)),
            ],
        );
        total
    }
}

/// Pop events under the store lock. Blocks are visited in creation order;
/// queues whose block lost its handler are cleared and reported.
fn collect_events(
    state: &mut StoreState,
    policy: DrainPolicy,
) -> (Vec<Pending>, Vec<(BlockId, usize)>) {
    let mut pending = Vec::new();
    let mut dropped = Vec::new();

    for block in state.blocks_mut() {
        if block.pending_events() == 0 {
            continue;
        }
        let Some(handler) = block.handler().cloned() else {
            dropped.push((block.id(), block.clear_events()));
            continue;
        };

        while let Some(event) = block.pop_event() {
            pending.push(Pending {
                block: block.id(),
                event,
                handler: handler.clone(),
            });
            if policy == DrainPolicy::OnePerTick {
                return (pending, dropped);
            }
        }
    }

    (pending, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandQueue;
    use crate::store::{BlockStore, PointerOutcome};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(BlockId, i32)>>>;

    fn recording(seen: Seen) -> impl Handler + 'static {
        move |_: &AppContext, block: BlockId, event: BlockEvent| {
            seen.lock().unwrap().push((block, event.code()));
        }
    }

    fn laid_out_pair(ctx: &AppContext) -> (BlockId, BlockId) {
        let a = ctx.create_block();
        let b = ctx.create_block();
        let mut state = ctx.store().lock();
        state.get_mut(a).unwrap().record_placement(110, 80);
        state.get_mut(b).unwrap().record_placement(200, 90);
        (a, b)
    }

    fn context() -> AppContext {
        AppContext::new(Arc::new(BlockStore::new()), Arc::new(CommandQueue::new()))
    }

    #[test]
    fn one_event_per_tick_in_push_order() {
        let ctx = context();
        let seen: Seen = Arc::default();
        let (a, b) = laid_out_pair(&ctx);
        ctx.set_handler(a, recording(Arc::clone(&seen))).unwrap();
        ctx.set_handler(b, recording(Arc::clone(&seen))).unwrap();

        {
            let mut state = ctx.store().lock();
            assert_eq!(state.route_pointer(200, 50, BlockEvent::MouseDown), PointerOutcome::Queued(a));
            assert_eq!(state.route_pointer(200, 50, BlockEvent::MouseUp), PointerOutcome::Queued(a));
            assert_eq!(state.route_pointer(200, 150, BlockEvent::MouseDown), PointerOutcome::Queued(b));
        }

        let mut dispatcher = Dispatcher::new(ctx);
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(dispatcher.tick(now).events_dispatched, 1);
        }
        assert!(dispatcher.tick(now).is_idle());
        assert_eq!(*seen.lock().unwrap(), vec![(a, 1), (a, 2), (b, 1)]);
    }

    #[test]
    fn drain_all_empties_every_queue() {
        let ctx = context();
        let seen: Seen = Arc::default();
        let (a, b) = laid_out_pair(&ctx);
        ctx.set_handler(a, recording(Arc::clone(&seen))).unwrap();
        ctx.set_handler(b, recording(Arc::clone(&seen))).unwrap();
        {
            let mut state = ctx.store().lock();
            state.route_pointer(200, 150, BlockEvent::MouseDown);
            state.route_pointer(200, 40, BlockEvent::MouseDown);
        }

        let mut dispatcher = Dispatcher::new(ctx).with_policy(DrainPolicy::All);
        assert_eq!(dispatcher.tick(Instant::now()).events_dispatched, 2);
        assert_eq!(*seen.lock().unwrap(), vec![(a, 1), (b, 1)]);
    }

    #[test]
    fn unbound_queue_is_cleared_on_the_matched_block_only() {
        let ctx = context();
        let seen: Seen = Arc::default();
        let (a, b) = laid_out_pair(&ctx);
        ctx.set_handler(a, recording(Arc::clone(&seen))).unwrap();
        ctx.set_handler(b, recording(Arc::clone(&seen))).unwrap();
        {
            let mut state = ctx.store().lock();
            state.route_pointer(200, 50, BlockEvent::MouseDown);
            state.route_pointer(200, 150, BlockEvent::MouseDown);
            state.route_pointer(200, 150, BlockEvent::MouseUp);
        }
        ctx.clear_handler(b).unwrap();

        let mut dispatcher = Dispatcher::new(ctx.clone());
        let report = dispatcher.tick(Instant::now());
        assert_eq!(report.events_dispatched, 1);
        assert_eq!(report.events_dropped_unbound, 0);
        let report = dispatcher.tick(Instant::now());
        assert_eq!(report.events_dropped_unbound, 2);
        assert_eq!(report.events_dispatched, 0);

        assert_eq!(*seen.lock().unwrap(), vec![(a, 1)]);
        assert_eq!(ctx.inspect(b).unwrap().pending_events(), 0);
    }

    #[test]
    fn handlers_can_mutate_the_store() {
        let ctx = context();
        let (a, _) = laid_out_pair(&ctx);
        ctx.set_handler(a, |ctx: &AppContext, block: BlockId, event: BlockEvent| {
            ctx.set_text(block, &format!("clicked {}", event.code())).unwrap();
        })
        .unwrap();
        ctx.store().lock().route_pointer(200, 50, BlockEvent::MouseUp);

        let mut dispatcher = Dispatcher::new(ctx.clone());
        dispatcher.tick(Instant::now());
        assert_eq!(ctx.inspect(a).unwrap().text(), "clicked 2");
        assert!(ctx.commands().take_redraw());
    }

    #[test]
    fn timers_fire_once_and_may_reschedule() {
        let ctx = context();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fired);
        ctx.schedule(Duration::ZERO, move |ctx: &AppContext| {
            log.lock().unwrap().push("first");
            let log = Arc::clone(&log);
            ctx.schedule(Duration::ZERO, move |_: &AppContext| {
                log.lock().unwrap().push("second");
            });
        });

        let mut dispatcher = Dispatcher::new(ctx);
        assert_eq!(dispatcher.tick(Instant::now()).timers_fired, 1);
        assert_eq!(dispatcher.tick(Instant::now()).timers_fired, 1);
        assert_eq!(dispatcher.tick(Instant::now()).timers_fired, 0);
        assert_eq!(*fired.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn run_until_stops_when_asked() {
        let ctx = context();
        let mut dispatcher = Dispatcher::new(ctx).with_interval(Duration::from_millis(1));
        let mut ticks = 0;
        dispatcher.run_until(|| {
            ticks += 1;
            ticks > 3
        });
        assert_eq!(ticks, 4);
    }
}
