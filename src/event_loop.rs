//! Single-threaded cooperative dispatcher.
//!
//! ```text
//!            ┌──────────────────────── run() ────────────────────────┐
//!            │                                                       │
//!  pending ──┼─▶ 1. triggers   (coalesced bits → handler table)      │
//!  timers  ──┼─▶ 2. one-shot timers whose deadline passed            │
//!  I/O     ──┼─▶ 3. LoopContext::poll_io (transport completions)     │
//!            │   4. nothing to do → park until signal / deadline     │
//!            └───────────────────────────────────────────────────────┘
//! ```
//!
//! Every handler receives the owning context `&mut C` plus a
//! [`LoopControl`] for arming timers or stopping the loop. Exactly one
//! handler runs at a time and handlers must not block.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{Result, SetupError};
use crate::events::{MAX_TRIGGERS, PendingTriggers, TriggerHandle};

/// Maximum number of concurrently armed one-shot timers.
const MAX_TIMERS: usize = 8;

/// Signature shared by trigger handlers and timer handlers.
pub type TriggerFn<C> = fn(&mut C, &mut LoopControl<C>);

/// Implemented by the owning context the loop drives.
pub trait LoopContext: Sized {
    /// Poll I/O sources once (transport readiness, indicator output).
    /// Returns the number of events dispatched; 0 lets the loop idle.
    fn poll_io(&mut self, ctl: &mut LoopControl<Self>) -> usize;
}

struct Registration<C> {
    name: &'static str,
    handler: TriggerFn<C>,
}

struct Timer<C> {
    name: &'static str,
    deadline: Instant,
    handler: TriggerFn<C>,
}

/// Loop services available to handlers.
pub struct LoopControl<C> {
    timers: heapless::Vec<Timer<C>, MAX_TIMERS>,
    stopped: bool,
}

impl<C> LoopControl<C> {
    fn new() -> Self {
        Self {
            timers: heapless::Vec::new(),
            stopped: false,
        }
    }

    /// Arm a one-shot timer. Re-arming a timer with the same name
    /// replaces its deadline.
    pub fn start_timer(&mut self, name: &'static str, delay: Duration, handler: TriggerFn<C>) -> Result<()> {
        self.cancel_timer(name);
        let timer = Timer {
            name,
            deadline: Instant::now() + delay,
            handler,
        };
        if self.timers.push(timer).is_err() {
            warn!("Loop: timer table full, '{}' not armed", name);
            return Err(SetupError::TimerTableFull.into());
        }
        debug!("Loop: timer '{}' armed ({} ms)", name, delay.as_millis());
        Ok(())
    }

    /// Disarm a timer. Returns `false` if it was not armed.
    pub fn cancel_timer(&mut self, name: &'static str) -> bool {
        match self.timers.iter().position(|t| t.name == name) {
            Some(i) => {
                self.timers.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Whether a timer with this name is armed.
    pub fn is_armed(&self, name: &'static str) -> bool {
        self.timers.iter().any(|t| t.name == name)
    }

    /// Ask `run()` to return after the current turn.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    fn take_expired(&mut self, now: Instant) -> heapless::Vec<(&'static str, TriggerFn<C>), MAX_TIMERS> {
        let mut expired = heapless::Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].deadline <= now {
                let t = self.timers.swap_remove(i);
                // Capacity matches the timer table.
                let _ = expired.push((t.name, t.handler));
            } else {
                i += 1;
            }
        }
        expired
    }
}

/// The dispatcher. Owns the trigger table, the pending set and the timers;
/// the context it drives is passed in by the caller.
pub struct EventLoop<C> {
    pending: Arc<PendingTriggers>,
    triggers: heapless::Vec<Registration<C>, MAX_TRIGGERS>,
    control: LoopControl<C>,
    idle_wait: Duration,
    dispatched: u64,
}

impl<C: LoopContext> EventLoop<C> {
    pub fn new(idle_wait: Duration) -> Self {
        Self {
            pending: Arc::new(PendingTriggers::new()),
            triggers: heapless::Vec::new(),
            control: LoopControl::new(),
            idle_wait,
            dispatched: 0,
        }
    }

    /// Register a trigger handler and return the handle used to signal it.
    pub fn register_trigger(&mut self, name: &'static str, handler: TriggerFn<C>) -> Result<TriggerHandle> {
        let index = self.triggers.len();
        if self.triggers.push(Registration { name, handler }).is_err() {
            warn!("Loop: cannot register '{}', {} triggers in use", name, MAX_TRIGGERS);
            return Err(SetupError::TriggerTableFull.into());
        }
        debug!("Loop: trigger '{}' registered at slot {}", name, index);
        Ok(TriggerHandle::new(index as u8, name, self.pending.clone()))
    }

    /// Mark a trigger pending (same as [`TriggerHandle::signal`]).
    pub fn signal(&self, handle: &TriggerHandle) {
        handle.signal();
    }

    /// Loop services, for arming timers before `run()`.
    pub fn control(&mut self) -> &mut LoopControl<C> {
        &mut self.control
    }

    /// Total handlers and I/O events dispatched since construction.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// One dispatch turn: triggers, then expired timers, then I/O.
    /// Returns the number of units of work done.
    pub fn run_once(&mut self, ctx: &mut C) -> usize {
        let mut work = 0;

        let bits = self.pending.take();
        if bits != 0 {
            for (i, reg) in self.triggers.iter().enumerate() {
                if bits & (1 << i) != 0 {
                    debug!("Loop: trigger '{}'", reg.name);
                    (reg.handler)(ctx, &mut self.control);
                    work += 1;
                }
            }
        }

        for (name, handler) in self.control.take_expired(Instant::now()) {
            debug!("Loop: timer '{}' expired", name);
            handler(ctx, &mut self.control);
            work += 1;
        }

        work += ctx.poll_io(&mut self.control);

        self.dispatched += work as u64;
        work
    }

    /// Block the calling thread dispatching work until a handler calls
    /// [`LoopControl::stop`].
    pub fn run(&mut self, ctx: &mut C) {
        self.pending.bind_waiter(std::thread::current());
        self.control.stopped = false;
        info!("Loop: running with {} trigger(s)", self.triggers.len());

        while !self.control.stopped {
            let work = self.run_once(ctx);
            if work == 0 && !self.pending.any() {
                let wait = self
                    .control
                    .next_deadline()
                    .map_or(self.idle_wait, |d| {
                        d.saturating_duration_since(Instant::now()).min(self.idle_wait)
                    });
                std::thread::park_timeout(wait);
            }
        }

        info!("Loop: stopped after {} dispatches", self.dispatched);
    }
}
