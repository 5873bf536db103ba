//! External trigger adapter.
//!
//! Registers the orchestrator's entry points with the event loop and
//! maps each dispatched trigger to an [`AppCommand`]. The returned
//! [`Triggers`] handles are what the button driver, a host shell or the
//! boot code signal.
//!
//! ```text
//!  button ISR ──signal_from_isr──┐
//!  shell      ──signal───────────┼──▶ EventLoop ──▶ handler ──▶ SessionService
//!  timer      ──(loop-owned)─────┘
//! ```

use log::{debug, warn};

use crate::app::commands::AppCommand;
use crate::app::ports::{EventSink, IndicatorPort, TransportPort};
use crate::app::service::SessionService;
use crate::error::Result;
use crate::event_loop::{EventLoop, LoopControl};
use crate::events::TriggerHandle;

/// Name of the one-shot timer that ends the announce indicator.
pub const ANNOUNCE_TIMER: &str = "announce-indicator";

type Svc<T, I, S> = SessionService<T, I, S>;

/// Handles for every trigger the orchestrator understands.
#[derive(Debug, Clone)]
pub struct Triggers {
    pub initiate: TriggerHandle,
    pub announce: TriggerHandle,
    pub terminate: TriggerHandle,
}

impl Triggers {
    pub fn register<T, I, S>(ev: &mut EventLoop<Svc<T, I, S>>) -> Result<Self>
    where
        T: TransportPort,
        I: IndicatorPort,
        S: EventSink,
    {
        Ok(Self {
            initiate: ev.register_trigger("initiate", on_initiate::<T, I, S>)?,
            announce: ev.register_trigger("announce", on_announce::<T, I, S>)?,
            terminate: ev.register_trigger("terminate", on_terminate::<T, I, S>)?,
        })
    }
}

fn run<T, I, S>(svc: &mut Svc<T, I, S>, cmd: AppCommand) -> bool
where
    T: TransportPort,
    I: IndicatorPort,
    S: EventSink,
{
    match svc.handle_command(cmd) {
        Ok(()) => true,
        Err(e) => {
            warn!("Trigger: {:?} failed: {} (state {:?})", cmd, e, svc.state());
            false
        }
    }
}

fn on_initiate<T, I, S>(svc: &mut Svc<T, I, S>, _ctl: &mut LoopControl<Svc<T, I, S>>)
where
    T: TransportPort,
    I: IndicatorPort,
    S: EventSink,
{
    run(svc, AppCommand::Initiate);
}

fn on_terminate<T, I, S>(svc: &mut Svc<T, I, S>, _ctl: &mut LoopControl<Svc<T, I, S>>)
where
    T: TransportPort,
    I: IndicatorPort,
    S: EventSink,
{
    run(svc, AppCommand::Terminate);
}

fn on_announce<T, I, S>(svc: &mut Svc<T, I, S>, ctl: &mut LoopControl<Svc<T, I, S>>)
where
    T: TransportPort,
    I: IndicatorPort,
    S: EventSink,
{
    if !run(svc, AppCommand::Announce) {
        ctl.cancel_timer(ANNOUNCE_TIMER);
        return;
    }
    let duration = svc.announce_duration();
    if let Err(e) = ctl.start_timer(ANNOUNCE_TIMER, duration, on_announce_expired::<T, I, S>) {
        warn!("Trigger: announce timer not armed: {}", e);
        run(svc, AppCommand::EndAnnounce);
    } else {
        debug!("Trigger: indicator off in {} s", duration.as_secs());
    }
}

fn on_announce_expired<T, I, S>(svc: &mut Svc<T, I, S>, _ctl: &mut LoopControl<Svc<T, I, S>>)
where
    T: TransportPort,
    I: IndicatorPort,
    S: EventSink,
{
    run(svc, AppCommand::EndAnnounce);
}
