//! Background task of one poller lifecycle: interval timer, focus listener
//! and staleness tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::{run_fetch, FetchKind, PollerOptions, Shared, STALE_TICK};
use crate::lifecycle::LivenessToken;

pub(super) async fn drive<T>(shared: Arc<Shared<T>>, token: LivenessToken)
where
    T: Clone + Send + Sync + 'static,
{
    let options = shared.options.clone();
    let mut enabled_rx = shared.enabled.subscribe();
    let mut focus_rx = shared.focus.clone();
    let mut enabled = *enabled_rx.borrow_and_update();
    let mut focused = *focus_rx.borrow_and_update();
    let mut focus_open = true;

    let mut poll: Option<Interval> = None;
    rearm(&mut poll, should_poll(&options, enabled, focused), options.interval);

    let mut stale_tick = periodic(STALE_TICK);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = next_poll(&mut poll) => {
                tokio::spawn(run_fetch(Arc::clone(&shared), token.clone(), FetchKind::Revalidate));
            }
            _ = stale_tick.tick() => {
                let interval = options.interval;
                shared.commit_if(&token, |state| state.refresh_staleness(interval));
            }
            changed = enabled_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                enabled = *enabled_rx.borrow_and_update();
                rearm(&mut poll, should_poll(&options, enabled, focused), options.interval);
            }
            changed = focus_rx.changed(), if focus_open => {
                if changed.is_err() {
                    // Signal dropped: keep the last known focus state.
                    focus_open = false;
                    continue;
                }
                let now_focused = *focus_rx.borrow_and_update();
                let regained = now_focused && !focused;
                focused = now_focused;

                if regained && enabled && options.refetch_on_focus {
                    tracing::trace!(poller = %shared.id, "Window focused, revalidating");
                    tokio::spawn(run_fetch(Arc::clone(&shared), token.clone(), FetchKind::Revalidate));
                }
                rearm(&mut poll, should_poll(&options, enabled, focused), options.interval);
            }
        }
    }
}

fn should_poll(options: &PollerOptions, enabled: bool, focused: bool) -> bool {
    enabled && !options.interval.is_zero() && (focused || !options.pause_on_blur)
}

/// Install or tear down the interval timer. A running timer keeps its phase.
fn rearm(poll: &mut Option<Interval>, wanted: bool, period: Duration) {
    match (wanted, poll.is_some()) {
        (true, false) => *poll = Some(periodic(period)),
        (false, true) => *poll = None,
        _ => {}
    }
}

/// Interval whose first tick is one full period away.
fn periodic(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_poll(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
