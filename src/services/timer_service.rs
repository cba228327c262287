use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    services::{trivia_service, ws_events},
    state::{
        RoomHandle, SharedState,
        room::{Room, RoomMode},
    },
};

/// Start (or cleanly restart) the study/break countdown. Host only; requests
/// from anyone else are silently ignored.
pub async fn start_timer(state: &SharedState, handle: &Arc<RoomHandle>, requester: Uuid) {
    let mut room = handle.lock().await;
    if room.host_id != requester {
        debug!(code = handle.code(), requester = %requester, "start ignored: not host");
        return;
    }
    start_locked(state, handle, &mut room);
}

/// Stop the countdown, preserving the remaining time exactly. Host only.
pub async fn pause_timer(handle: &Arc<RoomHandle>, requester: Uuid) {
    let mut room = handle.lock().await;
    if room.host_id != requester {
        debug!(code = handle.code(), requester = %requester, "pause ignored: not host");
        return;
    }
    if !room.timer.running {
        return;
    }

    if let Some(ticker) = room.tasks.phase_ticker.take() {
        ticker.abort();
    }
    // Break time is tracked against a wall-clock deadline, so pausing must
    // snapshot `deadline - now` instead of trusting the last tick value.
    if let Some(remaining) = room.timer.secs_until_break_deadline(Instant::now()) {
        room.timer.remaining_secs = remaining;
    }
    room.timer.break_deadline = None;
    room.timer.running = false;
    ws_events::broadcast_phase_tick(handle, room.mode, room.timer.remaining_secs, false);
}

/// Immediately force the mode transition that would occur at zero. Host only.
pub async fn skip_timer(state: &SharedState, handle: &Arc<RoomHandle>, requester: Uuid) {
    let mut room = handle.lock().await;
    if room.host_id != requester {
        debug!(code = handle.code(), requester = %requester, "skip ignored: not host");
        return;
    }
    complete_phase(state, handle, &mut room);
}

/// Begin the countdown for the current mode with the room lock held.
pub(crate) fn start_locked(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    if room.timer.remaining_secs == 0 {
        room.timer.remaining_secs = room.settings.duration_for(room.mode);
    }

    // Restart cleanly rather than stacking two countdowns.
    if let Some(ticker) = room.tasks.phase_ticker.take() {
        ticker.abort();
    }

    // Break mode counts against an absolute deadline, recomputed on every
    // start, so drift across many 1-second ticks does not accumulate.
    room.timer.break_deadline = match room.mode {
        RoomMode::Break => {
            Some(Instant::now() + Duration::from_secs(u64::from(room.timer.remaining_secs)))
        }
        RoomMode::Study => None,
    };
    room.timer.running = true;

    ws_events::broadcast_phase_tick(handle, room.mode, room.timer.remaining_secs, true);
    room.tasks.phase_ticker = Some(spawn_phase_ticker(state.clone(), handle.code().to_string()));
}

/// Flip the room to the other mode, restart the countdown, and hand control
/// to (or reclaim it from) the trivia session controller.
pub(crate) fn complete_phase(state: &SharedState, handle: &Arc<RoomHandle>, room: &mut Room) {
    if let Some(ticker) = room.tasks.phase_ticker.take() {
        ticker.abort();
    }

    let next = room.mode.flipped();
    room.mode = next;
    room.timer.remaining_secs = room.settings.duration_for(next);
    room.timer.break_deadline = match next {
        RoomMode::Break => {
            Some(Instant::now() + Duration::from_secs(u64::from(room.timer.remaining_secs)))
        }
        RoomMode::Study => None,
    };
    room.timer.running = true;

    ws_events::broadcast_phase_changed(handle, next, room.timer.remaining_secs);
    room.tasks.phase_ticker = Some(spawn_phase_ticker(state.clone(), handle.code().to_string()));

    match next {
        RoomMode::Break => trivia_service::start_session(state, handle, room),
        RoomMode::Study => trivia_service::end_session(handle, room),
    }
}

/// 1 Hz countdown driving a room's study/break phase. Each tick re-acquires
/// the room's lock, so ticks serialize with participant actions and trivia
/// timers. The task exits once the room is gone or the timer stops.
fn spawn_phase_ticker(state: SharedState, code: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(handle) = state.room(&code) else {
                break;
            };
            let mut room = handle.lock().await;
            if !room.timer.running {
                break;
            }

            let remaining = match room.timer.secs_until_break_deadline(Instant::now()) {
                Some(secs) => secs,
                None => room.timer.remaining_secs.saturating_sub(1),
            };
            room.timer.remaining_secs = remaining;
            ws_events::broadcast_phase_tick(&handle, room.mode, remaining, true);

            if remaining == 0 {
                complete_phase(&state, &handle, &mut room);
                break;
            }
        }
    })
}
