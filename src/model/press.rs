//! Tap-versus-hold detection for the combined switch hotkey.
//!
//! The machine never touches a clock or a timer itself. It is told when a
//! press, release or timer expiry happens and answers with what the owner
//! should do with its single long-press timer.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Identifies one arming of the long-press timer. Expiries carrying any other
/// token are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimerToken(u64);

impl TimerToken {
    fn next(self) -> Self { TimerToken(self.0.wrapping_add(1)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Idle,
    Timing { pressed_at: Instant, token: TimerToken },
    /// The long-press action already ran; the matching release does nothing.
    Consumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressAction {
    /// Released before the threshold.
    Tap,
    /// Held past the threshold.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Keep,
    Arm { token: TimerToken, deadline: Instant },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressResponse {
    pub timer: TimerRequest,
    pub action: Option<PressAction>,
}

impl PressResponse {
    const NOTHING: PressResponse = PressResponse { timer: TimerRequest::Keep, action: None };
}

#[derive(Debug)]
pub struct PressMachine {
    state: PressState,
    threshold: Duration,
    last_token: TimerToken,
}

impl PressMachine {
    pub fn new(threshold: Duration) -> Self {
        Self {
            state: PressState::Idle,
            threshold,
            last_token: TimerToken::default(),
        }
    }

    pub fn state(&self) -> PressState { self.state }

    pub fn threshold(&self) -> Duration { self.threshold }

    pub fn on_press(&mut self, now: Instant) -> PressResponse {
        // A press while already timing (e.g. a missed release) restarts the hold.
        let token = self.next_token();
        self.state = PressState::Timing { pressed_at: now, token };
        trace!(?token, "press armed long-press timer");
        PressResponse {
            timer: TimerRequest::Arm { token, deadline: now + self.threshold },
            action: None,
        }
    }

    pub fn on_release(&mut self) -> PressResponse {
        match std::mem::replace(&mut self.state, PressState::Idle) {
            PressState::Timing { .. } => PressResponse {
                timer: TimerRequest::Cancel,
                action: Some(PressAction::Tap),
            },
            PressState::Consumed => {
                trace!("release after long press consumed the action");
                PressResponse { timer: TimerRequest::Cancel, action: None }
            }
            PressState::Idle => PressResponse { timer: TimerRequest::Cancel, action: None },
        }
    }

    pub fn on_timer(&mut self, fired: TimerToken) -> Option<PressAction> {
        match self.state {
            PressState::Timing { token, .. } if token == fired => {
                self.state = PressState::Consumed;
                Some(PressAction::Hold)
            }
            _ => {
                trace!(?fired, "ignoring stale long-press expiry");
                None
            }
        }
    }

    /// Changes the threshold. A press in progress is re-armed against its
    /// original press time with a fresh token, which retires the old arming.
    pub fn set_threshold(&mut self, threshold: Duration) -> PressResponse {
        self.threshold = threshold;
        let PressState::Timing { pressed_at, .. } = self.state else {
            return PressResponse::NOTHING;
        };
        let token = self.next_token();
        self.state = PressState::Timing { pressed_at, token };
        PressResponse {
            timer: TimerRequest::Arm { token, deadline: pressed_at + threshold },
            action: None,
        }
    }

    /// Forgets any press in flight without performing its action.
    pub fn reset(&mut self) -> PressResponse {
        if self.state == PressState::Idle {
            return PressResponse::NOTHING;
        }
        self.state = PressState::Idle;
        PressResponse { timer: TimerRequest::Cancel, action: None }
    }

    fn next_token(&mut self) -> TimerToken {
        self.last_token = self.last_token.next();
        self.last_token
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(300);

    fn armed_token(response: PressResponse) -> TimerToken {
        match response.timer {
            TimerRequest::Arm { token, .. } => token,
            other => panic!("expected an armed timer, got {other:?}"),
        }
    }

    #[test]
    fn tap_performs_action_on_release() {
        let mut machine = PressMachine::new(THRESHOLD);
        let now = Instant::now();
        let press = machine.on_press(now);
        assert_eq!(press.timer, TimerRequest::Arm {
            token: armed_token(press),
            deadline: now + THRESHOLD,
        });
        assert_eq!(press.action, None);

        let release = machine.on_release();
        assert_eq!(release, PressResponse {
            timer: TimerRequest::Cancel,
            action: Some(PressAction::Tap),
        });
        assert_eq!(machine.state(), PressState::Idle);
    }

    #[test]
    fn hold_consumes_the_release() {
        let mut machine = PressMachine::new(THRESHOLD);
        let token = armed_token(machine.on_press(Instant::now()));
        assert_eq!(machine.on_timer(token), Some(PressAction::Hold));
        assert_eq!(machine.state(), PressState::Consumed);
        assert_eq!(machine.on_release().action, None);
        assert_eq!(machine.state(), PressState::Idle);
    }

    #[test]
    fn rearming_mid_press_fires_once() {
        let mut machine = PressMachine::new(THRESHOLD);
        let pressed_at = Instant::now();
        let old = armed_token(machine.on_press(pressed_at));

        let rearm = machine.set_threshold(Duration::from_millis(800));
        let new = armed_token(rearm);
        assert_ne!(old, new);
        assert_eq!(rearm.timer, TimerRequest::Arm {
            token: new,
            deadline: pressed_at + Duration::from_millis(800),
        });

        assert_eq!(machine.on_timer(old), None);
        assert_eq!(machine.on_timer(new), Some(PressAction::Hold));
        assert_eq!(machine.on_timer(new), None);
        assert_eq!(machine.on_release().action, None);
    }

    #[test]
    fn new_press_resets_consumed_flag() {
        let mut machine = PressMachine::new(THRESHOLD);
        let token = armed_token(machine.on_press(Instant::now()));
        machine.on_timer(token);

        // Release was lost; the next press starts over.
        let token = armed_token(machine.on_press(Instant::now()));
        assert!(matches!(machine.state(), PressState::Timing { .. }));
        assert_eq!(machine.on_release().action, Some(PressAction::Tap));
        assert_eq!(machine.on_timer(token), None);
    }

    #[test]
    fn threshold_change_while_idle_only_updates_value() {
        let mut machine = PressMachine::new(THRESHOLD);
        let response = machine.set_threshold(Duration::from_secs(1));
        assert_eq!(response.timer, TimerRequest::Keep);
        assert_eq!(machine.threshold(), Duration::from_secs(1));
    }

    #[test]
    fn reset_cancels_in_flight_press() {
        let mut machine = PressMachine::new(THRESHOLD);
        let token = armed_token(machine.on_press(Instant::now()));
        assert_eq!(machine.reset().timer, TimerRequest::Cancel);
        assert_eq!(machine.on_timer(token), None);
        assert_eq!(machine.on_release().action, None);
    }
}
