//! Login state machine.
//!
//! All state changes happen in [`update`]. The runtime feeds it events (init
//! results, poll results, timer ticks, user intent) and executes the effects
//! it returns. The reducer never performs I/O.

use std::time::Duration;

/// Remaining seconds at or below which the user may ask for more time.
pub const EXTEND_THRESHOLD_SECONDS: u64 = 30;

/// Delay between a successful login and navigating away.
pub const NAVIGATE_DELAY: Duration = Duration::from_millis(300);

pub const LANDING_PATH: &str = "/";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Pending,
    Loading,
    QrCode,
    Success,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientAuthState {
    pub status: AuthStatus,
    pub qr_code: Option<String>,
    pub order_ref: Option<String>,
    pub countdown: u64,
    /// The last failure came from the countdown running out.
    pub timed_out: bool,
}

impl ClientAuthState {
    /// A poll loop should be running for this state.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.order_ref.is_some() && matches!(self.status, AuthStatus::Loading | AuthStatus::QrCode)
    }

    #[must_use]
    pub fn can_extend(&self) -> bool {
        self.status == AuthStatus::QrCode && self.countdown <= EXTEND_THRESHOLD_SECONDS
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&'static str> {
        match (self.status, self.timed_out) {
            (AuthStatus::Failed, true) => Some("Time expired. Start a new login to try again."),
            (AuthStatus::Failed, false) => Some("Something went wrong. Please try again."),
            _ => None,
        }
    }

    fn clear_transient(&mut self) {
        self.qr_code = None;
        self.order_ref = None;
        self.countdown = 0;
    }
}

/// Normalized answer to one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    QrCode { qr_code: String },
    NewOrderRef { order_ref: String, qr_code: String },
    Complete { token: String },
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// User asks to log in, retries, or extends the window.
    Start,
    /// Init answered with a fresh order.
    InitAuth { order_ref: String, auth_countdown: u64 },
    InitFailed,
    /// A poll for `order_ref` answered.
    Poll {
        order_ref: String,
        outcome: PollOutcome,
    },
    CountdownTick { remaining: u64 },
    CountdownExpired,
    Reset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    RequestInit,
    /// Drop any init request still in flight; its reply must not arrive.
    CancelInit,
    /// Poll `order_ref` once per interval, replacing any running loop.
    StartPolling { order_ref: String },
    StopPolling,
    /// Restart the countdown from `seconds`.
    StartCountdown { seconds: u64 },
    CancelCountdown,
    PersistSession { token: String },
    Navigate {
        path: &'static str,
        delay: Duration,
    },
}

pub fn update(state: &mut ClientAuthState, event: Event) -> Vec<Effect> {
    match event {
        Event::Start => {
            *state = ClientAuthState {
                status: AuthStatus::Loading,
                ..ClientAuthState::default()
            };
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::CancelInit,
                Effect::RequestInit,
            ]
        }
        // Accepted in every state. `CancelInit` drops replies to abandoned
        // attempts before they get here.
        Event::InitAuth {
            order_ref,
            auth_countdown,
        } => {
            *state = ClientAuthState {
                status: AuthStatus::Loading,
                qr_code: None,
                order_ref: Some(order_ref.clone()),
                countdown: auth_countdown,
                timed_out: false,
            };
            vec![
                Effect::StopPolling,
                Effect::StartCountdown {
                    seconds: auth_countdown,
                },
                Effect::StartPolling { order_ref },
            ]
        }
        Event::InitFailed => {
            // Only the init we are waiting for may fail the attempt.
            if state.status != AuthStatus::Loading || state.order_ref.is_some() {
                return vec![];
            }
            fail(state, false)
        }
        Event::Poll { order_ref, outcome } => {
            if state.order_ref.as_deref() != Some(order_ref.as_str()) {
                return vec![];
            }
            handle_poll(state, outcome)
        }
        Event::CountdownTick { remaining } => {
            if state.is_polling() {
                state.countdown = remaining;
            }
            vec![]
        }
        Event::CountdownExpired => {
            if !state.is_polling() {
                return vec![];
            }
            fail(state, true)
        }
        Event::Reset => {
            *state = ClientAuthState::default();
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::CancelInit,
            ]
        }
    }
}

fn handle_poll(state: &mut ClientAuthState, outcome: PollOutcome) -> Vec<Effect> {
    match outcome {
        PollOutcome::NewOrderRef { order_ref, qr_code } => {
            if !state.is_polling() {
                return vec![];
            }
            state.status = AuthStatus::QrCode;
            state.qr_code = Some(qr_code);
            state.order_ref = Some(order_ref.clone());
            vec![Effect::StartPolling { order_ref }]
        }
        PollOutcome::QrCode { qr_code } => {
            if !state.is_polling() {
                return vec![];
            }
            state.status = AuthStatus::QrCode;
            state.qr_code = Some(qr_code);
            vec![]
        }
        PollOutcome::Failed => fail(state, false),
        PollOutcome::Complete { token } => {
            state.status = AuthStatus::Success;
            state.timed_out = false;
            state.clear_transient();
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::PersistSession { token },
                Effect::Navigate {
                    path: LANDING_PATH,
                    delay: NAVIGATE_DELAY,
                },
            ]
        }
    }
}

fn fail(state: &mut ClientAuthState, timed_out: bool) -> Vec<Effect> {
    state.status = AuthStatus::Failed;
    state.timed_out = timed_out;
    state.clear_transient();
    vec![Effect::StopPolling, Effect::CancelCountdown]
}

/// `m:ss` from one minute up, `Ns` below.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    if seconds >= 60 {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(state: &mut ClientAuthState, order_ref: &str, seconds: u64) -> Vec<Effect> {
        update(
            state,
            Event::InitAuth {
                order_ref: order_ref.to_string(),
                auth_countdown: seconds,
            },
        )
    }

    fn poll(order_ref: &str, outcome: PollOutcome) -> Event {
        Event::Poll {
            order_ref: order_ref.to_string(),
            outcome,
        }
    }

    fn qr(code: &str) -> PollOutcome {
        PollOutcome::QrCode {
            qr_code: code.to_string(),
        }
    }

    #[test]
    fn init_auth_from_any_state_loads_with_full_countdown() {
        let starting_states = [
            ClientAuthState::default(),
            ClientAuthState {
                status: AuthStatus::Failed,
                timed_out: true,
                ..ClientAuthState::default()
            },
            ClientAuthState {
                status: AuthStatus::QrCode,
                qr_code: Some("old".to_string()),
                order_ref: Some("R0".to_string()),
                countdown: 12,
                timed_out: false,
            },
        ];

        for mut state in starting_states {
            let effects = init(&mut state, "R1", 300);
            assert_eq!(state.status, AuthStatus::Loading);
            assert_eq!(state.order_ref.as_deref(), Some("R1"));
            assert_eq!(state.countdown, 300);
            assert_eq!(state.qr_code, None);
            assert!(effects.contains(&Effect::StartCountdown { seconds: 300 }));
            assert!(effects.contains(&Effect::StartPolling {
                order_ref: "R1".to_string()
            }));
        }
    }

    #[test]
    fn complete_clears_state_and_persists_token() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);

        let effects = update(
            &mut state,
            poll(
                "R1",
                PollOutcome::Complete {
                    token: "tok".to_string(),
                },
            ),
        );

        assert_eq!(
            state,
            ClientAuthState {
                status: AuthStatus::Success,
                qr_code: None,
                order_ref: None,
                countdown: 0,
                timed_out: false,
            }
        );
        assert_eq!(
            effects,
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::PersistSession {
                    token: "tok".to_string()
                },
                Effect::Navigate {
                    path: "/",
                    delay: NAVIGATE_DELAY
                },
            ]
        );
    }

    #[test]
    fn qr_code_keeps_order_ref() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);

        let effects = update(&mut state, poll("R1", qr("qr-1")));
        assert!(effects.is_empty());
        assert_eq!(state.status, AuthStatus::QrCode);
        assert_eq!(state.qr_code.as_deref(), Some("qr-1"));
        assert_eq!(state.order_ref.as_deref(), Some("R1"));

        update(&mut state, poll("R1", qr("qr-2")));
        assert_eq!(state.qr_code.as_deref(), Some("qr-2"));
    }

    #[test]
    fn new_order_ref_retargets_polling() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);
        update(&mut state, poll("R1", qr("qr-1")));

        let effects = update(
            &mut state,
            poll(
                "R1",
                PollOutcome::NewOrderRef {
                    order_ref: "R2".to_string(),
                    qr_code: "qr-r2".to_string(),
                },
            ),
        );
        assert_eq!(
            effects,
            vec![Effect::StartPolling {
                order_ref: "R2".to_string()
            }]
        );
        assert_eq!(state.order_ref.as_deref(), Some("R2"));
        assert_eq!(state.qr_code.as_deref(), Some("qr-r2"));

        // Late answers for the old reference are dropped.
        assert!(update(&mut state, poll("R1", PollOutcome::Failed)).is_empty());
        assert_eq!(state.status, AuthStatus::QrCode);
    }

    #[test]
    fn failed_poll_fails_without_timeout_flag() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);

        let effects = update(&mut state, poll("R1", PollOutcome::Failed));
        assert_eq!(effects, vec![Effect::StopPolling, Effect::CancelCountdown]);
        assert_eq!(state.status, AuthStatus::Failed);
        assert_eq!(state.order_ref, None);
        assert!(!state.timed_out);
        assert_eq!(
            state.failure_message(),
            Some("Something went wrong. Please try again.")
        );
    }

    #[test]
    fn countdown_expiry_fails_with_timeout_flag() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 3);
        update(&mut state, poll("R1", qr("qr-1")));
        update(&mut state, Event::CountdownTick { remaining: 0 });

        let effects = update(&mut state, Event::CountdownExpired);
        assert_eq!(effects, vec![Effect::StopPolling, Effect::CancelCountdown]);
        assert_eq!(state.status, AuthStatus::Failed);
        assert!(state.timed_out);
        assert_eq!(
            state.failure_message(),
            Some("Time expired. Start a new login to try again.")
        );

        // A second expiry is a no-op.
        assert!(update(&mut state, Event::CountdownExpired).is_empty());
    }

    #[test]
    fn ticks_only_apply_while_polling() {
        let mut state = ClientAuthState::default();
        update(&mut state, Event::CountdownTick { remaining: 10 });
        assert_eq!(state.countdown, 0);

        init(&mut state, "R1", 300);
        update(&mut state, Event::CountdownTick { remaining: 299 });
        assert_eq!(state.countdown, 299);
    }

    #[test]
    fn start_and_retry_request_a_fresh_init() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);
        update(&mut state, poll("R1", PollOutcome::Failed));

        let effects = update(&mut state, Event::Start);
        assert_eq!(
            effects,
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::CancelInit,
                Effect::RequestInit
            ]
        );
        assert_eq!(state.status, AuthStatus::Loading);
        assert_eq!(state.order_ref, None);
        assert!(state.failure_message().is_none());

        let effects = init(&mut state, "R9", 300);
        assert!(effects.contains(&Effect::StartCountdown { seconds: 300 }));
        assert_eq!(state.order_ref.as_deref(), Some("R9"));
    }

    #[test]
    fn init_failure_only_fails_a_pending_init() {
        let mut state = ClientAuthState::default();
        assert!(update(&mut state, Event::InitFailed).is_empty());
        assert_eq!(state.status, AuthStatus::Pending);

        update(&mut state, Event::Start);
        update(&mut state, Event::InitFailed);
        assert_eq!(state.status, AuthStatus::Failed);
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);
        update(&mut state, poll("R1", qr("qr-1")));

        let effects = update(&mut state, Event::Reset);
        assert_eq!(
            effects,
            vec![
                Effect::StopPolling,
                Effect::CancelCountdown,
                Effect::CancelInit
            ]
        );
        assert_eq!(state, ClientAuthState::default());

        // Polls after a reset no longer match any order.
        assert!(update(&mut state, poll("R1", qr("qr-2"))).is_empty());
    }

    #[test]
    fn reset_while_loading_cancels_the_init_request() {
        let mut state = ClientAuthState::default();
        let effects = update(&mut state, Event::Start);
        assert!(effects.contains(&Effect::RequestInit));

        let effects = update(&mut state, Event::Reset);
        assert!(effects.contains(&Effect::CancelInit));
        assert!(!effects.contains(&Effect::RequestInit));
        assert_eq!(state, ClientAuthState::default());
        assert!(!state.is_polling());
    }

    #[test]
    fn extend_is_offered_near_the_end() {
        let mut state = ClientAuthState::default();
        init(&mut state, "R1", 300);
        update(&mut state, poll("R1", qr("qr-1")));
        assert!(!state.can_extend());

        update(&mut state, Event::CountdownTick { remaining: 30 });
        assert!(state.can_extend());
    }

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(300), "5:00");
        assert_eq!(format_countdown(61), "1:01");
        assert_eq!(format_countdown(60), "1:00");
        assert_eq!(format_countdown(59), "59s");
        assert_eq!(format_countdown(0), "0s");
    }
}
