//! Login runtime: owns the state, runs the reducer and executes its effects.
//!
//! The poll loop, the countdown and the init request all run on their own
//! tasks and report back to the task that drives [`LoginFlow::run`], so state
//! only ever changes there. The init reply comes through a oneshot owned by
//! the current attempt; cancelling the attempt drops it.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use super::{
    api::{ApiError, AuthApi},
    countdown::CountdownTimer,
    machine::{update, AuthStatus, ClientAuthState, Effect, Event, PollOutcome},
    store::{SessionContext, SessionStore},
};
use crate::session::{SessionCookie, DEFAULT_SESSION_TTL_SECONDS};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a login attempt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(SessionContext),
    Failed { timed_out: bool },
}

pub struct LoginFlow {
    api: AuthApi,
    store: Arc<dyn SessionStore>,
    poll_interval: Duration,
    cookie_max_age: i64,
    cookie_secure: bool,
    state: ClientAuthState,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    poller: Option<JoinHandle<()>>,
    init: Option<JoinHandle<()>>,
    init_reply: Option<oneshot::Receiver<Event>>,
    countdown: CountdownTimer,
    token: Option<String>,
    navigation: Option<(&'static str, Duration)>,
}

impl LoginFlow {
    #[must_use]
    pub fn new(api: AuthApi, store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            api,
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cookie_max_age: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: true,
            state: ClientAuthState::default(),
            tx,
            rx,
            poller: None,
            init: None,
            init_reply: None,
            countdown: CountdownTimer::new(),
            token: None,
            navigation: None,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, max_age_seconds: i64, secure: bool) -> Self {
        self.cookie_max_age = max_age_seconds;
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn state(&self) -> &ClientAuthState {
        &self.state
    }

    /// Drive one login attempt to success or failure.
    ///
    /// `observer` sees the state after every change. On success the stored
    /// token is resolved into a [`SessionContext`] through `/api/me`.
    ///
    /// # Errors
    /// Returns an error only if the freshly issued session cannot be resolved.
    pub async fn run<F>(&mut self, mut observer: F) -> Result<LoginOutcome, ApiError>
    where
        F: FnMut(&ClientAuthState),
    {
        self.dispatch(Event::Start);
        observer(&self.state);

        loop {
            let event = tokio::select! {
                Some(event) = self.rx.recv() => event,
                event = next_init_reply(&mut self.init_reply) => event,
                else => break,
            };
            self.dispatch(event);
            observer(&self.state);

            match self.state.status {
                AuthStatus::Success => return self.finish().await,
                AuthStatus::Failed => {
                    return Ok(LoginOutcome::Failed {
                        timed_out: self.state.timed_out,
                    })
                }
                AuthStatus::Pending | AuthStatus::Loading | AuthStatus::QrCode => {}
            }
        }

        Ok(LoginOutcome::Failed { timed_out: false })
    }

    /// Feed one event through the reducer and execute what it asks for.
    pub fn dispatch(&mut self, event: Event) {
        for effect in update(&mut self.state, event) {
            self.execute(effect);
        }
    }

    async fn finish(&mut self) -> Result<LoginOutcome, ApiError> {
        if let Some((path, delay)) = self.navigation.take() {
            sleep(delay).await;
            debug!(path, "navigating");
        }

        let Some(token) = self.token.take() else {
            return Ok(LoginOutcome::Failed { timed_out: false });
        };
        let session = self.api.me(&token).await?;
        info!(subject_id = %session.subject_id, "signed in");
        Ok(LoginOutcome::Success(SessionContext::new(session, token)))
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::RequestInit => self.request_init(),
            Effect::CancelInit => self.cancel_init(),
            Effect::StartPolling { order_ref } => self.start_polling(order_ref),
            Effect::StopPolling => self.stop_polling(),
            Effect::StartCountdown { seconds } => {
                let tick_tx = self.tx.clone();
                let expire_tx = self.tx.clone();
                self.countdown.start(
                    seconds,
                    move |remaining| {
                        let _ = tick_tx.send(Event::CountdownTick { remaining });
                    },
                    move || {
                        let _ = expire_tx.send(Event::CountdownExpired);
                    },
                );
            }
            Effect::CancelCountdown => self.countdown.cancel(),
            Effect::PersistSession { token } => {
                let cookie =
                    SessionCookie::new(token.clone(), self.cookie_max_age, self.cookie_secure);
                if let Err(err) = self.store.save(&cookie) {
                    error!("Failed to persist session cookie: {err}");
                }
                self.token = Some(token);
            }
            Effect::Navigate { path, delay } => self.navigation = Some((path, delay)),
        }
    }

    fn request_init(&mut self) {
        self.cancel_init();

        let api = self.api.clone();
        let (tx, reply) = oneshot::channel();
        self.init_reply = Some(reply);
        self.init = Some(tokio::spawn(async move {
            let event = match api.init().await {
                Ok(response) => Event::InitAuth {
                    order_ref: response.order_ref,
                    auth_countdown: response.auth_countdown,
                },
                Err(err) => {
                    warn!("Failed to start login: {err}");
                    Event::InitFailed
                }
            };
            let _ = tx.send(event);
        }));
    }

    fn cancel_init(&mut self) {
        self.init_reply = None;
        if let Some(init) = self.init.take() {
            init.abort();
        }
    }

    fn start_polling(&mut self, order_ref: String) {
        self.stop_polling();

        let api = self.api.clone();
        let tx = self.tx.clone();
        let period = self.poll_interval;
        debug!(order_ref = %order_ref, "polling started");

        self.poller = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let outcome = match api.poll(&order_ref).await {
                    Ok(result) => PollOutcome::from(result),
                    // Transport errors are retried on the next tick.
                    Err(ApiError::Http(err)) => {
                        warn!(order_ref = %order_ref, "poll request failed: {err}");
                        continue;
                    }
                    Err(err) => {
                        warn!(order_ref = %order_ref, "poll rejected: {err}");
                        PollOutcome::Failed
                    }
                };
                let event = Event::Poll {
                    order_ref: order_ref.clone(),
                    outcome,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

// Pending forever when no init is in flight. A sender dropped without a reply
// means the init task died.
async fn next_init_reply(reply: &mut Option<oneshot::Receiver<Event>>) -> Event {
    let event = match reply.as_mut() {
        Some(receiver) => receiver.await.unwrap_or(Event::InitFailed),
        None => std::future::pending().await,
    };
    *reply = None;
    event
}

impl Drop for LoginFlow {
    fn drop(&mut self) {
        self.stop_polling();
        self.cancel_init();
    }
}
