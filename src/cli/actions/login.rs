use crate::{
    client::{
        format_countdown, AuthApi, AuthStatus, ClientAuthState, FileSessionStore, LoginFlow,
        LoginOutcome, MemorySessionStore, SessionStore,
    },
    session::DEFAULT_SESSION_TTL_SECONDS,
};
use anyhow::{anyhow, Context, Result};
use std::{path::PathBuf, sync::Arc};

#[derive(Debug)]
pub struct Args {
    pub url: String,
    pub session_file: Option<PathBuf>,
}

/// Run one login against a server and report the signed-in subject.
/// # Errors
/// Returns an error if the server URL is invalid or the login does not succeed.
pub async fn execute(args: Args) -> Result<()> {
    let api =
        AuthApi::new(&args.url).with_context(|| format!("Invalid server URL: {}", args.url))?;

    let store: Arc<dyn SessionStore> = match &args.session_file {
        Some(path) => Arc::new(FileSessionStore::new(path.clone())),
        None => Arc::new(MemorySessionStore::new()),
    };

    // Plain http only makes sense against a local server; keep the cookie usable there.
    let secure = api.base_url().scheme() == "https";
    let mut flow = LoginFlow::new(api, store).with_cookie(DEFAULT_SESSION_TTL_SECONDS, secure);

    let mut printer = Printer::default();
    let outcome = flow
        .run(|state| printer.show(state))
        .await
        .context("Failed to resolve the new session")?;

    match outcome {
        LoginOutcome::Success(context) => {
            println!("Signed in as {}", context.subject_id());
            if let Some(path) = &args.session_file {
                println!("Session cookie written to {}", path.display());
            }
            Ok(())
        }
        LoginOutcome::Failed { timed_out } => {
            let message = ClientAuthState {
                status: AuthStatus::Failed,
                timed_out,
                ..ClientAuthState::default()
            }
            .failure_message()
            .unwrap_or("Login failed");
            Err(anyhow!(message))
        }
    }
}

/// Prints what changed since the last state, not every tick.
#[derive(Default)]
struct Printer {
    qr_code: Option<String>,
    extend_hinted: bool,
}

impl Printer {
    fn show(&mut self, state: &ClientAuthState) {
        if state.status == AuthStatus::QrCode && state.qr_code != self.qr_code {
            if let Some(qr_code) = &state.qr_code {
                println!(
                    "Scan with the identity app [{}]: {qr_code}",
                    format_countdown(state.countdown)
                );
            }
            self.qr_code.clone_from(&state.qr_code);
        }

        if state.can_extend() && !self.extend_hinted {
            println!(
                "{} left. Run the login again for more time.",
                format_countdown(state.countdown)
            );
            self.extend_hinted = true;
        }
    }
}
