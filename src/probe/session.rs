//! The per-source probe session.
//!
//! A session walks `Connecting -> Authenticating -> Probing(0..n) -> Closing`
//! and drops to `Failed` on a timeout or a hang-up before the shell is
//! ready.  [`ProbeSession::handle`] is the pure transition function; [`drive`]
//! performs the I/O that belongs to each state and feeds the outcome back
//! as a [`Trigger`].

use std::fmt;

use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};

use super::expect::{Expect, ExpectError};
use super::PacketLoss;
use crate::config::ProbeConfig;

lazy_static! {
    static ref PASSWORD_PROMPT: Regex = Regex::new(r"[Pp]assword:").unwrap();
    static ref SHELL_PROMPT: Regex = Regex::new(r"\$ ").unwrap();
    static ref PACKET_LOSS: Regex = Regex::new(r"(\d+(?:\.\d+)?)% packet loss").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    Spawn(String),
    PasswordPromptTimeout,
    ShellPromptTimeout,
    ConnectionClosed,
    Io(String),
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::Spawn(e) => write!(f, "cannot start ssh: {}", e),
            SessionFailure::PasswordPromptTimeout => f.write_str("no password prompt"),
            SessionFailure::ShellPromptTimeout => f.write_str("no shell prompt after login"),
            SessionFailure::ConnectionClosed => f.write_str("connection closed"),
            SessionFailure::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Connecting,
    Authenticating,
    /// Waiting for the ping summary of destination `i`.
    Probing(usize),
    Closing,
    Failed(SessionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    PromptMatched,
    PatternMatched(PacketLoss),
    Timeout,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResult {
    pub destination: String,
    pub loss: PacketLoss,
}

impl PingResult {
    pub fn is_success(&self) -> bool {
        self.loss.is_success()
    }
}

pub struct ProbeSession<'a> {
    source: &'a str,
    destinations: &'a [String],
    state: State,
    results: Vec<PingResult>,
}

impl<'a> ProbeSession<'a> {
    pub fn new(source: &'a str, destinations: &'a [String]) -> Self {
        Self {
            source,
            destinations,
            state: State::Connecting,
            results: Vec::with_capacity(destinations.len()),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn results(&self) -> &[PingResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PingResult> {
        self.results
    }

    pub fn handle(&mut self, trigger: Trigger) {
        let next = match (&self.state, trigger) {
            (State::Connecting, Trigger::PromptMatched) => State::Authenticating,
            (State::Connecting, Trigger::Timeout) => {
                State::Failed(SessionFailure::PasswordPromptTimeout)
            }
            (State::Authenticating, Trigger::PromptMatched) => self.probe_from(0),
            (State::Authenticating, Trigger::Timeout) => {
                State::Failed(SessionFailure::ShellPromptTimeout)
            }
            (State::Probing(i), Trigger::PatternMatched(loss)) => {
                let i = *i;
                self.record(i, loss);
                self.probe_from(i + 1)
            }
            (State::Probing(i), Trigger::Timeout) => {
                let i = *i;
                self.record(i, PacketLoss::Indeterminate);
                self.probe_from(i + 1)
            }
            (State::Probing(i), Trigger::Eof) => {
                for i in *i..self.destinations.len() {
                    self.record(i, PacketLoss::Indeterminate);
                }
                State::Failed(SessionFailure::ConnectionClosed)
            }
            (State::Connecting | State::Authenticating, Trigger::Eof) => {
                State::Failed(SessionFailure::ConnectionClosed)
            }
            (state, trigger) => {
                warn!("Ignoring {:?} in state {:?}", trigger, state);
                state.clone()
            }
        };
        self.state = next;
    }

    /// Fail outright, e.g. when the transport breaks while writing.
    pub fn fail(&mut self, failure: SessionFailure) {
        self.state = State::Failed(failure);
    }

    fn probe_from(&self, i: usize) -> State {
        if i < self.destinations.len() {
            State::Probing(i)
        } else {
            State::Closing
        }
    }

    fn record(&mut self, i: usize, loss: PacketLoss) {
        let destination = self.destinations[i].clone();
        if loss.is_success() {
            info!(
                "Check connectivity from {} to {} successful.",
                self.source, destination
            );
        } else {
            error!(
                "Check connectivity from {} to {} failed! {}% packet loss",
                self.source,
                destination,
                loss.percent()
            );
        }
        self.results.push(PingResult { destination, loss });
    }
}

fn trigger_from(result: Result<(), ExpectError>) -> Trigger {
    match result {
        Ok(()) => Trigger::PromptMatched,
        Err(ExpectError::Timeout) => Trigger::Timeout,
        Err(ExpectError::Eof) => Trigger::Eof,
        Err(ExpectError::Io(e)) => {
            debug!("Session read failed: {}", e);
            Trigger::Eof
        }
    }
}

/// Run `session` to completion over `io`.  Returns once the session is
/// `Closing` or `Failed` and `exit` was sent; the caller owns the
/// transport teardown.
pub async fn drive<T>(
    session: &mut ProbeSession<'_>,
    io: &mut Expect<T>,
    settings: &ProbeConfig,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let sent = match session.state().clone() {
            State::Connecting => {
                let seen = io.expect(&PASSWORD_PROMPT, settings.prompt_timeout()).await;
                session.handle(trigger_from(seen.map(|_| ())));
                match session.state() {
                    State::Authenticating => io.send_line(&settings.vm_password).await,
                    _ => Ok(()),
                }
            }
            State::Authenticating => {
                let seen = io.expect(&SHELL_PROMPT, settings.prompt_timeout()).await;
                session.handle(trigger_from(seen.map(|_| ())));
                send_next(session, io, settings).await
            }
            State::Probing(_) => {
                let trigger = match io.expect(&PACKET_LOSS, settings.output_timeout()).await {
                    Ok(found) => Trigger::PatternMatched(PacketLoss::from_match(found.group(1))),
                    Err(e) => trigger_from(Err(e)),
                };
                session.handle(trigger);
                send_next(session, io, settings).await
            }
            State::Closing | State::Failed(_) => {
                // Best effort; the process is torn down either way.
                if let Err(e) = io.send_line("exit").await {
                    debug!("Could not send exit to {}: {}", session.source, e);
                }
                return;
            }
        };

        if let Err(e) = sent {
            session.fail(SessionFailure::Io(e.to_string()));
        }
    }
}

/// Issue the command that the freshly entered state waits on.
async fn send_next<T>(
    session: &ProbeSession<'_>,
    io: &mut Expect<T>,
    settings: &ProbeConfig,
) -> std::io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match session.state() {
        State::Probing(i) => {
            let command = ping_command(&session.destinations[*i], settings);
            debug!("{}: {}", session.source, command);
            io.clear();
            io.send_line(&command).await
        }
        _ => Ok(()),
    }
}

pub fn ping_command(destination: &str, settings: &ProbeConfig) -> String {
    format!(
        "ping -c {} -W {} {}",
        settings.ping_count, settings.ping_timeout_secs, destination
    )
}
