//! Connection runner task
//!
//! One task owns the socket, the decompression context, the heartbeat
//! schedule and every timer for the lifetime of the engine. All transitions
//! are serialized through its `select!` loop, so a close can never race a
//! reconnect timer.

use super::{Command, ConnectionState, GatewayConfig, IdentifyMode};
use crate::backoff::invalid_session_delay;
use crate::compression::ZlibStreamDecompressor;
use crate::credentials::CredentialProvider;
use crate::events::GatewayEvent;
use crate::heartbeat::{BeatAction, Heartbeat};
use crate::protocol::{Envelope, IdentifyPayload, Incoming, ReadyPayload};
use crate::session::SessionTracker;
use crate::transport::{Connector, Frame, Socket};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Dispatch event names the engine itself reacts to
const EVENT_READY: &str = "READY";
const EVENT_RESUMED: &str = "RESUMED";

/// Normal-closure code sent on explicit close
const CLOSE_NORMAL: u16 = 1000;

/// How one connection attempt ended
#[derive(Debug)]
enum Outcome {
    /// Explicit `close()`; stay disconnected until `open()`
    UserClosed,
    /// Engine is shutting down entirely
    Shutdown,
    /// Terminal failure; notify and stay disconnected until `open()`
    AuthFailure(String),
    /// Invalid session; retry after the mandated 1-5 s jitter
    InvalidSession,
    /// Transient drop; consult the reconnect policy
    Dropped { close_code: Option<u16> },
}

/// Decision after waiting out a reconnect delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitDecision {
    Proceed,
    Abort,
    Shutdown,
}

pub(crate) struct Runner {
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<GatewayEvent>,
    state: ConnectionState,
    session: SessionTracker,
    attempts: u32,
    reachable: bool,
}

impl Runner {
    pub(crate) fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<GatewayEvent>,
    ) -> Self {
        Self {
            config,
            connector,
            credentials,
            commands,
            events,
            state: ConnectionState::Disconnected,
            session: SessionTracker::new(),
            attempts: 0,
            reachable: true,
        }
    }

    /// Main loop: idle until `open()`, then run connection attempts until a
    /// terminal outcome sends us back to idle.
    pub(crate) async fn run(mut self) {
        'idle: loop {
            self.set_state(ConnectionState::Disconnected);

            // Wait for an open request
            loop {
                match self.commands.recv().await {
                    Some(Command::Open) => break,
                    Some(Command::Close) => self.session.invalidate(false),
                    Some(Command::Reachability(reachable)) => self.set_reachable(reachable),
                    Some(Command::Send { op, .. }) => {
                        tracing::warn!(%op, "Dropping outgoing payload; engine is disconnected");
                    }
                    Some(Command::Shutdown) | None => return,
                }
            }

            // Connection attempts until user close or a terminal failure
            loop {
                let outcome = self.run_connection().await;
                if !matches!(outcome, Outcome::Shutdown) {
                    // Leave SessionOpen (and notify) before deciding what is next
                    self.set_state(ConnectionState::Disconnected);
                }
                match outcome {
                    Outcome::Shutdown => return,
                    Outcome::UserClosed => continue 'idle,
                    Outcome::AuthFailure(reason) => {
                        tracing::error!(reason = %reason, "Authentication failure; not reconnecting");
                        self.emit(GatewayEvent::AuthFailure { reason });
                        continue 'idle;
                    }
                    Outcome::InvalidSession => {
                        // Server-mandated 1-5 s jitter, bypassing the backoff
                        // controller and its attempt counter.
                        let delay = invalid_session_delay(&mut rand::thread_rng());
                        tracing::info!(delay_ms = delay.as_millis() as u64, "Re-identifying after invalid session");
                        match self.wait_retry(delay).await {
                            WaitDecision::Proceed => {}
                            WaitDecision::Abort => continue 'idle,
                            WaitDecision::Shutdown => return,
                        }
                    }
                    Outcome::Dropped { close_code } => {
                        let attempt = self.attempts;
                        self.attempts = self.attempts.saturating_add(1);

                        let Some(delay) = self.config.reconnect.next_delay(close_code, attempt)
                        else {
                            let reason = match close_code {
                                Some(code) => format!("fatal close code {code}"),
                                None => "reconnect attempts exhausted".to_string(),
                            };
                            tracing::error!(reason = %reason, "Not reconnecting");
                            self.emit(GatewayEvent::AuthFailure { reason });
                            continue 'idle;
                        };

                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            close_code = ?close_code,
                            "Reconnecting after delay"
                        );
                        match self.wait_retry(delay).await {
                            WaitDecision::Proceed => {}
                            WaitDecision::Abort => continue 'idle,
                            WaitDecision::Shutdown => return,
                        }
                    }
                }
            }
        }
    }

    /// Wait out a reconnect delay, still answering commands
    ///
    /// A regained-reachability nudge or an explicit `open()` cancels the
    /// remaining delay and reconnects immediately; `close()` cancels the
    /// attempt outright.
    async fn wait_retry(&mut self, delay: Duration) -> WaitDecision {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Close) => {
                        self.session.invalidate(false);
                        return WaitDecision::Abort;
                    }
                    Some(Command::Open) => return WaitDecision::Proceed,
                    Some(Command::Reachability(reachable)) => {
                        self.set_reachable(reachable);
                        if reachable {
                            return WaitDecision::Proceed;
                        }
                    }
                    Some(Command::Send { op, .. }) => {
                        tracing::warn!(%op, "Dropping outgoing payload; reconnect pending");
                    }
                    Some(Command::Shutdown) | None => return WaitDecision::Shutdown,
                },
                () = &mut sleep => return WaitDecision::Proceed,
            }
        }
    }

    /// One socket attempt, from connect to whatever ends it
    async fn run_connection(&mut self) -> Outcome {
        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "Connecting to gateway");

        let mut socket = match self.connector.connect(&self.config.url).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(error = %e, "Connection attempt failed");
                return Outcome::Dropped { close_code: None };
            }
        };

        // Fresh per-socket state: a new connection can never reuse a partial
        // compressed stream or an old heartbeat schedule.
        let mut decompressor = ZlibStreamDecompressor::new();
        let mut heartbeat: Option<Heartbeat> = None;
        let connect_deadline = Instant::now() + self.config.connect_timeout;

        self.set_state(ConnectionState::AwaitingHello);

        loop {
            let timer_deadline = match &heartbeat {
                Some(hb) => hb.next_deadline(),
                None => connect_deadline,
            };

            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Close) => {
                            self.set_state(ConnectionState::Closing);
                            self.session.invalidate(false);
                            let _ = socket.close(Some(CLOSE_NORMAL)).await;
                            return Outcome::UserClosed;
                        }
                        Some(Command::Shutdown) | None => {
                            let _ = socket.close(Some(CLOSE_NORMAL)).await;
                            return Outcome::Shutdown;
                        }
                        Some(Command::Open) => {
                            // Socket already active
                            tracing::debug!("open() ignored; connection already active");
                        }
                        Some(Command::Reachability(reachable)) => self.set_reachable(reachable),
                        Some(Command::Send { op, data }) => {
                            if self.state == ConnectionState::SessionOpen {
                                let envelope = Envelope::raw(op, data);
                                if let Err(e) = self.send_envelope(socket.as_mut(), &envelope).await {
                                    tracing::warn!(error = %e, "Send failed; dropping connection");
                                    return Outcome::Dropped { close_code: None };
                                }
                            } else {
                                tracing::warn!(
                                    %op,
                                    state = %self.state,
                                    "Dropping outgoing payload; session not open"
                                );
                            }
                        }
                    }
                }

                frame = socket.next_frame() => {
                    match frame {
                        None => {
                            tracing::info!("Socket stream ended");
                            return Outcome::Dropped { close_code: None };
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Socket error");
                            return Outcome::Dropped { close_code: None };
                        }
                        Some(Ok(Frame::Close(code))) => {
                            tracing::info!(close_code = ?code, "Server closed connection");
                            return Outcome::Dropped { close_code: code };
                        }
                        Some(Ok(Frame::Text(text))) => {
                            if let Some(outcome) =
                                self.handle_message(socket.as_mut(), &mut heartbeat, &text).await
                            {
                                return outcome;
                            }
                        }
                        Some(Ok(Frame::Binary(bytes))) => {
                            match decompressor.push(&bytes) {
                                Ok(None) => {}
                                Ok(Some(text)) => {
                                    if let Some(outcome) =
                                        self.handle_message(socket.as_mut(), &mut heartbeat, &text).await
                                    {
                                        return outcome;
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "Compressed stream corrupt; dropping connection");
                                    let _ = socket.close(None).await;
                                    return Outcome::Dropped { close_code: None };
                                }
                            }
                        }
                    }
                }

                () = tokio::time::sleep_until(timer_deadline) => {
                    match heartbeat.as_mut() {
                        None => {
                            tracing::warn!("Timed out waiting for Hello");
                            let _ = socket.close(None).await;
                            return Outcome::Dropped { close_code: None };
                        }
                        Some(hb) => match hb.on_deadline(Instant::now()) {
                            BeatAction::Beat => {
                                let envelope = Envelope::heartbeat(self.session.sequence());
                                if let Err(e) = self.send_envelope(socket.as_mut(), &envelope).await {
                                    tracing::warn!(error = %e, "Heartbeat send failed");
                                    return Outcome::Dropped { close_code: None };
                                }
                            }
                            BeatAction::Timeout => {
                                tracing::warn!("Heartbeat ack overdue; dropping connection");
                                let _ = socket.close(None).await;
                                return Outcome::Dropped { close_code: None };
                            }
                        },
                    }
                }
            }
        }
    }

    /// Handle one decoded text message; `Some` ends the connection
    async fn handle_message(
        &mut self,
        socket: &mut dyn Socket,
        heartbeat: &mut Option<Heartbeat>,
        text: &str,
    ) -> Option<Outcome> {
        let incoming = match Envelope::decode(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                // A single undecodable envelope never kills the stream
                tracing::debug!(error = %e, "Dropping undecodable envelope");
                return None;
            }
        };

        match incoming {
            Incoming::Hello { heartbeat_interval } => {
                let interval = Duration::from_millis(heartbeat_interval);
                tracing::info!(interval_ms = heartbeat_interval, "Hello received");

                // Reaching Hello resets the failure streak
                self.attempts = 0;
                *heartbeat = Some(Heartbeat::start_jittered(interval, Instant::now()));

                let token = match self.credentials.token().await {
                    Ok(token) => token,
                    Err(e) => {
                        let _ = socket.close(Some(CLOSE_NORMAL)).await;
                        return Some(Outcome::AuthFailure(e.to_string()));
                    }
                };

                let envelope = match self.session.try_resume_payload(&token) {
                    Some(resume) => {
                        tracing::info!(
                            session_id = %resume.session_id,
                            seq = resume.seq,
                            "Resuming session"
                        );
                        self.set_state(ConnectionState::Resuming);
                        Envelope::resume(&resume)
                    }
                    None => {
                        tracing::info!("Identifying new session");
                        self.set_state(ConnectionState::Identifying);
                        Envelope::identify(&self.identify_payload(token))
                    }
                };

                if let Err(e) = self.send_envelope(socket, &envelope).await {
                    tracing::warn!(error = %e, "Handshake send failed");
                    return Some(Outcome::Dropped { close_code: None });
                }
                None
            }

            Incoming::Dispatch { event, seq, data } => {
                if let Some(seq) = seq {
                    self.session.record_sequence(seq);
                }

                match event.as_str() {
                    EVENT_READY => {
                        match serde_json::from_value::<ReadyPayload>(data.clone()) {
                            Ok(ready) => {
                                tracing::info!(session_id = %ready.session_id, "Session ready");
                                self.session.mark_ready(ready.session_id);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "READY payload missing session id; resume disabled");
                            }
                        }
                        self.set_state(ConnectionState::SessionOpen);
                    }
                    EVENT_RESUMED => {
                        tracing::info!("Session resumed");
                        self.session.mark_resumed();
                        self.set_state(ConnectionState::SessionOpen);
                    }
                    _ => {}
                }

                self.emit(GatewayEvent::Dispatch { event, data });
                None
            }

            Incoming::Heartbeat => {
                // Immediate out-of-cycle reply; the regular cadence is untouched
                let envelope = Envelope::heartbeat(self.session.sequence());
                if let Err(e) = self.send_envelope(socket, &envelope).await {
                    tracing::warn!(error = %e, "Heartbeat reply failed");
                    return Some(Outcome::Dropped { close_code: None });
                }
                None
            }

            Incoming::HeartbeatAck => {
                if !heartbeat.as_mut().is_some_and(|hb| hb.on_ack()) {
                    tracing::trace!("Heartbeat ack with none pending; ignored");
                }
                None
            }

            Incoming::Reconnect => {
                tracing::info!("Server requested reconnect");
                let _ = socket.close(None).await;
                Some(Outcome::Dropped { close_code: None })
            }

            Incoming::InvalidSession { resumable } => {
                tracing::warn!(resumable, "Session invalidated by server");
                self.session.invalidate(resumable);
                self.emit(GatewayEvent::SessionInvalidated { resumable });
                let _ = socket.close(None).await;
                Some(Outcome::InvalidSession)
            }
        }
    }

    fn identify_payload(&self, token: String) -> IdentifyPayload {
        let (intents, capabilities) = match self.config.identify_mode {
            IdentifyMode::Bot(intents) => (Some(intents), None),
            IdentifyMode::User { capabilities } => (None, Some(capabilities)),
        };
        IdentifyPayload {
            token,
            properties: self.config.properties.clone(),
            compress: Some(self.config.compress),
            intents,
            capabilities,
        }
    }

    async fn send_envelope(
        &self,
        socket: &mut dyn Socket,
        envelope: &Envelope,
    ) -> Result<(), crate::transport::TransportError> {
        let json = envelope
            .to_json()
            .map_err(|e| crate::transport::TransportError::Socket(e.to_string()))?;
        tracing::trace!(op = %envelope.op, "Sending envelope");
        socket.send_text(json).await
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "Connection state changed");

        let was_open = self.state == ConnectionState::SessionOpen;
        self.state = next;
        let is_open = next == ConnectionState::SessionOpen;

        if was_open != is_open {
            self.emit(GatewayEvent::Connectivity {
                session_open: is_open,
                reachable: self.reachable,
            });
        }
    }

    fn set_reachable(&mut self, reachable: bool) {
        if self.reachable == reachable {
            return;
        }
        self.reachable = reachable;
        self.emit(GatewayEvent::Connectivity {
            session_open: self.state == ConnectionState::SessionOpen,
            reachable,
        });
    }

    fn emit(&self, event: GatewayEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
