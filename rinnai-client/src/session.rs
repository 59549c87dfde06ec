//! Session orchestration and the command queue
//!
//! A [`Session`] is the top-level handle collaborators interact with.
//! All work happens on a single worker task that owns the
//! [`Connection`]: it services queued requests strictly one at a time
//! in submission order, stamps sequence numbers, waits for a matching
//! status confirmation or gives up, drives reconnection, and fans out
//! status/connection notifications to every subscriber in the order
//! they were raised. The wire protocol has no correlation identifier
//! beyond "the next status update after I wrote", so concurrency of
//! exactly one is the correctness property everything else rests on.

use crate::builder::SessionTimeouts;
use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info, warn};
use rinnai_core::{Command, CommandPath, RinnaiError, RinnaiResult, SequenceNumber, StatusTree};
use rinnai_session::{encode, Connection, ConnectionState, Message};
use rinnai_transport::TransportLayer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Total attempts per state-write command before it is abandoned.
const COMMAND_ATTEMPTS: u32 = 3;

const QUEUE_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 32;

/// Notification fanned out to session subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The controller's state changed (payload differs from the
    /// previous snapshot).
    Status(StatusTree),
    /// The connection state changed.
    Connection(ConnectionState),
}

/// Daily schedule for the vendor boot command.
#[derive(Debug, Clone)]
pub struct BootSchedule {
    pub hour: u32,
    pub minute: u32,
    pub payload: String,
}

struct QueueEntry {
    command: Command,
    done: Option<oneshot::Sender<RinnaiResult<()>>>,
}

/// Handle to a running session. Cheap to clone; all clones share the
/// same worker, queue and event stream.
#[derive(Clone)]
pub struct Session {
    requests: mpsc::Sender<QueueEntry>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<Option<StatusTree>>,
    connection_state: watch::Receiver<ConnectionState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Session {
    /// Spawn the worker task that owns `connection`.
    pub(crate) fn spawn<T: TransportLayer + 'static>(
        connection: Connection<T>,
        timeouts: SessionTimeouts,
        boot: Option<BootSchedule>,
    ) -> Session {
        let (requests_tx, requests_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (status_tx, status_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = SessionWorker {
            connection,
            requests: requests_rx,
            requests_tx: requests_tx.downgrade(),
            events: events_tx.clone(),
            status_tx,
            state_tx,
            shutdown: shutdown_rx,
            timeouts,
            boot,
            sequence: SequenceNumber::default(),
            status: None,
            last_message: None,
            published_state: ConnectionState::default(),
        };
        tokio::spawn(worker.run());

        Session {
            requests: requests_tx,
            events: events_tx,
            status: status_rx,
            connection_state: state_rx,
            shutdown: Arc::new(shutdown_tx),
        }
    }

    /// Subscribe to status-changed and connection-state notifications.
    /// Every subscriber receives every notification, in raised order.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The last status snapshot received from the controller.
    pub fn status(&self) -> Option<StatusTree> {
        self.status.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.borrow()
    }

    /// Submit a command and wait for its outcome.
    ///
    /// State writes resolve once the controller confirms the new state
    /// or fail with [`RinnaiError::CommandTimeout`] after exhausted
    /// retries, [`RinnaiError::InvalidRequest`] if the target path does
    /// not resolve in the controller's current mode, or a connection
    /// error. Pings and raw payloads resolve as soon as they are
    /// written.
    pub async fn execute(&self, command: Command) -> RinnaiResult<()> {
        debug!("session: execute {command}");

        let (done_tx, done_rx) = oneshot::channel();
        let entry = QueueEntry {
            command,
            done: Some(done_tx),
        };
        self.requests
            .send(entry)
            .await
            .map_err(|_| worker_stopped())?;
        done_rx.await.map_err(|_| worker_stopped())?
    }

    /// Convenience wrapper for a confirmed state write.
    pub async fn set_state(&self, path: CommandPath, state: impl Into<String>) -> RinnaiResult<()> {
        self.execute(Command::write(path, state)).await
    }

    /// Stop the session: cancel the keep-alive and boot schedules and
    /// destroy the socket. No further reconnects are attempted.
    pub fn stop(&self) {
        debug!("session: stop");
        let _ = self.shutdown.send(true);
    }
}

fn worker_stopped() -> RinnaiError {
    RinnaiError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "Session worker has stopped",
    ))
}

struct SessionWorker<T: TransportLayer> {
    connection: Connection<T>,
    requests: mpsc::Receiver<QueueEntry>,
    requests_tx: mpsc::WeakSender<QueueEntry>,
    events: broadcast::Sender<SessionEvent>,
    status_tx: watch::Sender<Option<StatusTree>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
    timeouts: SessionTimeouts,
    boot: Option<BootSchedule>,
    sequence: SequenceNumber,
    status: Option<StatusTree>,
    last_message: Option<Instant>,
    published_state: ConnectionState,
}

impl<T: TransportLayer> SessionWorker<T> {
    async fn run(mut self) {
        debug!("session: worker started");

        if !self.ensure_connected().await {
            let _ = self.connection.close().await;
            return;
        }

        let mut keep_alive = tokio::time::interval(self.timeouts.keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keep_alive.reset();

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
                entry = self.requests.recv() => match entry {
                    None => break,
                    Some(entry) => self.handle_request(entry).await,
                },
                _ = keep_alive.tick() => self.enqueue(Command::Ping),
                _ = Self::next_boot(self.boot.as_ref()), if self.boot.is_some() => {
                    info!("Boot time reached, scheduling boot command");
                    if let Some(boot) = &self.boot {
                        let payload = boot.payload.clone();
                        self.enqueue(Command::Raw(payload));
                    }
                }
                result = self.connection.read_message(self.timeouts.poll),
                    if self.connection.state().is_connected() =>
                {
                    match result {
                        Ok(Some(message)) => self.apply_message(message),
                        Ok(None) => {}
                        Err(error) => self.handle_connection_error(error).await,
                    }
                }
            }
        }

        let _ = self.connection.close().await;
        self.publish_state();
        debug!("session: worker stopped");
    }

    /// Push a command into our own queue so it is serialized behind
    /// any user command instead of racing it.
    fn enqueue(&self, command: Command) {
        if let Some(requests) = self.requests_tx.upgrade() {
            let entry = QueueEntry {
                command,
                done: None,
            };
            if requests.try_send(entry).is_err() {
                debug!("session: queue full, dropping internal command");
            }
        }
    }

    async fn handle_request(&mut self, mut entry: QueueEntry) {
        debug!("session: process {}", entry.command);

        if !self.supervise().await {
            complete(
                &mut entry,
                Err(RinnaiError::Connection(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "Connection unavailable",
                ))),
            );
            return;
        }

        let result = self.process(&entry.command).await;
        complete(&mut entry, result);
    }

    /// Connection supervision, run before every request.
    ///
    /// Returns `false` only when the session is shutting down.
    async fn supervise(&mut self) -> bool {
        // Connected but silent for too long: the module is considered
        // unresponsive and the socket is rebuilt proactively.
        if self.connection.state().is_connected() {
            let stale = self
                .last_message
                .map(|at| at.elapsed() > self.timeouts.idle_threshold)
                .unwrap_or(false);
            if stale {
                warn!(
                    "No status received for over {:?}. Reconnecting",
                    self.timeouts.idle_threshold
                );
                let _ = self.connection.close().await;
                self.publish_state();
            }
        }

        if self.connection.state() == ConnectionState::Closing && !self.wait_closed().await {
            return false;
        }

        if matches!(
            self.connection.state(),
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            return self.ensure_connected().await;
        }

        true
    }

    /// Bounded wait for a closing connection to finish closing.
    async fn wait_closed(&mut self) -> bool {
        let deadline = Instant::now() + self.timeouts.close_wait;
        while self.connection.state() == ConnectionState::Closing {
            if Instant::now() >= deadline {
                warn!("Connection was not closed within the time limit");
                return true;
            }
            if !self.pause(Duration::from_millis(500)).await {
                return false;
            }
        }
        true
    }

    /// Unbounded reconnect cycle: 3 bounded attempts per cycle, then a
    /// backoff before the next cycle. Liveness over giving up; only a
    /// shutdown stops it.
    async fn ensure_connected(&mut self) -> bool {
        loop {
            if *self.shutdown.borrow() {
                return false;
            }

            self.emit_state(ConnectionState::Connecting);
            match self.connection.connect().await {
                Ok(message) => {
                    self.publish_state();
                    self.apply_message(message);
                    return true;
                }
                Err(error) => {
                    self.publish_state();
                    warn!("Unable to connect to Rinnai Touch module. Will try again in 1 minute [{error}]");
                    if !self.pause(self.timeouts.reconnect_backoff).await {
                        return false;
                    }
                }
            }
        }
    }

    async fn handle_connection_error(&mut self, error: RinnaiError) {
        warn!("TCP Connection failed. Attempting to reconnect [{error}]");
        self.publish_state();
        if self.pause(self.timeouts.reconnect_pause).await {
            self.ensure_connected().await;
        }
    }

    async fn process(&mut self, command: &Command) -> RinnaiResult<()> {
        match command {
            // Pings and raw payloads are written blind: no confirmation
            // wait, no retry.
            Command::Ping | Command::Raw(_) => {
                let payload = encode(command, self.sequence.next());
                self.write(&payload).await
            }
            Command::Write { path, state } => self.process_write(path, state).await,
        }
    }

    async fn process_write(&mut self, path: &CommandPath, state: &str) -> RinnaiResult<()> {
        {
            let Some(status) = &self.status else {
                return Err(RinnaiError::InvalidRequest(
                    "No status has been received from the module".to_string(),
                ));
            };

            // The target must resolve against the controller's current
            // state; a path for the wrong mode is rejected before any
            // bytes are sent.
            if status.get_state(path).is_none() {
                warn!("Command rejected: {path} does not resolve in the current controller state");
                return Err(RinnaiError::InvalidRequest(format!(
                    "Path {path} does not resolve in the current controller state"
                )));
            }

            if status.has_state(path, state) {
                debug!("session: {path} is already '{state}', nothing to send");
                return Ok(());
            }
        }

        let command = Command::write(path.clone(), state);
        for attempt in 1..=COMMAND_ATTEMPTS {
            let payload = encode(&command, self.sequence.next());
            info!("Sending: {payload}");
            self.write(&payload).await?;

            let started = Instant::now();
            if self.await_confirmation(path, state).await? {
                info!("Command succeeded. Took {} ms", started.elapsed().as_millis());
                return Ok(());
            }
            warn!("Command failed. Attempt {attempt} of {COMMAND_ATTEMPTS}");
        }

        warn!("Command abandoned after {COMMAND_ATTEMPTS} attempts: {path}");
        Err(RinnaiError::CommandTimeout(format!(
            "{path} did not reach '{state}'"
        )))
    }

    /// Wait for a status update satisfying the target, observing every
    /// intervening update in arrival order.
    async fn await_confirmation(&mut self, path: &CommandPath, state: &str) -> RinnaiResult<bool> {
        let deadline = Instant::now() + self.timeouts.confirmation;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match self.connection.read_message(remaining).await {
                Ok(Some(message)) => {
                    self.apply_message(message);
                    let confirmed = self
                        .status
                        .as_ref()
                        .map(|status| status.has_state(path, state))
                        .unwrap_or(false);
                    if confirmed {
                        return Ok(true);
                    }
                }
                Ok(None) => return Ok(false),
                Err(error) => {
                    self.publish_state();
                    return Err(error);
                }
            }
        }
    }

    async fn write(&mut self, payload: &str) -> RinnaiResult<()> {
        match self.connection.write(payload).await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.publish_state();
                Err(error)
            }
        }
    }

    /// Apply one inbound message: track its sequence number and, when
    /// the payload differs from the previous snapshot, replace the
    /// stored tree and notify subscribers.
    fn apply_message(&mut self, message: Message) {
        self.sequence = message.sequence();
        self.last_message = Some(Instant::now());

        let status = message.into_status();
        if self.status.as_ref() == Some(&status) {
            return;
        }

        debug!("session: status changed");
        self.status = Some(status.clone());
        let _ = self.status_tx.send(Some(status.clone()));
        let _ = self.events.send(SessionEvent::Status(status));
    }

    fn publish_state(&mut self) {
        self.emit_state(self.connection.state());
    }

    fn emit_state(&mut self, state: ConnectionState) {
        if state == self.published_state {
            return;
        }
        debug!("session: connection state {}", state.as_str());
        self.published_state = state;
        let _ = self.state_tx.send(state);
        let _ = self.events.send(SessionEvent::Connection(state));
    }

    /// Sleep that aborts early on shutdown; returns `false` when the
    /// session is shutting down.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.changed() => !*self.shutdown.borrow(),
        }
    }

    async fn next_boot(boot: Option<&BootSchedule>) {
        match boot {
            Some(schedule) => {
                let wait = duration_until(chrono::Local::now().naive_local(), schedule.hour, schedule.minute);
                tokio::time::sleep(wait).await;
            }
            None => std::future::pending().await,
        }
    }
}

fn complete(entry: &mut QueueEntry, result: RinnaiResult<()>) {
    match entry.done.take() {
        Some(done) => {
            let _ = done.send(result);
        }
        None => {
            // Fire-and-forget internal command (ping, scheduled boot).
            if let Err(error) = result {
                warn!("session: internal command failed [{error}]");
            }
        }
    }
}

/// Time from `now` until the next daily occurrence of `hour:minute`.
fn duration_until(now: NaiveDateTime, hour: u32, minute: u32) -> Duration {
    let Some(today) = now
        .date()
        .and_hms_opt(hour, minute, 0)
    else {
        return Duration::from_secs(24 * 60 * 60);
    };

    let target = if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    };
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
