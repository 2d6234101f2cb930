//! Session coordinator actor.
//!
//! A single task owns the control state machine, signal log, alert slot and
//! field cells. Push events are applied in delivery order; poll responses
//! may land out of order and go through per-group race precedence: each
//! group remembers the logical stamp of its last writer and a poll is
//! applied only if it was issued after that stamp.

use crate::alert::{AlertQueue, Severity};
use crate::config::SessionConfig;
use crate::control::StrategyControlStateMachine;
use crate::error::{SessionError, SessionResult};
use crate::history::HistoricalSeriesLoader;
use crate::log_buffer::SignalLogBuffer;
use crate::session::SessionSnapshot;
use chrono::Utc;
use spreadwatch_api::{ApiError, ApiResult, DynStrategyApi};
use spreadwatch_core::{
    CommandReply, HistoricalPoint, LogEntry, StrategyCommand, StrategyStatus, StrategyUpdate,
};
use spreadwatch_telemetry::Metrics;
use spreadwatch_ws::{
    ChannelEvent, ConnectionConfig, ConnectionManager, DynPushTransport, PushMessage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Operator requests sent by `Session`.
pub(crate) enum Request {
    Command {
        command: StrategyCommand,
        reply: oneshot::Sender<SessionResult<CommandReply>>,
    },
    RefreshStatus {
        reply: oneshot::Sender<SessionResult<StrategyStatus>>,
    },
    LoadHistory {
        reply: oneshot::Sender<SessionResult<usize>>,
    },
    DismissAlert,
    Reconnect,
}

/// Completion of an in-flight REST task.
enum TaskOutput {
    Command {
        command: StrategyCommand,
        result: ApiResult<CommandReply>,
        reply: oneshot::Sender<SessionResult<CommandReply>>,
    },
    Status {
        issued_at: u64,
        result: ApiResult<StrategyStatus>,
        reply: Option<oneshot::Sender<SessionResult<StrategyStatus>>>,
        announce_failure: bool,
    },
    History {
        result: SessionResult<Vec<HistoricalPoint>>,
        reply: Option<oneshot::Sender<SessionResult<usize>>>,
    },
}

/// Which kind of REST task a `task::Id` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Command,
    Status,
    History,
}

enum Step {
    Shutdown,
    Request(Request),
    Channel(ChannelEvent),
    Task(Result<(task::Id, TaskOutput), JoinError>),
    AlertExpired,
    Poll,
}

/// A field group and the logical stamp of its last writer.
#[derive(Debug)]
struct Stamped<T> {
    value: T,
    stamp: u64,
}

impl<T> Stamped<T> {
    fn new(value: T) -> Self {
        Self { value, stamp: 0 }
    }

    /// Unconditional write (push or command).
    fn write(&mut self, value: T, stamp: u64) {
        self.value = value;
        self.stamp = stamp;
    }

    /// Mark the group as written without changing its value.
    fn touch(&mut self, stamp: u64) {
        self.stamp = stamp;
    }

    /// Poll write, applied only if issued after the last writer.
    fn apply_if_newer(&mut self, value: T, issued_at: u64) -> bool {
        if issued_at > self.stamp {
            self.write(value, issued_at);
            true
        } else {
            false
        }
    }
}

pub(crate) struct SessionCoordinator {
    config: SessionConfig,
    push_url: String,
    api: DynStrategyApi,
    loader: HistoricalSeriesLoader,
    connection: ConnectionManager,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    request_rx: mpsc::Receiver<Request>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
    tasks: JoinSet<TaskOutput>,
    task_kinds: HashMap<task::Id, TaskKind>,
    poll: Option<Interval>,
    status_in_flight: usize,

    control: StrategyControlStateMachine,
    log: SignalLogBuffer,
    alerts: AlertQueue,
    clock: u64,
    current: Option<StrategyUpdate>,
    /// Remote `is_running`; commands touch it so older polls cannot
    /// reconcile over them.
    run: Stamped<bool>,
    model: Stamped<(Option<f64>, Option<f64>)>,
    position: Stamped<i64>,
    dataset: Stamped<(bool, u64)>,
    reconnect_exhausted: bool,
    history: Arc<Vec<HistoricalPoint>>,
    version: u64,
}

impl SessionCoordinator {
    pub(crate) fn new(
        config: SessionConfig,
        push: ConnectionConfig,
        api: DynStrategyApi,
        transport: DynPushTransport,
        request_rx: mpsc::Receiver<Request>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (event_tx, channel_rx) = mpsc::channel(256);
        let push_url = push.url.clone();
        let connection = ConnectionManager::new(push, transport, event_tx);

        Self {
            log: SignalLogBuffer::new(config.log_capacity),
            alerts: AlertQueue::new(config.alert_ttl()),
            config,
            push_url,
            loader: HistoricalSeriesLoader::new(api.clone()),
            api,
            connection,
            channel_rx,
            request_rx,
            snapshot_tx,
            shutdown,
            tasks: JoinSet::new(),
            task_kinds: HashMap::new(),
            poll: None,
            status_in_flight: 0,
            control: StrategyControlStateMachine::new(),
            clock: 0,
            current: None,
            run: Stamped::new(false),
            model: Stamped::new((None, None)),
            position: Stamped::new(0),
            dataset: Stamped::new((false, 0)),
            reconnect_exhausted: false,
            history: Arc::new(Vec::new()),
            version: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(push_url = %self.push_url, "Session coordinator started");

        self.poll = self.config.status_poll_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Metrics::run_state_set(self.control.state().as_str());
        self.connection.connect(&self.push_url);
        self.spawn_status(None, true);
        self.publish();

        loop {
            let step = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Step::Shutdown,
                request = self.request_rx.recv() => match request {
                    Some(request) => Step::Request(request),
                    None => Step::Shutdown,
                },
                Some(event) = self.channel_rx.recv() => Step::Channel(event),
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => Step::Task(joined),
                () = self.alerts.expired() => Step::AlertExpired,
                () = next_tick(&mut self.poll) => Step::Poll,
            };

            match step {
                Step::Shutdown => break,
                Step::Request(request) => self.handle_request(request),
                Step::Channel(event) => self.handle_channel(event),
                Step::Task(Ok((id, output))) => {
                    self.task_kinds.remove(&id);
                    self.handle_task(output);
                }
                Step::Task(Err(e)) => self.handle_task_failure(e),
                Step::AlertExpired => {
                    if self.alerts.clear_expired() {
                        debug!("Alert expired");
                    }
                }
                Step::Poll => {
                    if self.status_in_flight == 0 {
                        self.spawn_status(None, false);
                    }
                }
            }
            self.publish();
        }

        self.teardown().await;
    }

    async fn teardown(mut self) {
        info!("Session coordinator shutting down");
        self.request_rx.close();
        self.poll = None;
        self.alerts.dismiss();
        self.tasks.shutdown().await;
        self.connection.shutdown().await;
        self.publish();
        info!("Session coordinator stopped");
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // ---------------------------------------------------------------------
    // Operator requests
    // ---------------------------------------------------------------------

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command { command, reply } => self.begin_command(command, reply),
            Request::RefreshStatus { reply } => self.spawn_status(Some(reply), true),
            Request::LoadHistory { reply } => self.spawn_history(Some(reply)),
            Request::DismissAlert => self.alerts.dismiss(),
            Request::Reconnect => {
                info!(url = %self.push_url, "Operator requested reconnect");
                self.reconnect_exhausted = false;
                self.connection.connect(&self.push_url);
            }
        }
    }

    fn begin_command(
        &mut self,
        command: StrategyCommand,
        reply: oneshot::Sender<SessionResult<CommandReply>>,
    ) {
        let connection = self.connection.state();
        let state = match self.control.begin(command, connection) {
            Ok(state) => state,
            Err(err) => {
                warn!(%command, error = %err, "Command rejected");
                Metrics::command(command.as_str(), "rejected");
                self.alerts.show(err.to_string(), Severity::Warning);
                let _ = reply.send(Err(err));
                return;
            }
        };

        let stamp = self.next_stamp();
        self.run.touch(stamp);
        Metrics::run_state_set(state.as_str());
        if command == StrategyCommand::Initialize {
            self.alerts.show("Initializing strategy...", Severity::Info);
        }

        let api = self.api.clone();
        let timeout = self.config.command_timeout();
        let timeout_ms = self.config.command_timeout_ms;
        info!(%command, "Sending command");
        let handle = self.tasks.spawn(async move {
            let result = match tokio::time::timeout(timeout, api.command(command)).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout(timeout_ms)),
            };
            TaskOutput::Command {
                command,
                result,
                reply,
            }
        });
        self.task_kinds.insert(handle.id(), TaskKind::Command);
    }

    fn spawn_status(
        &mut self,
        reply: Option<oneshot::Sender<SessionResult<StrategyStatus>>>,
        announce_failure: bool,
    ) {
        let issued_at = self.next_stamp();
        self.status_in_flight += 1;
        let api = self.api.clone();
        let handle = self.tasks.spawn(async move {
            TaskOutput::Status {
                issued_at,
                result: api.status().await,
                reply,
                announce_failure,
            }
        });
        self.task_kinds.insert(handle.id(), TaskKind::Status);
    }

    fn spawn_history(&mut self, reply: Option<oneshot::Sender<SessionResult<usize>>>) {
        let loader = self.loader.clone();
        let handle = self.tasks.spawn(async move {
            TaskOutput::History {
                result: loader.load().await,
                reply,
            }
        });
        self.task_kinds.insert(handle.id(), TaskKind::History);
    }

    // ---------------------------------------------------------------------
    // REST completions
    // ---------------------------------------------------------------------

    fn handle_task(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Command {
                command,
                result,
                reply,
            } => self.complete_command(command, result, reply),
            TaskOutput::Status {
                issued_at,
                result,
                reply,
                announce_failure,
            } => {
                self.status_in_flight = self.status_in_flight.saturating_sub(1);
                match result {
                    Ok(status) => {
                        self.apply_status(issued_at, &status);
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(status));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Status fetch failed");
                        if announce_failure {
                            self.alerts.show("Error fetching status", Severity::Error);
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(Err(e.into()));
                        }
                    }
                }
            }
            TaskOutput::History { result, reply } => match result {
                Ok(points) => {
                    let len = points.len();
                    self.history = Arc::new(points);
                    if let Some(reply) = reply {
                        let _ = reply.send(Ok(len));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Historical load failed, keeping previous series");
                    self.alerts.show(
                        format!("Error fetching historical data: {e}"),
                        Severity::Error,
                    );
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(e));
                    }
                }
            },
        }
    }

    fn complete_command(
        &mut self,
        command: StrategyCommand,
        result: ApiResult<CommandReply>,
        reply: oneshot::Sender<SessionResult<CommandReply>>,
    ) {
        let stamp = self.next_stamp();
        self.run.touch(stamp);

        match result {
            Ok(body) => {
                let state = self.control.complete(command, true);
                Metrics::command(command.as_str(), "success");
                Metrics::run_state_set(state.as_str());
                self.alerts.show(success_message(command), Severity::Success);

                if command == StrategyCommand::Initialize {
                    self.model.touch(stamp);
                    self.dataset.touch(stamp);
                    self.spawn_status(None, true);
                    self.spawn_history(None);
                }
                let _ = reply.send(Ok(body));
            }
            Err(e) => {
                let state = self.control.complete(command, false);
                error!(%command, error = %e, state = %state, "Command failed");
                Metrics::command(command.as_str(), "failure");
                Metrics::run_state_set(state.as_str());
                self.alerts.show(
                    format!("{}: {}", failure_message(command), e.operator_message()),
                    Severity::Error,
                );
                let _ = reply.send(Err(SessionError::Request(e)));
            }
        }
    }

    fn handle_task_failure(&mut self, e: JoinError) {
        let kind = self.task_kinds.remove(&e.id());
        if e.is_cancelled() {
            return;
        }
        error!(?e, task = ?kind, "REST task panicked");
        match kind {
            // The reply sender died with the task; settle the command so the
            // machine does not stay transient.
            Some(TaskKind::Command) => {
                if let Some(command) = self.control.pending_command() {
                    let state = self.control.complete(command, false);
                    Metrics::run_state_set(state.as_str());
                    self.alerts
                        .show(failure_message(command).to_string(), Severity::Error);
                }
            }
            Some(TaskKind::Status) => {
                self.status_in_flight = self.status_in_flight.saturating_sub(1);
            }
            Some(TaskKind::History) | None => {}
        }
    }

    fn apply_status(&mut self, issued_at: u64, status: &StrategyStatus) {
        let mut stale = Vec::new();

        if !self
            .model
            .apply_if_newer((status.beta, status.intercept), issued_at)
        {
            stale.push("model");
        }
        if !self.position.apply_if_newer(status.current_position, issued_at) {
            stale.push("position");
        }
        if !self
            .dataset
            .apply_if_newer((status.data_loaded, status.data_count), issued_at)
        {
            stale.push("dataset");
        }
        if self.run.apply_if_newer(status.is_running, issued_at) {
            let entered = self.control.reconcile(status, self.connection.state());
            if let Some(state) = entered.last() {
                Metrics::run_state_set(state.as_str());
            }
        } else {
            stale.push("run");
        }

        for group in stale {
            debug!(group, issued_at, "Dropping stale status fields");
            Metrics::stale_poll_dropped(group);
        }
    }

    // ---------------------------------------------------------------------
    // Push channel
    // ---------------------------------------------------------------------

    fn handle_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                info!("Push channel connected");
                self.reconnect_exhausted = false;
                Metrics::push_connected();
                self.alerts.show("Connected to server", Severity::Success);
            }
            ChannelEvent::Disconnected { reason } => {
                warn!(%reason, "Push channel disconnected");
                Metrics::push_disconnected("lost");
                self.alerts.show("Disconnected from server", Severity::Error);
            }
            ChannelEvent::Message(msg) => self.handle_push(msg),
            ChannelEvent::ChannelError(text) => {
                warn!(error = %text, "Push channel error");
                Metrics::push_event("error");
                self.alerts
                    .show(format!("Connection error: {text}"), Severity::Error);
            }
            ChannelEvent::ReconnectExhausted { attempts } => {
                let err = SessionError::Connection(format!(
                    "gave up after {attempts} reconnection attempts"
                ));
                error!(attempts, "Push channel reconnection exhausted");
                self.reconnect_exhausted = true;
                Metrics::push_disconnected("exhausted");
                self.alerts.show_persistent(err.to_string(), Severity::Error);
            }
        }
    }

    fn handle_push(&mut self, msg: PushMessage) {
        let update = match StrategyUpdate::from_value(&msg.data) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Malformed strategy update");
                Metrics::push_event("malformed");
                self.alerts.show(
                    format!("Malformed strategy update: {e}"),
                    Severity::Error,
                );
                return;
            }
        };

        let stamp = self.next_stamp();
        let entry = LogEntry::from_update(&update, Utc::now());
        debug!(
            signal = %entry.signal,
            action = %entry.action,
            z_score = %entry.z_score_text,
            "Strategy update"
        );
        self.log.append(entry);
        Metrics::push_event("strategy_update");
        Metrics::log_buffer_len(self.log.len());

        if let Some(position) = update.signal_data.current_position {
            self.position.write(position, stamp);
        }
        self.current = Some(update);
    }

    fn publish(&mut self) {
        self.version += 1;
        let (beta, intercept) = self.model.value;
        let (data_loaded, data_count) = self.dataset.value;
        let snapshot = SessionSnapshot {
            version: self.version,
            connection: self.connection.state(),
            reconnect_exhausted: self.reconnect_exhausted,
            run_state: self.control.state(),
            pending_command: self.control.pending_command(),
            remote_running: self.run.value,
            current_signal: self.current.as_ref().map(|u| u.signal_data.clone()),
            current_action: self.current.as_ref().map(|u| u.trade_action.clone()),
            beta,
            intercept,
            current_position: self.position.value,
            data_loaded,
            data_count,
            logs: self.log.snapshot(),
            total_logs: self.log.total_appended(),
            alert: self.alerts.current().cloned(),
            history_len: self.history.len(),
            history: self.history.clone(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn success_message(command: StrategyCommand) -> &'static str {
    match command {
        StrategyCommand::Initialize => "Strategy initialized successfully",
        StrategyCommand::Start => "Strategy started successfully",
        StrategyCommand::Stop => "Strategy stopped successfully",
    }
}

fn failure_message(command: StrategyCommand) -> &'static str {
    match command {
        StrategyCommand::Initialize => "Error initializing strategy",
        StrategyCommand::Start => "Error starting strategy",
        StrategyCommand::Stop => "Error stopping strategy",
    }
}
