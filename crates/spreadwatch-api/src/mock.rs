//! Mock strategy API for testing.

use crate::client::{BoxFuture, StrategyApi};
use crate::error::ApiResult;
use parking_lot::Mutex;
use spreadwatch_core::{CommandReply, HistoricalSeries, StrategyCommand, StrategyStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted `StrategyApi` that records every call.
#[derive(Debug)]
pub struct MockStrategyApi {
    status: Mutex<ApiResult<StrategyStatus>>,
    historical: Mutex<ApiResult<HistoricalSeries>>,
    commands: Mutex<HashMap<StrategyCommand, ApiResult<CommandReply>>>,
    command_delay: Mutex<Duration>,
    /// When set, the next `status` call waits for this gate.
    status_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, the next `status` call panics.
    status_panic: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockStrategyApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStrategyApi {
    /// Create a mock reporting an uninitialized, idle strategy.
    pub fn new() -> Self {
        Self {
            status: Mutex::new(Ok(StrategyStatus {
                is_running: false,
                beta: None,
                intercept: None,
                current_position: 0,
                data_loaded: false,
                data_count: 0,
            })),
            historical: Mutex::new(Ok(HistoricalSeries::default())),
            commands: Mutex::new(HashMap::new()),
            command_delay: Mutex::new(Duration::ZERO),
            status_gate: Mutex::new(None),
            status_panic: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: ApiResult<StrategyStatus>) {
        *self.status.lock() = status;
    }

    pub fn set_historical(&self, series: ApiResult<HistoricalSeries>) {
        *self.historical.lock() = series;
    }

    /// Result returned by `command`. Unset commands succeed.
    pub fn set_command_result(&self, command: StrategyCommand, result: ApiResult<CommandReply>) {
        self.commands.lock().insert(command, result);
    }

    /// Delay applied to every command before it answers.
    pub fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.lock() = delay;
    }

    /// Hold the next `status` call until the returned gate is notified.
    pub fn hold_next_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock() = Some(gate.clone());
        gate
    }

    /// Make the next `status` call panic, as a bug in the client would.
    pub fn panic_next_status(&self) {
        *self.status_panic.lock() = true;
    }

    /// Recorded calls, e.g. `"GET /status"`, `"POST /start"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    /// Wait until `call` has been recorded at least `count` times.
    pub async fn wait_for_call(&self, call: &str, count: usize) {
        while self.call_count(call) < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Mirror a successful command into the reported status.
    fn apply_command(&self, command: StrategyCommand) {
        let mut status = self.status.lock();
        let Ok(status) = status.as_mut() else {
            return;
        };
        match command {
            StrategyCommand::Initialize => {
                status.beta = status.beta.or(Some(1.0));
                status.intercept = status.intercept.or(Some(0.0));
                status.data_loaded = true;
            }
            StrategyCommand::Start => status.is_running = true,
            StrategyCommand::Stop => status.is_running = false,
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl StrategyApi for MockStrategyApi {
    fn status(&self) -> BoxFuture<'_, ApiResult<StrategyStatus>> {
        Box::pin(async move {
            self.record("GET /status".to_string());
            let gate = self.status_gate.lock().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let panic = std::mem::take(&mut *self.status_panic.lock());
            if panic {
                panic!("status call failed unexpectedly");
            }
            self.status.lock().clone()
        })
    }

    fn historical(&self) -> BoxFuture<'_, ApiResult<HistoricalSeries>> {
        Box::pin(async move {
            self.record("GET /historical".to_string());
            self.historical.lock().clone()
        })
    }

    fn command(&self, command: StrategyCommand) -> BoxFuture<'_, ApiResult<CommandReply>> {
        Box::pin(async move {
            self.record(format!("POST {}", command.path()));
            let delay = *self.command_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = self
                .commands
                .lock()
                .get(&command)
                .cloned()
                .unwrap_or_else(|| {
                    Ok(CommandReply {
                        status: "success".to_string(),
                        message: format!("Strategy {command} succeeded"),
                    })
                });
            if result.is_ok() {
                self.apply_command(command);
            }
            result
        })
    }
}
