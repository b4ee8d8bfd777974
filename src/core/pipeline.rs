// Invocation pipeline: evaluate -> gate -> resolve -> dispatch.
//
// One `Notifier` processes one text or a batch of lines sequentially. In
// live mode the tool server is started lazily on the first text that needs
// a message, shared by the rest of the batch, and shut down once at the end.

use chrono::Utc;
use serde::Serialize;

use super::channel::resolve_channel;
use super::config::{ServerSpec, Settings};
use super::dispatch::client::{dispatch, Offline};
use super::dispatch::mcp::{McpToolTransport, ToolNames};
use super::dispatch::model::{DeliveryMode, DispatchErrorKind, DispatchOutcome, NotificationRequest};
use super::error::{ConfigError, LifecycleError, UrgencyError};
use super::evaluator::{EvaluationResult, UrgencyEvaluator};
use super::gate::should_notify;
use super::lifecycle::ManagedServer;

/// States of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Evaluating,
    Gating,
    Skipped,
    Resolving,
    Dispatching,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Failed)
    }

    fn can_advance_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Evaluating)
                | (Self::Evaluating, Self::Gating | Self::Failed)
                | (Self::Gating, Self::Skipped | Self::Resolving)
                | (Self::Resolving, Self::Dispatching)
                | (Self::Dispatching, Self::Completed | Self::Failed)
        )
    }
}

/// Transition log of one invocation.
#[derive(Debug, Clone)]
struct Invocation {
    stages: Vec<Stage>,
}

impl Invocation {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Idle],
        }
    }

    fn stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }

    fn advance(&mut self, next: Stage) {
        let current = self.stage();
        if !current.can_advance_to(next) {
            log::error!("Ignoring invalid transition {:?} -> {:?}", current, next);
            return;
        }
        log::debug!("{:?} -> {:?}", current, next);
        self.stages.push(next);
    }
}

/// What happened to one text.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub evaluation: EvaluationResult,
    pub notified: bool,
    pub stage: Stage,
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DispatchOutcome>,
}

impl InvocationReport {
    fn new(evaluation: EvaluationResult, invocation: Invocation, outcome: Option<DispatchOutcome>) -> Self {
        Self {
            notified: outcome.as_ref().is_some_and(|o| o.success),
            evaluation,
            stage: invocation.stage(),
            stages: invocation.stages,
            outcome,
        }
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        let eval = &self.evaluation;
        let names = eval.matched_names();
        let signals = if names.is_empty() { "-".to_string() } else { names.join(",") };
        let action = match (&self.outcome, self.stage) {
            (_, Stage::Skipped) => "skipped".to_string(),
            (Some(o), _) if o.success => format!(
                "sent to {} ({}{})",
                o.channel,
                o.mode,
                o.message_id.as_deref().map(|id| format!(", id {id}")).unwrap_or_default()
            ),
            (Some(o), _) => format!(
                "failed for {}: {}",
                o.channel,
                o.detail.as_deref().unwrap_or("unknown error")
            ),
            (None, _) => "failed: transport unavailable".to_string(),
        };
        format!(
            "score={:.3} urgent={} signals={} action={}",
            eval.score(),
            eval.is_urgent(),
            signals,
            action
        )
    }
}

/// Reports for every processed text, plus the error that decides the exit code.
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<InvocationReport>,
    pub error: Option<UrgencyError>,
}

impl RunSummary {
    pub fn into_result(self) -> Result<Vec<InvocationReport>, UrgencyError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.reports),
        }
    }
}

/// Everything needed to bring the tool server up for live delivery.
#[derive(Debug, Clone)]
pub struct ServerLauncher {
    pub spec: ServerSpec,
    pub startup_timeout: std::time::Duration,
    pub request_timeout: std::time::Duration,
    pub tools: ToolNames,
}

impl ServerLauncher {
    async fn ensure_started<'s>(
        &self,
        slot: &'s mut Option<ManagedServer>,
    ) -> Result<&'s mut ManagedServer, LifecycleError> {
        let server = match slot.take() {
            Some(server) => server,
            None => ManagedServer::start(&self.spec, self.startup_timeout, self.request_timeout).await?,
        };
        Ok(slot.insert(server))
    }
}

pub struct Notifier {
    evaluator: UrgencyEvaluator,
    always_notify: bool,
    channel: String,
    mode: DeliveryMode,
    max_message_chars: usize,
    launcher: Option<ServerLauncher>,
}

impl Notifier {
    /// Validate the full configuration up front; nothing is dispatched on error.
    pub fn from_settings(settings: &Settings, explicit_channel: Option<&str>) -> Result<Self, ConfigError> {
        let evaluator = UrgencyEvaluator::new(settings.load_signals()?, settings.threshold)?;
        let channel = resolve_channel(explicit_channel, settings.default_channel.as_deref())?;
        let mode = settings.delivery_mode();

        let launcher = if mode.is_live() {
            let spec = ServerSpec::load(&settings.mcp_config_path(), &settings.server_name)?;
            spec.check_credentials(&settings.required_credentials)?;
            Some(ServerLauncher {
                spec,
                startup_timeout: settings.startup_timeout(),
                request_timeout: settings.request_timeout(),
                tools: settings.tools.clone(),
            })
        } else {
            None
        };

        log::info!(
            "Notifier ready: mode={}, channel={}, threshold={}",
            mode,
            channel,
            evaluator.threshold().value()
        );
        Ok(Self {
            evaluator,
            always_notify: settings.always_notify,
            channel,
            mode,
            max_message_chars: settings.max_message_chars,
            launcher,
        })
    }

    pub fn new(
        evaluator: UrgencyEvaluator,
        always_notify: bool,
        channel: String,
        mode: DeliveryMode,
        max_message_chars: usize,
        launcher: Option<ServerLauncher>,
    ) -> Self {
        Self {
            evaluator,
            always_notify,
            channel,
            mode,
            max_message_chars,
            launcher,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Process texts in order. Stops early only if the tool server cannot start.
    pub async fn run<'t, I>(&self, texts: I) -> RunSummary
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut server: Option<ManagedServer> = None;
        let mut reports = Vec::new();
        let mut error = None;

        for text in texts {
            let mut invocation = Invocation::new();
            invocation.advance(Stage::Evaluating);
            let evaluation = self.evaluator.evaluate(text);

            invocation.advance(Stage::Gating);
            if !should_notify(&evaluation, self.evaluator.threshold(), self.always_notify) {
                log::info!("Score {:.3} below threshold, not notifying", evaluation.score());
                invocation.advance(Stage::Skipped);
                reports.push(InvocationReport::new(evaluation, invocation, None));
                continue;
            }

            // channel was resolved in `from_settings`; only the request is built here
            invocation.advance(Stage::Resolving);
            let request = NotificationRequest::for_evaluation(
                &evaluation,
                self.channel.clone(),
                self.mode,
                self.max_message_chars,
                Utc::now(),
            );

            invocation.advance(Stage::Dispatching);
            let outcome = match (&self.launcher, self.mode) {
                (Some(launcher), DeliveryMode::Live) => match launcher.ensure_started(&mut server).await {
                    Ok(running) => {
                        let mut transport = McpToolTransport::new(running.session_mut(), launcher.tools.clone());
                        dispatch(request, &mut transport).await
                    }
                    Err(e) => {
                        invocation.advance(Stage::Failed);
                        reports.push(InvocationReport::new(evaluation, invocation, None));
                        error = Some(UrgencyError::TransportStartup(e));
                        break;
                    }
                },
                _ => dispatch(request, &mut Offline).await,
            };

            if outcome.success {
                invocation.advance(Stage::Completed);
            } else {
                invocation.advance(Stage::Failed);
                if error.is_none() {
                    error = Some(outcome_error(&outcome));
                }
            }
            reports.push(InvocationReport::new(evaluation, invocation, Some(outcome)));
        }

        if let Some(server) = server.take() {
            server.shutdown().await;
        }
        RunSummary { reports, error }
    }
}

fn outcome_error(outcome: &DispatchOutcome) -> UrgencyError {
    match outcome.error {
        Some(DispatchErrorKind::DestinationNotFound) => UrgencyError::DestinationNotFound(outcome.channel.clone()),
        _ => UrgencyError::DispatchTransport(
            outcome
                .detail
                .clone()
                .unwrap_or_else(|| "unknown dispatch failure".to_string()),
        ),
    }
}
