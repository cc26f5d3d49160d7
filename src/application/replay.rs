//! Scenario replay
//!
//! A replay script is a list of wallet events (YAML or JSON) driven through a
//! tracker on a manual clock. The resulting [`ReplayReport`] holds the final
//! state, metrics, history and every analytics event that was emitted, which
//! makes a script a reproducible description of one dashboard session.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::error::AppError;
use crate::core::result::{AppResult, ResultExt};
use crate::core::types::{ConnectionStatus, PluralityData, Timestamp, Transition, WalletAddress, WalletType};
use crate::core::validation::validate_chain_id;
use crate::services::tracker::{
    AnalyticsEmitter, AnalyticsEvent, ConnectionRecord, ConnectionState, ConnectionStats, PluralitySession,
    RecordingAnalytics, TrackerOptions, WalletConnectionTracker,
};
use crate::utils::cli::OutputFormat;
use crate::utils::time::{format_duration_ms, Clock, ManualClock};

/// Clock origin used when a script does not set `start_ms`
pub const DEFAULT_REPLAY_START_MS: i64 = 1_000;

/// Parsed replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Script name, shown in the report
    #[serde(default)]
    pub name: String,

    /// Manual clock origin in Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,

    /// Events in order
    pub steps: Vec<ReplayStep>,
}

/// One wallet event of a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStep {
    /// Establish the external session
    SetSession {
        /// Session identifier
        session_id: String,
        /// User identifier
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Start an attempt
    Initiate {
        /// Wallet used
        wallet_type: WalletType,
        /// Expire the attempt after this many milliseconds
        #[serde(default)]
        timeout_ms: Option<u64>,
        /// Correlation ids supplied with the event
        #[serde(default, flatten)]
        plurality: PluralityData,
    },
    /// Advance the clock
    Wait {
        /// Milliseconds to advance
        ms: u64,
    },
    /// Resolve the latest attempt as connected
    Success {
        /// Connected address
        address: String,
        /// Connected chain
        chain_id: u64,
        /// Correlation ids supplied with the event
        #[serde(default, flatten)]
        plurality: PluralityData,
    },
    /// Resolve the latest attempt as failed
    Failure {
        /// Provider error message
        message: String,
        /// Provider error code
        #[serde(default)]
        code: Option<String>,
        /// Correlation ids supplied with the event
        #[serde(default, flatten)]
        plurality: PluralityData,
    },
    /// Wallet disconnected
    Disconnect {},
    /// Wallet switched account
    AccountChanged {
        /// New address
        address: String,
    },
    /// Wallet switched network
    NetworkChanged {
        /// New chain
        chain_id: u64,
    },
    /// Jump to the pending attempt's deadline and expire it
    Expire {},
}

impl ReplayStep {
    /// Step name as written in scripts
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetSession { .. } => "set_session",
            Self::Initiate { .. } => "initiate",
            Self::Wait { .. } => "wait",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
            Self::Disconnect {} => "disconnect",
            Self::AccountChanged { .. } => "account_changed",
            Self::NetworkChanged { .. } => "network_changed",
            Self::Expire {} => "expire",
        }
    }
}

impl ReplayScript {
    /// Parse a YAML script.
    ///
    /// Steps are written as single-key maps (`- wait: { ms: 500 }`) rather
    /// than YAML tags.
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        Ok(serde_yaml::with::singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str(content),
        )?)
    }

    /// Parse a JSON script
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a script, choosing the format from the file extension (YAML unless `.json`)
    pub async fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_config_err(|| format!("Failed to read replay script {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let script = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };

        debug!("📄 Loaded replay script '{}' with {} steps", script.name, script.steps.len());
        Ok(script)
    }
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    /// The tracker changed state
    Applied,
    /// The tracker ignored the call
    Ignored,
    /// The tracker rejected the call in strict mode
    Rejected {
        /// Rejection message
        reason: String,
    },
}

impl From<Transition> for StepResult {
    fn from(value: Transition) -> Self {
        match value {
            Transition::Applied => Self::Applied,
            Transition::Ignored => Self::Ignored,
        }
    }
}

/// Outcome of one step, with the clock and status after it ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Position in the script
    pub index: usize,
    /// Step name
    pub step: &'static str,
    /// What the tracker did
    pub result: StepResult,
    /// Clock after the step
    pub at: Timestamp,
    /// Status after the step
    pub status: ConnectionStatus,
}

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Script name
    pub name: String,
    /// Final summary
    pub stats: ConnectionStats,
    /// Final state
    pub state: ConnectionState,
    /// External session, if one was set
    pub session: Option<PluralitySession>,
    /// History, newest first
    pub history: Vec<ConnectionRecord>,
    /// Emitted analytics events in order
    pub events: Vec<AnalyticsEvent>,
    /// Per-step outcomes
    pub steps: Vec<StepOutcome>,
}

impl ReplayReport {
    /// Successful attempts in the history, newest first
    pub fn successes(&self) -> impl Iterator<Item = &ConnectionRecord> + '_ {
        self.history.iter().filter(|r| r.success)
    }

    /// Failed attempts in the history, newest first
    pub fn failures(&self) -> impl Iterator<Item = &ConnectionRecord> + '_ {
        self.history.iter().filter(|r| !r.success)
    }

    /// Names of the emitted events
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.iter().map(AnalyticsEvent::name).collect()
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human readable rendering
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let stats = &self.stats;

        let _ = writeln!(out, "Replay: {}", if self.name.is_empty() { "<unnamed>" } else { &self.name });
        let _ = writeln!(out, "Status: {}", stats.status);
        if let (Some(address), Some(chain_id)) = (&stats.address, stats.chain_id) {
            let _ = writeln!(out, "Wallet: {address} on chain {chain_id}");
        }
        if let Some(session) = &self.session {
            let _ = writeln!(
                out,
                "Session: {} (user {}, authenticated: {})",
                session.session_id,
                session.user_id.as_deref().unwrap_or("-"),
                session.is_authenticated
            );
        }
        let _ = writeln!(
            out,
            "Attempts: {} total, {} successful, {} failed",
            stats.total_attempts, stats.successful_connections, stats.failed_connections
        );
        let _ = writeln!(out, "Success rate: {:.1}%", stats.success_rate);
        let _ = writeln!(out, "Average connect time: {:.1}ms", stats.average_connect_time);

        let _ = writeln!(out, "History ({} records):", self.history.len());
        for record in &self.history {
            let wallet = record.wallet_type.map_or("-", |w| w.as_str());
            if record.success {
                let _ = writeln!(out, "  ✅ {} {} in {}", record.timestamp, wallet, format_duration_ms(record.duration_ms));
            } else {
                let _ = writeln!(
                    out,
                    "  ❌ {} {} after {}: {}",
                    record.timestamp,
                    wallet,
                    format_duration_ms(record.duration_ms),
                    record.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        let _ = writeln!(out, "Events: {}", self.event_names().join(", "));
        out
    }

    /// Render in the requested format
    pub fn render(&self, format: OutputFormat) -> AppResult<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => self.to_json(),
        }
    }
}

/// Drives scripts through a fresh tracker each run
#[derive(Debug, Clone, Default)]
pub struct ReplayRunner {
    options: TrackerOptions,
    emitter: AnalyticsEmitter,
}

impl ReplayRunner {
    /// Runner with the given tracker options
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            options,
            emitter: AnalyticsEmitter::new(),
        }
    }

    /// Additional sinks that receive every replayed event
    #[must_use]
    pub fn with_emitter(mut self, emitter: AnalyticsEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Replay `script` and collect the report
    #[instrument(skip(self, script), fields(script = %script.name, steps = script.steps.len()))]
    pub fn run(&self, script: &ReplayScript) -> AppResult<ReplayReport> {
        info!("🎬 Replaying '{}' ({} steps)", script.name, script.steps.len());

        let clock = ManualClock::new(Timestamp::from_millis(script.start_ms.unwrap_or(DEFAULT_REPLAY_START_MS)));
        let recorder = Arc::new(RecordingAnalytics::new());
        let emitter = self.emitter.clone().with_sink(Arc::clone(&recorder));
        let mut tracker = WalletConnectionTracker::with_options(self.options.clone(), emitter, Arc::new(clock.clone()));

        let mut last_start: Option<Timestamp> = None;
        let mut outcomes = Vec::with_capacity(script.steps.len());

        for (index, step) in script.steps.iter().enumerate() {
            let result = match apply_step(&mut tracker, &clock, &mut last_start, index, step) {
                Ok(transition) => StepResult::from(transition),
                Err(e @ AppError::Precondition { .. }) => {
                    warn!("⚠️  Step {} ({}) rejected: {}", index, step.name(), e);
                    StepResult::Rejected { reason: e.to_string() }
                }
                Err(e) => return Err(e),
            };

            debug!(index, step = step.name(), ?result, "Replayed step");
            outcomes.push(StepOutcome {
                index,
                step: step.name(),
                result,
                at: clock.now(),
                status: tracker.state().status,
            });
        }

        let stats = tracker.stats();
        info!(
            "🏁 Replay finished: {} attempts, {:.1}% success rate",
            stats.total_attempts, stats.success_rate
        );

        Ok(ReplayReport {
            name: script.name.clone(),
            stats,
            state: tracker.state().clone(),
            session: tracker.plurality_session().cloned(),
            history: tracker.history().to_vec(),
            events: recorder.take(),
            steps: outcomes,
        })
    }
}

fn apply_step(
    tracker: &mut WalletConnectionTracker,
    clock: &ManualClock,
    last_start: &mut Option<Timestamp>,
    index: usize,
    step: &ReplayStep,
) -> AppResult<Transition> {
    match step {
        ReplayStep::SetSession { session_id, user_id } => {
            tracker
                .set_plurality_session(session_id, user_id.as_deref())
                .map_err(|e| AppError::replay(index, e.to_string()))?;
            Ok(Transition::Applied)
        }
        ReplayStep::Initiate {
            wallet_type,
            timeout_ms,
            plurality,
        } => {
            let plurality = non_empty(plurality);
            let ticket = match timeout_ms {
                Some(ms) => tracker.initiate_connection_with_timeout(*wallet_type, plurality, *ms),
                None => tracker.initiate_connection(*wallet_type, plurality),
            };
            *last_start = Some(ticket.started_at);
            Ok(Transition::Applied)
        }
        ReplayStep::Wait { ms } => {
            clock.advance(*ms);
            Ok(Transition::Applied)
        }
        ReplayStep::Success {
            address,
            chain_id,
            plurality,
        } => {
            let address = parse_address(index, address)?;
            validate_chain_id(*chain_id).map_err(|e| AppError::replay(index, e.to_string()))?;
            let start = last_start.unwrap_or_else(|| clock.now());
            tracker.handle_connection_success(address.into_inner(), *chain_id, start, non_empty(plurality))
        }
        ReplayStep::Failure {
            message,
            code,
            plurality,
        } => {
            let start = last_start.unwrap_or_else(|| clock.now());
            tracker.handle_connection_failure(message.clone(), code.clone(), start, non_empty(plurality))
        }
        ReplayStep::Disconnect {} => tracker.handle_disconnect(),
        ReplayStep::AccountChanged { address } => {
            let address = parse_address(index, address)?;
            tracker.handle_account_changed(address.into_inner())
        }
        ReplayStep::NetworkChanged { chain_id } => {
            validate_chain_id(*chain_id).map_err(|e| AppError::replay(index, e.to_string()))?;
            tracker.handle_network_changed(*chain_id)
        }
        ReplayStep::Expire {} => {
            let Some((attempt_id, deadline)) = tracker
                .pending_attempt()
                .and_then(|p| p.deadline.map(|deadline| (p.attempt_id, deadline)))
            else {
                debug!(index, "No pending attempt with a deadline to expire");
                return Ok(Transition::Ignored);
            };

            if deadline > clock.now() {
                clock.set(deadline);
            }
            tracker.expire_pending(attempt_id)
        }
    }
}

fn parse_address(index: usize, address: &str) -> AppResult<WalletAddress> {
    WalletAddress::new(address).map_err(|e| AppError::replay(index, e.to_string()))
}

fn non_empty(plurality: &PluralityData) -> Option<PluralityData> {
    (!plurality.is_empty()).then(|| plurality.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const ADDRESS_A: &str = "0x1111111111111111111111111111111111111111";
    const ADDRESS_B: &str = "0x2222222222222222222222222222222222222222";

    fn run_yaml(yaml: &str) -> ReplayReport {
        let script = ReplayScript::from_yaml_str(yaml).unwrap();
        ReplayRunner::default().run(&script).unwrap()
    }

    #[test]
    fn test_parse_yaml_script() {
        let script = ReplayScript::from_yaml_str(
            r#"
name: parse
start_ms: 5000
steps:
  - set_session: { session_id: plr-1, user_id: user-9 }
  - initiate: { wallet_type: metamask, timeout_ms: 3000 }
  - wait: { ms: 10 }
  - disconnect: {}
"#,
        )
        .unwrap();

        assert_eq!(script.start_ms, Some(5_000));
        assert_eq!(script.steps.len(), 4);
        assert_eq!(
            script.steps[1],
            ReplayStep::Initiate {
                wallet_type: WalletType::Metamask,
                timeout_ms: Some(3_000),
                plurality: PluralityData::default(),
            }
        );
        assert_eq!(script.steps[3].name(), "disconnect");
    }

    #[test]
    fn test_yaml_steps_are_single_key_maps() {
        let script = ReplayScript::from_yaml_str(&format!(
            r#"
steps:
  - success: {{ address: "{ADDRESS_A}", chain_id: 1, session_id: plr-2, user_id: user-3 }}
  - failure:
      message: rejected
      code: "4001"
  - expire: {{}}
"#
        ))
        .unwrap();

        assert_eq!(
            script.steps[0],
            ReplayStep::Success {
                address: ADDRESS_A.to_string(),
                chain_id: 1,
                plurality: PluralityData {
                    session_id: Some("plr-2".to_string()),
                    user_id: Some("user-3".to_string()),
                },
            }
        );
        assert_matches!(&script.steps[1], ReplayStep::Failure { code: Some(code), .. } if code == "4001");
        assert_eq!(script.steps[2], ReplayStep::Expire {});
    }

    #[tokio::test]
    async fn test_load_missing_script_is_config_error() {
        let err = ReplayScript::load("/nonexistent/replay/script.yaml").await.unwrap_err();
        assert_matches!(
            err,
            AppError::Config { ref message, .. } if message.starts_with("Failed to read replay script /nonexistent/replay/script.yaml: ")
        );
    }

    #[test]
    fn test_parse_json_script() {
        let script = ReplayScript::from_json_str(
            r#"{"name":"json","steps":[{"initiate":{"wallet_type":"coinbase","session_id":"s-1"}},{"failure":{"message":"User rejected","code":"4001"}}]}"#,
        )
        .unwrap();

        assert_matches!(
            &script.steps[0],
            ReplayStep::Initiate { wallet_type: WalletType::Coinbase, plurality, .. } if plurality.session_id.as_deref() == Some("s-1")
        );
    }

    #[test]
    fn test_happy_path_replay() {
        let report = run_yaml(&format!(
            r#"
name: happy path
steps:
  - initiate: {{ wallet_type: metamask }}
  - wait: {{ ms: 500 }}
  - success: {{ address: "{ADDRESS_A}", chain_id: 1 }}
  - account_changed: {{ address: "{ADDRESS_B}" }}
  - network_changed: {{ chain_id: 137 }}
  - disconnect: {{}}
"#
        ));

        assert_eq!(report.stats.total_attempts, 1);
        assert_eq!(report.stats.successful_connections, 1);
        assert_eq!(report.stats.average_connect_time, 500.0);
        assert_eq!(report.state.status, ConnectionStatus::Disconnected);
        assert_eq!(report.successes().count(), 1);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(
            report.event_names(),
            vec![
                "connection_attempt",
                "connection_succeeded",
                "account_changed",
                "network_changed",
                "disconnect"
            ]
        );
        assert!(report.steps.iter().all(|s| s.result == StepResult::Applied));
        assert_eq!(report.steps[2].at, Timestamp::from_millis(1_500));
    }

    #[test]
    fn test_ignored_steps_are_reported() {
        let report = run_yaml("steps:\n  - disconnect: {}\n  - network_changed: { chain_id: 5 }\n");

        assert_eq!(report.steps[0].result, StepResult::Ignored);
        assert_eq!(report.steps[1].result, StepResult::Ignored);
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_strict_mode_rejections_do_not_abort() {
        let script = ReplayScript::from_yaml_str("steps:\n  - disconnect: {}\n  - initiate: { wallet_type: other }\n").unwrap();
        let runner = ReplayRunner::new(TrackerOptions {
            strict_preconditions: true,
            ..TrackerOptions::default()
        });

        let report = runner.run(&script).unwrap();
        assert_matches!(report.steps[0].result, StepResult::Rejected { .. });
        assert_eq!(report.steps[1].result, StepResult::Applied);
        assert_eq!(report.stats.total_attempts, 1);
    }

    #[test]
    fn test_expire_jumps_to_deadline() {
        let report = run_yaml("steps:\n  - initiate: { wallet_type: wallet_connect, timeout_ms: 30000 }\n  - expire: {}\n");

        assert_eq!(report.steps[1].result, StepResult::Applied);
        assert_eq!(report.steps[1].at, Timestamp::from_millis(31_000));
        assert_eq!(report.state.status, ConnectionStatus::Error);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.history[0].duration_ms, 30_000);
    }

    #[test]
    fn test_expire_without_deadline_is_ignored() {
        let report = run_yaml("steps:\n  - initiate: { wallet_type: metamask }\n  - expire: {}\n");
        assert_eq!(report.steps[1].result, StepResult::Ignored);
        assert_eq!(report.state.status, ConnectionStatus::Connecting);
    }

    #[test]
    fn test_invalid_address_aborts_with_step_index() {
        let script = ReplayScript::from_yaml_str(
            "steps:\n  - initiate: { wallet_type: metamask }\n  - success: { address: nope, chain_id: 1 }\n",
        )
        .unwrap();

        let err = ReplayRunner::default().run(&script).unwrap_err();
        assert_matches!(err, AppError::Replay { step: 1, .. });
    }

    #[test]
    fn test_text_and_json_rendering() {
        let report = run_yaml(&format!(
            "name: render\nsteps:\n  - set_session: {{ session_id: plr-1 }}\n  - initiate: {{ wallet_type: metamask }}\n  - wait: {{ ms: 120 }}\n  - success: {{ address: \"{ADDRESS_A}\", chain_id: 1 }}\n"
        ));

        let text = report.render(OutputFormat::Text).unwrap();
        assert!(text.contains("Replay: render"));
        assert!(text.contains("Success rate: 100.0%"));
        assert!(text.contains("Session: plr-1"));

        let json: serde_json::Value = serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["stats"]["total_attempts"], 1);
        assert_eq!(json["events"][0]["event"], "session_created");
        assert_eq!(json["session"]["is_authenticated"], true);
    }
}
