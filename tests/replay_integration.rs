use pretty_assertions::assert_eq;
use tempfile::TempDir;

use wallet_connection_tracker::application::{ReplayRunner, ReplayScript, StepResult};
use wallet_connection_tracker::config::{AppConfig, ConfigLoader};
use wallet_connection_tracker::services::tracker::AnalyticsEvent;
use wallet_connection_tracker::utils::cli::OutputFormat;
use wallet_connection_tracker::{Application, ConnectionStatus, Timestamp, TrackerOptions};

const METAMASK_ADDRESS: &str = "0xabc0000000000000000000000000000000000001";
const SWITCHED_ADDRESS: &str = "0xdef0000000000000000000000000000000000002";

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn connect_then_disconnect_scenario() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "basic.yaml",
        &format!(
            r#"
name: connect then disconnect
start_ms: 1000
steps:
  - initiate: {{ wallet_type: metamask }}
  - wait: {{ ms: 500 }}
  - success: {{ address: "{METAMASK_ADDRESS}", chain_id: 1 }}
  - disconnect: {{}}
"#
        ),
    );

    let script = ReplayScript::load(&script).await.unwrap();
    let report = ReplayRunner::default().run(&script).unwrap();

    assert_eq!(report.steps[0].status, ConnectionStatus::Connecting);
    assert_eq!(report.steps[2].status, ConnectionStatus::Connected);
    assert_eq!(report.steps[2].at, Timestamp::from_millis(1_500));

    assert_eq!(report.state.status, ConnectionStatus::Disconnected);
    assert_eq!(report.state.address, None);
    assert_eq!(report.stats.total_attempts, 1);
    assert_eq!(report.stats.successful_connections, 1);
    assert_eq!(report.stats.average_connect_time, 500.0);
    assert_eq!(report.stats.success_rate, 100.0);
    assert_eq!(report.history[0].duration_ms, 500);
}

#[tokio::test]
async fn correlated_session_json_script() {
    let dir = TempDir::new().unwrap();
    let script = write(
        &dir,
        "session.json",
        &serde_json::json!({
            "name": "correlated session",
            "steps": [
                { "set_session": { "session_id": "plr-1", "user_id": "user-9" } },
                { "initiate": { "wallet_type": "wallet_connect" } },
                { "wait": { "ms": 900 } },
                { "failure": { "message": "User rejected the request", "code": "4001" } },
                { "initiate": { "wallet_type": "metamask" } },
                { "wait": { "ms": 300 } },
                { "success": { "address": METAMASK_ADDRESS, "chain_id": 1 } },
                { "account_changed": { "address": SWITCHED_ADDRESS } },
                { "network_changed": { "chain_id": 137 } },
                { "disconnect": {} }
            ]
        })
        .to_string(),
    );

    let script = ReplayScript::load(&script).await.unwrap();
    let report = ReplayRunner::default().run(&script).unwrap();

    assert_eq!(
        report.event_names(),
        vec![
            "session_created",
            "connection_attempt",
            "connection_failed",
            "authentication_failure",
            "connection_attempt",
            "connection_succeeded",
            "wallet_connected",
            "account_changed",
            "network_changed",
            "disconnect",
            "wallet_disconnected",
        ]
    );
    assert!(report
        .events
        .iter()
        .all(|e| e.meta().session_id.as_deref() == Some("plr-1")));

    match &report.events[7] {
        AnalyticsEvent::AccountChanged {
            old_address,
            new_address,
            ..
        } => {
            assert_eq!(old_address.as_deref(), Some(METAMASK_ADDRESS));
            assert_eq!(new_address, SWITCHED_ADDRESS);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(report.stats.successful_connections, 1);
    assert_eq!(report.stats.failed_connections, 1);
    assert_eq!(report.stats.success_rate, 50.0);
    assert_eq!(report.successes().count(), 1);
    assert_eq!(report.failures().next().and_then(|r| r.error_code.clone()), Some("4001".to_string()));
    assert!(report.session.as_ref().is_some_and(|s| s.is_authenticated));
}

#[tokio::test]
async fn strict_replay_reports_rejections() {
    let script = ReplayScript::from_yaml_str(
        r#"
steps:
  - network_changed: { chain_id: 10 }
  - failure: { message: "no attempt" }
  - initiate: { wallet_type: coinbase, timeout_ms: 10000 }
  - expire: {}
"#,
    )
    .unwrap();

    let report = ReplayRunner::new(TrackerOptions {
        strict_preconditions: true,
        ..TrackerOptions::default()
    })
    .run(&script)
    .unwrap();

    let results: Vec<&StepResult> = report.steps.iter().map(|s| &s.result).collect();
    assert!(matches!(results[0], StepResult::Rejected { .. }));
    assert!(matches!(results[1], StepResult::Rejected { .. }));
    assert_eq!(results[2], &StepResult::Applied);
    assert_eq!(results[3], &StepResult::Applied);
    assert_eq!(report.state.error.as_ref().and_then(|e| e.code.as_deref()), Some("timeout"));
    assert_eq!(report.stats.failed_connections, 1);
}

#[tokio::test]
async fn application_replays_with_configured_sinks() {
    let dir = TempDir::new().unwrap();
    let config_path = write(
        &dir,
        "tracker.toml",
        &format!(
            "[tracker]\nhistory_capacity = 2\n\n[analytics]\nenable_channel_sink = true\nevents_file = \"{}\"\n",
            dir.path().join("events.jsonl").display()
        ),
    );

    let config: AppConfig = ConfigLoader::new()
        .with_config_path(&config_path)
        .without_env()
        .load()
        .await
        .unwrap();
    assert_eq!(config.tracker.history_capacity, 2);

    let mut steps = String::from("name: many attempts\nsteps:\n");
    for _ in 0..3 {
        steps.push_str("  - initiate: { wallet_type: metamask }\n  - wait: { ms: 10 }\n  - failure: { message: nope }\n");
    }
    let script = write(&dir, "many.yml", &steps);

    let app = Application::build(config).await.unwrap();
    let report = app.replay(&script).await.unwrap();
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.stats.failed_connections, 3);

    let text = report.render(OutputFormat::Text).unwrap();
    assert!(text.contains("Attempts: 3 total, 0 successful, 3 failed"));

    let summary = app.shutdown().await.unwrap().unwrap();
    assert_eq!(summary.delivered, 6);
    let written = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
    assert_eq!(written.lines().count(), 6);
}
