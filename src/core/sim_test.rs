#[cfg(test)]
mod sim_tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::tempdir;

    use crate::core::config::{ServerSpec, Settings};
    use crate::core::dispatch::mcp::ToolNames;
    use crate::core::dispatch::model::DeliveryMode;
    use crate::core::error::{ConfigError, UrgencyError};
    use crate::core::evaluator::UrgencyEvaluator;
    use crate::core::gate::Threshold;
    use crate::core::lifecycle::tests::{pid_recording_server, wait_until_gone};
    use crate::core::pipeline::{Notifier, ServerLauncher, Stage};
    use crate::core::signals::model::{Signal, SignalSet};

    // Answers initialize, channel listing and posting; appends "start"/"post" to $LOG.
    const FAKE_SLACK: &str = r#"
printf '%s' "$$" > "$LOG.pid"
printf 'start\n' >> "$LOG"
while IFS= read -r l; do
  id=$(printf '%s' "$l" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  case "$l" in
    *'"initialize"'*) body='{"serverInfo":{"name":"fake-slack","version":"1"}}' ;;
    *slack_list_channels*) body='{"content":[{"type":"text","text":"{\"ok\":true,\"channels\":[{\"id\":\"C1\",\"name\":\"general\"},{\"id\":\"C2\",\"name\":\"alerts\"}]}"}]}' ;;
    *slack_post_message*) printf 'post\n' >> "$LOG"; body='{"content":[{"type":"text","text":"{\"ok\":true,\"ts\":\"1700000000.1\"}"}]}' ;;
    *) body='{}' ;;
  esac
  printf '{"jsonrpc":"2.0","id":%s,"result":%s}\n' "$id" "$body"
done
"#;

    fn fake_slack(log: &Path) -> ServerLauncher {
        ServerLauncher {
            spec: ServerSpec {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), FAKE_SLACK.to_string()],
                env: HashMap::from([("LOG".to_string(), log.display().to_string())]),
            },
            startup_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            tools: ToolNames::default(),
        }
    }

    fn server_log(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn notifier(
        signals: SignalSet,
        threshold: f64,
        channel: &str,
        mode: DeliveryMode,
        launcher: Option<ServerLauncher>,
    ) -> Notifier {
        let evaluator = UrgencyEvaluator::new(signals, Threshold::new(threshold).unwrap()).unwrap();
        Notifier::new(evaluator, false, channel.to_string(), mode, 3000, launcher)
    }

    fn scenario_signals() -> SignalSet {
        SignalSet::new(vec![
            Signal::new("critical", 0.5),
            Signal::new("error", 0.3),
            Signal::new("production", 0.2),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn simulate_critical_production_alert() {
        let n = notifier(scenario_signals(), 0.7, "#alerts", DeliveryMode::Simulation, None);
        let reports = n.run(["Critical error in production database"]).await.into_result().unwrap();
        assert!(reports[0].evaluation.score() >= 0.7);
        assert!(reports[0].notified);
        assert_eq!(reports[0].stage, Stage::Completed);
    }

    #[tokio::test]
    async fn simulate_calm_text_skipped() {
        let n = notifier(scenario_signals(), 0.7, "#alerts", DeliveryMode::Simulation, None);
        let reports = n.run(["Daily backup completed"]).await.into_result().unwrap();
        assert_eq!(reports[0].evaluation.score(), 0.0);
        assert_eq!(reports[0].stage, Stage::Skipped);
    }

    #[tokio::test]
    async fn simulate_threshold_override() {
        let signals = SignalSet::new(vec![Signal::new("outage", 0.53)]).unwrap();

        let lowered = notifier(signals.clone(), 0.5, "#alerts", DeliveryMode::DryRun, None);
        let reports = lowered.run(["partial outage"]).await.into_result().unwrap();
        assert!((reports[0].evaluation.score() - 0.55).abs() < 0.01);
        assert!(reports[0].notified);

        let default = notifier(signals, 0.7, "#alerts", DeliveryMode::DryRun, None);
        let reports = default.run(["partial outage"]).await.into_result().unwrap();
        assert!(!reports[0].notified);
    }

    #[tokio::test]
    async fn live_unknown_channel_is_not_posted() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("server.log");
        let n = notifier(
            scenario_signals(),
            0.7,
            "#missing",
            DeliveryMode::Live,
            Some(fake_slack(&log)),
        );

        let summary = n.run(["Critical error in production database"]).await;
        assert_eq!(summary.reports[0].stage, Stage::Failed);
        let err = summary.into_result().unwrap_err();
        assert!(matches!(err, UrgencyError::DestinationNotFound(ref c) if c == "#missing"));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(server_log(&log), vec!["start"]);
        assert!(wait_until_gone(&dir.path().join("server.log.pid")).await);
    }

    #[tokio::test]
    async fn live_post_reaches_server() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("server.log");
        let n = notifier(
            scenario_signals(),
            0.7,
            "#alerts",
            DeliveryMode::Live,
            Some(fake_slack(&log)),
        );

        let reports = n.run(["Critical error in production database"]).await.into_result().unwrap();
        let outcome = reports[0].outcome.as_ref().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message_id.as_deref(), Some("1700000000.1"));
        assert_eq!(server_log(&log), vec!["start", "post"]);
        assert!(wait_until_gone(&dir.path().join("server.log.pid")).await);
    }

    #[tokio::test]
    async fn abandoned_run_kills_server() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("server.pid");
        // answers the handshake, then never replies to the channel listing
        let launcher = ServerLauncher {
            spec: pid_recording_server(&pid_file),
            startup_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tools: ToolNames::default(),
        };
        let n = notifier(scenario_signals(), 0.7, "#alerts", DeliveryMode::Live, Some(launcher));

        let run = n.run(["Critical error in production database"]);
        assert!(tokio::time::timeout(Duration::from_millis(1500), run).await.is_err());
        assert!(wait_until_gone(&pid_file).await);
    }

    #[tokio::test]
    async fn live_batch_starts_server_once() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("server.log");
        let n = notifier(
            scenario_signals(),
            0.7,
            "alerts",
            DeliveryMode::Live,
            Some(fake_slack(&log)),
        );

        let lines = [
            "Critical error in production database",
            "Daily backup completed",
            "critical error again, production still down",
        ];
        let reports = n.run(lines).await.into_result().unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].stage, Stage::Skipped);
        assert_eq!(server_log(&log), vec!["start", "post", "post"]);
    }

    #[tokio::test]
    async fn live_batch_without_urgent_lines_never_starts_server() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("server.log");
        let n = notifier(
            scenario_signals(),
            0.7,
            "#alerts",
            DeliveryMode::Live,
            Some(fake_slack(&log)),
        );
        n.run(["all good", "still fine"]).await.into_result().unwrap();
        assert!(server_log(&log).is_empty());
    }

    #[test]
    fn config_errors_surface_before_dispatch() {
        let settings = Settings::default();
        let err = Notifier::from_settings(&settings, None).err().unwrap();
        assert!(matches!(err, ConfigError::MissingChannel));

        let dir = tempdir().unwrap();
        let settings = Settings {
            mcp_config_path: Some(dir.path().join("absent.json")),
            ..Settings::default()
        };
        let err = Notifier::from_settings(&settings, Some("#alerts")).err().unwrap();
        assert!(matches!(err, ConfigError::Read { .. }));

        let settings = Settings {
            dry_run: true,
            ..Settings::default()
        };
        let n = Notifier::from_settings(&settings, Some("#alerts")).unwrap();
        assert_eq!(n.mode(), DeliveryMode::DryRun);
    }
}
