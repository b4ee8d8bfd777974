use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::core::config::{ConfigManager, Overrides, Settings};
use crate::core::error::UrgencyError;
use crate::core::input::{batch_lines, InputSource};
use crate::core::pipeline::{InvocationReport, Notifier};

/// Exit code when the run is interrupted with Ctrl-C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Score text for urgency and post a notification when it crosses the threshold.
#[derive(Debug, Parser)]
#[command(name = "urgent-notifier", version, about)]
pub struct Args {
    /// Text to evaluate. Takes precedence over --file and piped input.
    pub text: Option<String>,

    /// Read the text from a file.
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Evaluate every non-empty line separately.
    #[arg(long)]
    pub lines: bool,

    /// Minimum score in [0, 1] that triggers a notification.
    #[arg(long, short = 't', env = "URGENCY_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Notify regardless of the score.
    #[arg(long)]
    pub always_notify: bool,

    /// Build the message but never contact the server.
    #[arg(long)]
    pub dry_run: bool,

    /// Pretend delivery succeeded without contacting the server.
    #[arg(
        long,
        env = "URGENCY_USE_SIMULATION",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub simulate: bool,

    /// Destination channel for this run.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Channel used when --channel is not given.
    #[arg(long, env = "SLACK_NOTIFICATION_CHANNEL")]
    pub default_channel: Option<String>,

    /// JSON signal table replacing the built-in one.
    #[arg(long)]
    pub signals: Option<PathBuf>,

    /// JSON settings file.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// MCP client configuration holding the server entry [default: ~/.cursor/mcp.json]
    #[arg(long)]
    pub mcp_config: Option<PathBuf>,

    /// Server entry name in the MCP configuration [default: slack]
    #[arg(long)]
    pub server: Option<String>,

    /// Print one JSON report per evaluation instead of a summary line.
    #[arg(long)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace). Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<LevelFilter>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            threshold: self.threshold,
            always_notify: self.always_notify,
            dry_run: self.dry_run,
            use_simulation: self.simulate,
            default_channel: self.default_channel.clone(),
            signals_path: self.signals.clone(),
            mcp_config_path: self.mcp_config.clone(),
            server_name: self.server.clone(),
        }
    }

    /// Settings file, then environment and flags on top.
    pub fn settings(&self) -> Result<Settings, UrgencyError> {
        let file_settings = match &self.settings {
            Some(path) => ConfigManager::new(path.clone()).load()?,
            None => Settings::default(),
        };
        Ok(file_settings.with_overrides(self.overrides())?)
    }
}

fn init_logging(level: Option<LevelFilter>) {
    let mut logger = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env();
    if let Some(level) = level {
        logger = logger.with_level(level);
    }
    if let Err(e) = logger.init() {
        eprintln!("failed to build logger instance: {e}");
    }
}

/// Parse arguments, run the pipeline and return the process exit code.
pub fn run() -> i32 {
    let args = Args::parse();
    init_logging(args.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Couldn't build Tokio runtime: {}", e);
            return 1;
        }
    };

    let result = runtime.block_on(execute(args));
    // stdin reads sit on blocking threads that may never finish
    runtime.shutdown_background();

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    }
}

async fn execute(args: Args) -> Result<i32, UrgencyError> {
    let settings = args.settings()?;
    let notifier = Notifier::from_settings(&settings, args.channel.as_deref())?;

    let source = InputSource::select(
        args.text.clone(),
        args.file.clone(),
        std::io::stdin().is_terminal(),
    )?;
    log::debug!("Reading input from {:?}", source);
    let content = source.read().await?;

    let texts: Vec<&str> = if args.lines {
        batch_lines(&content).collect()
    } else {
        vec![content.as_str()]
    };
    log::info!("Evaluating {} text(s) in {} mode", texts.len(), notifier.mode());

    let summary = tokio::select! {
        summary = notifier.run(texts) => summary,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, abandoning run");
            return Ok(EXIT_INTERRUPTED);
        }
    };

    for report in &summary.reports {
        print_report(report, args.json);
    }
    summary.into_result().map(|_| 0)
}

fn print_report(report: &InvocationReport, json: bool) {
    if !json {
        println!("{}", report.summary_line());
        return;
    }
    match serde_json::to_string(report) {
        Ok(line) => println!("{line}"),
        Err(e) => log::error!("Failed to serialize report: {}", e),
    }
}
