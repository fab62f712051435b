//! flutter-smoke - run the Flutter smoke test against a local Appium server

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flutter_e2e::{SmokeConfig, SmokeTest};

#[derive(Parser, Debug)]
#[command(name = "flutter-smoke")]
#[command(author, version, about = "Smoke test a Flutter app through Appium", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Appium server URL
    #[arg(long, env = "APPIUM_SERVER_URL")]
    server_url: Option<String>,

    /// ValueKey of the widget to tap
    #[arg(short, long)]
    key: Option<String>,

    /// Session creation attempts
    #[arg(long)]
    max_retries: Option<u32>,

    /// Pause between session attempts in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Warm-up pause after session start in milliseconds
    #[arg(long)]
    warmup_ms: Option<u64>,

    /// Implicit element wait in milliseconds
    #[arg(long)]
    implicit_wait_ms: Option<u64>,

    /// Write a JSON report here, pass or fail
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(SmokeConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => SmokeConfig::load(path)?,
            None => SmokeConfig::default(),
        };

        if let Some(url) = self.server_url {
            config.server_url = url;
        }
        if let Some(key) = self.key {
            config.element_key = key;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }
        if let Some(ms) = self.warmup_ms {
            config.warmup_ms = ms;
        }
        if let Some(ms) = self.implicit_wait_ms {
            config.implicit_wait_ms = ms;
        }

        Ok((config, self.report))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Test failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (config, report_path) = args.into_config()?;

    let report = match SmokeTest::new(config).run().await {
        Ok(report) => report,
        Err(failure) => {
            if let Some(path) = &report_path {
                failure.report.save(path)?;
                println!("Report written to {}", path.display());
            }
            return Err(failure.error.into());
        }
    };

    if let Some(path) = report_path {
        report.save(&path)?;
        println!("Report written to {}", path.display());
    }

    println!(
        "✅ Smoke test passed ({} steps, {}ms)",
        report.steps.len(),
        report.duration_ms
    );
    Ok(())
}
