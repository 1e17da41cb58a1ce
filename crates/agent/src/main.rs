#![forbid(unsafe_code)]

mod cli;
mod commands;
mod shutdown;
mod startup;

use std::time::Duration;

use anyhow::Result;
use domain::alert::query::AlertQuery;
use infrastructure::logging::ConsoleTarget;

use cli::{Cli, Command};
use commands::WaitOptions;
use startup::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();

    match cli.command {
        Some(Command::Version) => {
            println!("feedsentinel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }

        // No subcommand = run the polling daemon
        None => startup::run(&cli).await,

        Some(ref command) => run_command(&cli, command).await,
    }
}

/// One-shot commands: open the stores, do the work, exit.
async fn run_command(cli: &Cli, command: &Command) -> Result<()> {
    let output = cli.output;
    let config = startup::load_config(cli)?;
    let _log_guard = startup::init_agent_logging(&config, ConsoleTarget::Stderr)?;

    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "feedsentinel",
        service.version = env!("CARGO_PKG_VERSION"),
    )
    .entered();

    let ctx = AppContext::open(config)?;

    match command {
        Command::Once => {
            let runner = ctx.ingest_runner()?;
            commands::cmd_once(&runner, output).await
        }

        Command::Stats => commands::cmd_stats(ctx.rule_stats.as_ref(), output),

        Command::Alerts {
            rule,
            enriched,
            limit,
            offset,
        } => {
            let query = AlertQuery {
                rule_name: rule.clone(),
                enriched: enriched.map(cli::EnrichedFilter::as_bool),
                limit: *limit,
                offset: *offset,
            };
            commands::cmd_alerts_list(ctx.alert_store.as_ref(), &query, output)
        }

        Command::Alert { id } => commands::cmd_alert_show(ctx.alert_store.as_ref(), id, output),

        Command::Analyze {
            alert_id,
            sample,
            wait,
        } => {
            let service = ctx.analysis_service()?;
            let wait = wait.then(|| WaitOptions {
                poll_interval: Duration::from_secs(ctx.config.analysis.poll_interval_secs),
                timeout: Duration::from_secs(ctx.config.analysis.wait_timeout_secs),
            });
            commands::cmd_analyze(&service, alert_id, sample, wait, output).await
        }

        Command::Version => Ok(()),
    }
}
