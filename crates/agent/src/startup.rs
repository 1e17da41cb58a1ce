use std::path::Path;
use std::sync::Arc;

use adapters::analysis::build_analyzer;
use adapters::intel::notification_feed::HttpNotificationFeed;
use adapters::intel::report_source::HttpReportSource;
use adapters::intel::retirement_client::HttpRetirementClient;
use adapters::storage::redb_alert_store::RedbAlertStore;
use adapters::storage::redb_rule_stat_store::RedbRuleStatStore;
use adapters::storage::{ALERTS_DB_FILE, RULE_STATS_DB_FILE};
use anyhow::Context;
use application::analysis_service::AnalysisAppService;
use application::ingest_pipeline::IngestPipeline;
use application::ingest_runner::IngestRunner;
use application::retry::RetryConfig;
use infrastructure::config::AgentConfig;
use infrastructure::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use infrastructure::logging::{ConsoleTarget, WorkerGuard, init_logging};
use ports::secondary::alert_store::AlertStore;
use ports::secondary::rule_stat_store::RuleStatStore;
use tracing::{Instrument, info, warn};

use crate::cli::Cli;

/// Load the config file and apply CLI overrides.
pub fn load_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let mut config = AgentConfig::load(Path::new(&cli.config))
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    if let Some(level) = cli.log_level {
        config.agent.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.agent.log_format = format;
    }
    Ok(config)
}

/// Initialize logging from the (already overridden) agent section.
pub fn init_agent_logging(
    config: &AgentConfig,
    console: ConsoleTarget,
) -> anyhow::Result<Option<WorkerGuard>> {
    let log_file = config.agent.log_file.as_deref().map(Path::new);
    let guard = init_logging(
        config.agent.log_level,
        config.agent.log_format,
        console,
        log_file,
    )?;
    Ok(guard)
}

/// Explicit application context: config plus store handles, built once
/// and passed by reference into everything that needs them.
pub struct AppContext {
    pub config: AgentConfig,
    pub alert_store: Arc<dyn AlertStore>,
    pub rule_stats: Arc<dyn RuleStatStore>,
}

impl AppContext {
    /// Open both redb stores under `agent.data_dir`.
    ///
    /// redb holds an exclusive file lock, so a second process pointed at
    /// the same directory fails here instead of racing the first.
    pub fn open(config: AgentConfig) -> anyhow::Result<Self> {
        let data_dir = config.agent.data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let alert_store = RedbAlertStore::open(&data_dir.join(ALERTS_DB_FILE))
            .context("failed to open alert store (is another feedsentinel running?)")?;
        let rule_stats = RedbRuleStatStore::open(&data_dir.join(RULE_STATS_DB_FILE))
            .context("failed to open rule stat store")?;

        info!(data_dir = %data_dir.display(), "stores opened");

        Ok(Self {
            config,
            alert_store: Arc::new(alert_store),
            rule_stats: Arc::new(rule_stats),
        })
    }

    /// Wire the HTTP intel clients into an ingestion pipeline.
    pub fn ingest_pipeline(&self) -> anyhow::Result<IngestPipeline> {
        let config = &self.config;
        let feed = HttpNotificationFeed::new(
            config.feed.url.clone(),
            config.feed.api_key.clone(),
            std::time::Duration::from_secs(config.feed.timeout_secs),
        )?;

        let mut pipeline = IngestPipeline::new(
            Arc::new(feed),
            Arc::clone(&self.alert_store),
            Arc::clone(&self.rule_stats),
        );

        if config.enrichment.enabled {
            let reports = HttpReportSource::new(
                config.enrichment.url.clone(),
                config.enrichment.api_key.clone(),
                config.enrichment.timeout(),
            )?;
            let retry = RetryConfig {
                max_retries: config.enrichment.max_retries,
                backoff_schedule: vec![config.enrichment.backoff()],
                timeout: config.enrichment.timeout(),
                max_delay: config.enrichment.max_backoff(),
            };
            pipeline = pipeline.with_enricher(Arc::new(reports), retry);
        }

        if config.retirement.enabled {
            let client = HttpRetirementClient::new(
                config.retirement.url.clone(),
                config.retirement_key().to_string(),
                std::time::Duration::from_secs(config.retirement.timeout_secs),
            )?;
            pipeline = pipeline.with_retirement(Arc::new(client));
        }

        info!(
            enrichment = pipeline.enrichment_enabled(),
            retirement = pipeline.retirement_enabled(),
            "ingestion pipeline initialized"
        );
        Ok(pipeline)
    }

    pub fn ingest_runner(&self) -> anyhow::Result<IngestRunner> {
        let pipeline = self.ingest_pipeline()?;
        Ok(IngestRunner::new(
            Arc::new(pipeline),
            self.config.agent.run_timeout(),
        ))
    }

    /// Build the configured analyzer. Fails when analysis is disabled.
    pub fn analysis_service(&self) -> anyhow::Result<AnalysisAppService> {
        if !self.config.analysis.enabled {
            anyhow::bail!("analysis is disabled (set analysis.enabled: true)");
        }
        let module = build_analyzer(&self.config.analysis.settings())?;
        Ok(AnalysisAppService::new(
            module,
            Arc::clone(&self.alert_store),
        ))
    }
}

/// Run the polling daemon and block until shutdown.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = load_config(cli)?;

    // ── 2. Initialize logging ───────────────────────────────────────
    let _log_guard = init_agent_logging(&config, ConsoleTarget::Stdout)?;

    // Service root span: fields appear in every subsequent log entry
    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "feedsentinel",
        service.version = env!("CARGO_PKG_VERSION"),
    )
    .entered();

    info!(
        config_path = %cli.config,
        log_level = config.agent.log_level.as_str(),
        log_format = config.agent.log_format.as_str(),
        "feedsentinel starting"
    );

    // ── 3. Stores and pipeline ──────────────────────────────────────
    let poll_interval = config.agent.poll_interval();
    let ctx = AppContext::open(config)?;
    let runner = Arc::new(ctx.ingest_runner()?);

    // ── 4. Periodic ingestion ───────────────────────────────────────
    let cancel_token = crate::shutdown::create_shutdown_token()?;
    let ingest_cancel = cancel_token.clone();
    let ingest_runner = Arc::clone(&runner);
    let ingest_handle = tokio::spawn(
        async move {
            ingest_runner.run_periodic(poll_interval, ingest_cancel).await;
        }
        .in_current_span(),
    );

    // ── 5. Ready, wait for cancellation ─────────────────────────────
    info!(
        poll_interval_secs = poll_interval.as_secs(),
        "feedsentinel ready, waiting for shutdown signal"
    );
    cancel_token.cancelled().await;

    // ── 6. Shutdown ─────────────────────────────────────────────────
    info!("shutdown: waiting for ingestion loop to stop");
    if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, ingest_handle)
        .await
        .is_err()
    {
        warn!("ingestion loop did not stop in time");
    }

    info!("feedsentinel stopped");
    Ok(())
}
