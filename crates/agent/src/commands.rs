use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use application::analysis_service::AnalysisAppService;
use application::ingest_runner::IngestRunner;
use domain::alert::entity::FieldMap;
use domain::alert::query::AlertQuery;
use domain::stats::entity::sort_by_count_desc;
use ports::secondary::alert_store::AlertStore;
use ports::secondary::rule_stat_store::RuleStatStore;

use crate::cli::OutputFormat;

// ── Ingestion ───────────────────────────────────────────────────────────

pub async fn cmd_once(runner: &IngestRunner, output: OutputFormat) -> Result<()> {
    let report = runner.trigger().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Ingestion run complete");
    println!("  Fetched:        {}", report.fetched);
    println!("  New alerts:     {}", report.new_alerts);
    println!("  Redelivered:    {}", report.redelivered);
    println!(
        "  Enriched:       {} (failed {}, skipped {})",
        report.enriched, report.enrich_failed, report.enrich_skipped
    );
    println!(
        "  Retired:        {} (partial {}, failed {})",
        report.retired, report.retire_partial, report.retire_failed
    );
    println!("  Duplicate keys: {}", report.duplicate_keys);
    println!("  Stat errors:    {}", report.stat_errors);
    println!("  Clean:          {}", yes_no(report.is_clean()));
    Ok(())
}

// ── Rule statistics ─────────────────────────────────────────────────────

pub fn cmd_stats(store: &dyn RuleStatStore, output: OutputFormat) -> Result<()> {
    let mut stats = store.list()?;
    sort_by_count_desc(&mut stats);

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No rule statistics recorded.");
        return Ok(());
    }

    println!("{:<48}  {:>10}", "RULE", "ALERTS");
    for stat in &stats {
        println!("{:<48}  {:>10}", truncate(&stat.rule_name, 48), stat.count);
    }

    let total: u64 = stats.iter().map(|s| s.count).sum();
    println!("\n{} rule(s), {total} alert(s) total.", stats.len());
    Ok(())
}

// ── Alerts ──────────────────────────────────────────────────────────────

pub fn cmd_alerts_list(
    store: &dyn AlertStore,
    query: &AlertQuery,
    output: OutputFormat,
) -> Result<()> {
    let alerts = store.query_alerts(query)?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("No alerts found.");
        return Ok(());
    }

    let now = now_ns();
    println!(
        "{:<20}  {:<32}  {:<40}  {:<8}  {:>14}",
        "ID", "RULE", "HASH", "ENRICHED", "FIRST SEEN"
    );
    for alert in &alerts {
        println!(
            "{:<20}  {:<32}  {:<40}  {:<8}  {:>14}",
            truncate(&alert.id, 20),
            truncate(&alert.rule_name, 32),
            truncate(&alert.content_hash, 40),
            yes_no(alert.is_enriched()),
            format_age(now, alert.first_seen_ns),
        );
    }

    println!(
        "\nShowing {} alert(s) (offset={}).",
        alerts.len(),
        query.offset
    );
    Ok(())
}

pub fn cmd_alert_show(store: &dyn AlertStore, id: &str, output: OutputFormat) -> Result<()> {
    let Some(alert) = store.get_alert(id)? else {
        anyhow::bail!("alert '{id}' not found");
    };

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&alert)?);
        return Ok(());
    }

    println!("Alert {}", alert.id);
    println!("  Rule:        {}", alert.rule_name);
    println!("  Hash:        {}", alert.content_hash);
    println!("  First seen:  {}", format_age(now_ns(), alert.first_seen_ns));
    println!("\nRaw fields:");
    print_fields(&alert.raw_fields);
    match alert.enrichment_fields {
        Some(ref fields) => {
            println!("\nEnrichment fields:");
            print_fields(fields);
        }
        None => println!("\nNot enriched."),
    }
    Ok(())
}

// ── Analysis ────────────────────────────────────────────────────────────

/// Polling parameters for `analyze --wait`.
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

pub async fn cmd_analyze(
    service: &AnalysisAppService,
    alert_id: &str,
    sample: &Path,
    wait: Option<WaitOptions>,
    output: OutputFormat,
) -> Result<()> {
    let ticket = service.submit(alert_id, sample).await?;

    let status = match wait {
        Some(opts) => {
            let status = service
                .wait_for_completion(&ticket, opts.poll_interval, opts.timeout)
                .await?;
            service.cleanup(&ticket).await?;
            Some(status)
        }
        None => None,
    };

    if output == OutputFormat::Json {
        let combined = serde_json::json!({
            "alert_id": alert_id,
            "ticket": ticket,
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    println!(
        "Sample submitted to {} (task {})",
        ticket.module, ticket.task_id
    );
    if let Some(status) = status {
        println!("Analysis finished: {status}");
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

fn print_fields(fields: &FieldMap) {
    if fields.is_empty() {
        println!("  (none)");
        return;
    }
    let width = fields.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in fields {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("  {key:<width$}  {}", truncate(&rendered, 100));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

fn yes_no(val: bool) -> &'static str {
    if val { "yes" } else { "no" }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

/// Render how long ago `then_ns` was, relative to `now_ns`.
fn format_age(now_ns: u64, then_ns: u64) -> String {
    if then_ns == 0 {
        return "-".to_string();
    }
    let seconds = now_ns.saturating_sub(then_ns) / 1_000_000_000;
    format!("{} ago", format_duration(seconds))
}

fn format_duration(seconds: u64) -> String {
    let d = seconds / 86_400;
    let h = (seconds % 86_400) / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if d > 0 {
        format!("{d}d {h:02}h")
    } else if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
