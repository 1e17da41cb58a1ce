use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use domain::alert::entity::Alert;
use domain::alert::error::AlertError;
use domain::ingest::entity::{IngestReport, RunPhase};
use domain::ingest::error::{EnrichError, IngestError};
use ports::secondary::alert_store::AlertStore;
use ports::secondary::feed_source::NotificationFeed;
use ports::secondary::report_source::ReportSource;
use ports::secondary::retirement_port::RetirementPort;
use ports::secondary::rule_stat_store::RuleStatStore;
use tracing::{debug, error, info, warn};

use crate::retry::{RetryConfig, retry_with_backoff};

/// Ingestion pipeline application service.
///
/// One run pulls the feed, then processes the batch strictly in order:
/// dedupe on alert id, store, bump the rule counter, enrich (best-effort),
/// and retire remotely (best-effort). Store and counter updates are
/// authoritative and happen before anything that talks to a secondary
/// service, so a flaky enrichment or retirement endpoint can never cause
/// double counting on a later run.
///
/// The pipeline assumes a single writer: the `exists`/`insert` pair is not
/// atomic across runs. `IngestRunner` provides the run-level exclusion.
pub struct IngestPipeline {
    feed: Arc<dyn NotificationFeed>,
    alert_store: Arc<dyn AlertStore>,
    rule_stats: Arc<dyn RuleStatStore>,
    enricher: Option<Arc<dyn ReportSource>>,
    enrich_retry: RetryConfig,
    retirement: Option<Arc<dyn RetirementPort>>,
}

/// Mutable state scoped to a single run.
#[derive(Default)]
struct RunState {
    report: IngestReport,
    /// Set once the enrichment service keeps throttling us; later alerts
    /// in the same run are stored without enrichment.
    enrichment_paused: bool,
}

impl IngestPipeline {
    pub fn new(
        feed: Arc<dyn NotificationFeed>,
        alert_store: Arc<dyn AlertStore>,
        rule_stats: Arc<dyn RuleStatStore>,
    ) -> Self {
        Self {
            feed,
            alert_store,
            rule_stats,
            enricher: None,
            enrich_retry: RetryConfig::default(),
            retirement: None,
        }
    }

    /// Enable enrichment of newly stored alerts.
    #[must_use]
    pub fn with_enricher(mut self, enricher: Arc<dyn ReportSource>, retry: RetryConfig) -> Self {
        self.enricher = Some(enricher);
        self.enrich_retry = retry;
        self
    }

    /// Enable remote retirement of processed and re-delivered alerts.
    #[must_use]
    pub fn with_retirement(mut self, retirement: Arc<dyn RetirementPort>) -> Self {
        self.retirement = Some(retirement);
        self
    }

    pub fn enrichment_enabled(&self) -> bool {
        self.enricher.is_some()
    }

    pub fn retirement_enabled(&self) -> bool {
        self.retirement.is_some()
    }

    /// Execute one ingestion run.
    ///
    /// A feed failure aborts the run before any alert is touched. Store
    /// failures abort the run at the failing alert; alerts already processed
    /// stay stored. Enrichment and retirement failures are isolated to the
    /// alert they concern.
    pub async fn run_once(&self) -> Result<IngestReport, IngestError> {
        debug!(phase = %RunPhase::Fetching, "fetching notification feed");
        let alerts = match self.feed.fetch_notifications().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(phase = %RunPhase::Fetching, error = %e, "feed fetch failed, run aborted");
                return Err(e.into());
            }
        };

        let mut state = RunState::default();
        state.report.fetched = alerts.len();

        for alert in alerts {
            self.process_alert(alert, &mut state).await?;
        }

        let report = state.report;
        info!(
            phase = %RunPhase::Done,
            fetched = report.fetched,
            new_alerts = report.new_alerts,
            redelivered = report.redelivered,
            enriched = report.enriched,
            enrich_failed = report.enrich_failed,
            enrich_skipped = report.enrich_skipped,
            retired = report.retired,
            retire_partial = report.retire_partial,
            retire_failed = report.retire_failed,
            "ingestion run complete"
        );
        Ok(report)
    }

    async fn process_alert(&self, mut alert: Alert, state: &mut RunState) -> Result<(), IngestError> {
        debug!(phase = %RunPhase::Processing, alert_id = %alert.id, "processing alert");

        if self.alert_store.exists(&alert.id)? {
            debug!(
                phase = %RunPhase::Skipping,
                alert_id = %alert.id,
                "alert already stored, treating as re-delivery"
            );
            state.report.redelivered += 1;
            self.retire(&alert.id, state).await;
            return Ok(());
        }

        alert.first_seen_ns = now_ns();
        match self.alert_store.insert(&alert) {
            Ok(()) => {}
            Err(AlertError::DuplicateKey(id)) => {
                error!(
                    alert_id = %id,
                    "store rejected insert as duplicate after a negative exists check, skipping alert"
                );
                state.report.duplicate_keys += 1;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        state.report.new_alerts += 1;

        match self.rule_stats.increment(&alert.rule_name) {
            Ok(count) => debug!(
                phase = %RunPhase::Storing,
                alert_id = %alert.id,
                rule = %alert.rule_name,
                count,
                "alert stored"
            ),
            Err(e) => {
                error!(
                    alert_id = %alert.id,
                    rule = %alert.rule_name,
                    error = %e,
                    "rule stat increment failed after insert"
                );
                state.report.stat_errors += 1;
            }
        }

        self.enrich(&alert, state).await;
        self.retire(&alert.id, state).await;
        Ok(())
    }

    async fn enrich(&self, alert: &Alert, state: &mut RunState) {
        let Some(ref enricher) = self.enricher else {
            return;
        };

        if state.enrichment_paused || alert.content_hash.is_empty() {
            debug!(alert_id = %alert.id, paused = state.enrichment_paused, "enrichment skipped");
            state.report.enrich_skipped += 1;
            return;
        }

        debug!(phase = %RunPhase::Enriching, alert_id = %alert.id, hash = %alert.content_hash, "requesting report");
        let result = retry_with_backoff(&self.enrich_retry, || {
            enricher.fetch_report(&alert.content_hash)
        })
        .await;

        match result {
            Ok(fields) => match self.alert_store.merge_fields(&alert.id, &fields) {
                Ok(()) => {
                    state.report.enriched += 1;
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "failed to merge enrichment fields");
                    state.report.enrich_failed += 1;
                }
            },
            Err(EnrichError::NotFound(hash)) => {
                info!(alert_id = %alert.id, hash = %hash, "no enrichment report available");
                state.report.enrich_failed += 1;
            }
            Err(e @ EnrichError::RateLimited { .. }) => {
                warn!(
                    alert_id = %alert.id,
                    error = %e,
                    "enrichment still rate limited, pausing enrichment for the rest of this run"
                );
                state.enrichment_paused = true;
                state.report.enrich_failed += 1;
            }
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "enrichment failed, alert kept without it");
                state.report.enrich_failed += 1;
            }
        }
    }

    async fn retire(&self, alert_id: &str, state: &mut RunState) {
        let Some(ref retirement) = self.retirement else {
            return;
        };

        debug!(phase = %RunPhase::Retiring, alert_id = %alert_id, "retiring notification");
        let ids = BTreeSet::from([alert_id.to_string()]);
        match retirement.retire(&ids).await {
            Ok(result) if result.is_complete() => {
                state.report.retired += 1;
            }
            Ok(result) => {
                warn!(
                    alert_id = %alert_id,
                    requested = result.requested,
                    confirmed = result.confirmed,
                    "partial retirement, notification may be redelivered"
                );
                state.report.retire_partial += 1;
            }
            Err(e) => {
                warn!(alert_id = %alert_id, error = %e, "retirement failed");
                state.report.retire_failed += 1;
            }
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_runner::IngestRunner;
    use domain::alert::entity::FieldMap;
    use domain::alert::query::AlertQuery;
    use domain::ingest::entity::RetirementResult;
    use domain::ingest::error::{FeedError, RetireError};
    use ports::test_utils::{MemoryAlertStore, MemoryRuleStatStore};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn alert(id: &str, hash: &str, rule: &str) -> Alert {
        let mut fields = FieldMap::new();
        fields.insert("id".into(), id.into());
        fields.insert("sha1".into(), hash.into());
        fields.insert("ruleset_name".into(), rule.into());
        Alert::from_fields(fields).unwrap()
    }

    // ── Mock feed ──────────────────────────────────────────────────

    enum FeedReply {
        Batch(Vec<Alert>),
        Transport,
        Malformed,
    }

    struct ScriptedFeed {
        replies: Mutex<VecDeque<FeedReply>>,
    }

    impl ScriptedFeed {
        fn new(replies: Vec<FeedReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    impl NotificationFeed for ScriptedFeed {
        fn fetch_notifications<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Alert>, FeedError>> + Send + 'a>> {
            let reply = self.replies.lock().unwrap().pop_front();
            Box::pin(async move {
                match reply {
                    Some(FeedReply::Batch(alerts)) => Ok(alerts),
                    Some(FeedReply::Transport) => {
                        Err(FeedError::Transport("connection refused".to_string()))
                    }
                    Some(FeedReply::Malformed) => {
                        Err(FeedError::Malformed("missing 'notifications'".to_string()))
                    }
                    None => Ok(vec![]),
                }
            })
        }
    }

    // ── Mock enrichment ────────────────────────────────────────────

    #[derive(Clone)]
    enum ReportReply {
        Fields(serde_json::Value),
        NotFound,
        RateLimited,
        /// Rate limited with an advertised `Retry-After` in seconds.
        Throttled(u64),
        Transport,
    }

    struct MockReports {
        reply: ReportReply,
        calls: AtomicU32,
    }

    impl MockReports {
        fn new(reply: ReportReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl ReportSource for MockReports {
        fn fetch_report<'a>(
            &'a self,
            content_hash: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<FieldMap, EnrichError>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let reply = self.reply.clone();
            Box::pin(async move {
                match reply {
                    ReportReply::Fields(serde_json::Value::Object(map)) => Ok(map),
                    ReportReply::Fields(_) => Err(EnrichError::Malformed("not an object".into())),
                    ReportReply::NotFound => Err(EnrichError::NotFound(content_hash.to_string())),
                    ReportReply::RateLimited => Err(EnrichError::RateLimited {
                        retry_after_secs: None,
                    }),
                    ReportReply::Throttled(secs) => Err(EnrichError::RateLimited {
                        retry_after_secs: Some(secs),
                    }),
                    ReportReply::Transport => Err(EnrichError::Transport("timeout".into())),
                }
            })
        }
    }

    // ── Mock retirement ────────────────────────────────────────────

    struct MockRetirement {
        /// `(received, deleted)` reported back, or `None` for a transport error.
        reply: Option<(usize, usize)>,
        calls: Mutex<Vec<BTreeSet<String>>>,
    }

    impl MockRetirement {
        fn confirming() -> Arc<Self> {
            Self::replying(Some((1, 1)))
        }

        fn replying(reply: Option<(usize, usize)>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl RetirementPort for MockRetirement {
        fn retire<'a>(
            &'a self,
            alert_ids: &'a BTreeSet<String>,
        ) -> Pin<Box<dyn Future<Output = Result<RetirementResult, RetireError>> + Send + 'a>>
        {
            self.calls.lock().unwrap().push(alert_ids.clone());
            let reply = self.reply;
            Box::pin(async move {
                match reply {
                    Some((received, deleted)) => Ok(RetirementResult::new(received, deleted)),
                    None => Err(RetireError::Transport("connection reset".into())),
                }
            })
        }
    }

    // ── Store doubles with injected faults ─────────────────────────

    /// Always answers `exists` with `false`, exercising the insert backstop.
    struct BlindStore(MemoryAlertStore);

    impl AlertStore for BlindStore {
        fn exists(&self, _id: &str) -> Result<bool, AlertError> {
            Ok(false)
        }
        fn insert(&self, alert: &Alert) -> Result<(), AlertError> {
            self.0.insert(alert)
        }
        fn merge_fields(&self, id: &str, fields: &FieldMap) -> Result<(), AlertError> {
            self.0.merge_fields(id, fields)
        }
        fn find_by_rule(&self, rule_name: &str) -> Result<bool, AlertError> {
            self.0.find_by_rule(rule_name)
        }
        fn get_alert(&self, id: &str) -> Result<Option<Alert>, AlertError> {
            self.0.get_alert(id)
        }
        fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError> {
            self.0.query_alerts(query)
        }
        fn alert_count(&self) -> Result<usize, AlertError> {
            self.0.alert_count()
        }
    }

    /// Fails every read.
    struct UnavailableStore;

    impl AlertStore for UnavailableStore {
        fn exists(&self, _id: &str) -> Result<bool, AlertError> {
            Err(AlertError::QueryFailed("database locked".into()))
        }
        fn insert(&self, _alert: &Alert) -> Result<(), AlertError> {
            Err(AlertError::StoreFailed("database locked".into()))
        }
        fn merge_fields(&self, _id: &str, _fields: &FieldMap) -> Result<(), AlertError> {
            Err(AlertError::StoreFailed("database locked".into()))
        }
        fn find_by_rule(&self, _rule_name: &str) -> Result<bool, AlertError> {
            Err(AlertError::QueryFailed("database locked".into()))
        }
        fn get_alert(&self, _id: &str) -> Result<Option<Alert>, AlertError> {
            Err(AlertError::QueryFailed("database locked".into()))
        }
        fn query_alerts(&self, _query: &AlertQuery) -> Result<Vec<Alert>, AlertError> {
            Err(AlertError::QueryFailed("database locked".into()))
        }
        fn alert_count(&self) -> Result<usize, AlertError> {
            Err(AlertError::QueryFailed("database locked".into()))
        }
    }

    fn no_retry() -> RetryConfig {
        RetryConfig::single_attempt(Duration::from_secs(1))
    }

    struct Harness {
        store: Arc<MemoryAlertStore>,
        stats: Arc<MemoryRuleStatStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryAlertStore::new()),
                stats: Arc::new(MemoryRuleStatStore::new()),
            }
        }

        fn pipeline(&self, feed: Arc<dyn NotificationFeed>) -> IngestPipeline {
            IngestPipeline::new(
                feed,
                Arc::clone(&self.store) as Arc<dyn AlertStore>,
                Arc::clone(&self.stats) as Arc<dyn RuleStatStore>,
            )
        }
    }

    #[tokio::test]
    async fn redelivery_across_runs_is_not_recounted() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![
            FeedReply::Batch(vec![alert("1", "h1", "R1")]),
            FeedReply::Batch(vec![alert("1", "h1", "R1")]),
        ]);
        let retirement = MockRetirement::confirming();
        let pipeline = h
            .pipeline(feed)
            .with_retirement(Arc::clone(&retirement) as Arc<dyn RetirementPort>);

        let first = pipeline.run_once().await.unwrap();
        assert_eq!(first.new_alerts, 1);
        assert_eq!(first.redelivered, 0);
        assert_eq!(h.store.alert_count().unwrap(), 1);
        assert_eq!(h.stats.count("R1"), 1);

        let second = pipeline.run_once().await.unwrap();
        assert_eq!(second.new_alerts, 0);
        assert_eq!(second.redelivered, 1);
        assert_eq!(h.store.alert_count().unwrap(), 1);
        assert_eq!(h.stats.count("R1"), 1);
        // Retirement attempted again for the re-delivered notification.
        assert_eq!(retirement.call_count(), 2);
        assert_eq!(second.retired, 1);
    }

    #[tokio::test]
    async fn stats_aggregate_per_rule() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("2", "h2", "R1"),
            alert("3", "h3", "R2"),
        ])]);

        let report = h.pipeline(feed).run_once().await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.new_alerts, 3);
        assert_eq!(h.stats.count("R1"), 2);
        assert_eq!(h.stats.count("R2"), 1);
        assert!(h.store.find_by_rule("R1").unwrap());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn duplicate_id_within_one_batch_counted_once() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("1", "h1", "R1"),
        ])]);

        let report = h.pipeline(feed).run_once().await.unwrap();

        assert_eq!(report.new_alerts, 1);
        assert_eq!(report.redelivered, 1);
        assert_eq!(h.stats.count("R1"), 1);
    }

    #[tokio::test]
    async fn partial_retirement_warns_without_retry() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
        let retirement = MockRetirement::replying(Some((2, 1)));
        let pipeline = h
            .pipeline(feed)
            .with_retirement(Arc::clone(&retirement) as Arc<dyn RetirementPort>);

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.retire_partial, 1);
        assert_eq!(report.retired, 0);
        assert_eq!(retirement.call_count(), 1);
        assert!(h.store.exists("1").unwrap());
        assert_eq!(h.stats.count("R1"), 1);
    }

    #[tokio::test]
    async fn retirement_failure_is_isolated() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("2", "h2", "R1"),
        ])]);
        let retirement = MockRetirement::replying(None);
        let pipeline = h
            .pipeline(feed)
            .with_retirement(Arc::clone(&retirement) as Arc<dyn RetirementPort>);

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.new_alerts, 2);
        assert_eq!(report.retire_failed, 2);
        assert_eq!(h.stats.count("R1"), 2);
    }

    #[tokio::test]
    async fn retirement_requests_single_id() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("42", "h", "R1")])]);
        let retirement = MockRetirement::confirming();
        let pipeline = h
            .pipeline(feed)
            .with_retirement(Arc::clone(&retirement) as Arc<dyn RetirementPort>);

        pipeline.run_once().await.unwrap();

        let calls = retirement.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], BTreeSet::from(["42".to_string()]));
    }

    #[tokio::test]
    async fn feed_transport_error_mutates_nothing() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Transport]);
        let retirement = MockRetirement::confirming();
        let pipeline = h
            .pipeline(feed)
            .with_retirement(Arc::clone(&retirement) as Arc<dyn RetirementPort>);

        let err = pipeline.run_once().await.unwrap_err();

        assert!(matches!(err, IngestError::Feed(FeedError::Transport(_))));
        assert_eq!(h.store.alert_count().unwrap(), 0);
        assert!(h.stats.list().unwrap().is_empty());
        assert_eq!(retirement.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_feed_aborts_run() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Malformed]);

        let err = h.pipeline(feed).run_once().await.unwrap_err();

        assert!(matches!(err, IngestError::Feed(FeedError::Malformed(_))));
        assert_eq!(h.store.alert_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn successful_enrichment_is_merged() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
        let reports = MockReports::new(ReportReply::Fields(json!({"positives": 40, "total": 60})));
        let pipeline = h
            .pipeline(feed)
            .with_enricher(Arc::clone(&reports) as Arc<dyn ReportSource>, no_retry());

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.enriched, 1);
        let stored = h.store.get_alert("1").unwrap().unwrap();
        let enrichment = stored.enrichment_fields.unwrap();
        assert_eq!(enrichment.get("positives"), Some(&json!(40)));
        assert_eq!(stored.raw_fields.get("sha1"), Some(&json!("h1")));
    }

    #[tokio::test]
    async fn enrichment_failures_keep_alert_and_stats() {
        for reply in [
            ReportReply::NotFound,
            ReportReply::RateLimited,
            ReportReply::Transport,
        ] {
            let h = Harness::new();
            let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
            let reports = MockReports::new(reply);
            let pipeline = h
                .pipeline(feed)
                .with_enricher(Arc::clone(&reports) as Arc<dyn ReportSource>, no_retry());

            let report = pipeline.run_once().await.unwrap();

            assert_eq!(report.new_alerts, 1);
            assert_eq!(report.enrich_failed, 1);
            let stored = h.store.get_alert("1").unwrap().unwrap();
            assert!(stored.enrichment_fields.is_none());
            assert_eq!(h.stats.count("R1"), 1);
        }
    }

    #[tokio::test]
    async fn rate_limit_pauses_enrichment_for_rest_of_run() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("2", "h2", "R1"),
            alert("3", "h3", "R2"),
        ])]);
        let reports = MockReports::new(ReportReply::RateLimited);
        let pipeline = h
            .pipeline(feed)
            .with_enricher(Arc::clone(&reports) as Arc<dyn ReportSource>, no_retry());

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(reports.calls.load(Ordering::Relaxed), 1);
        assert_eq!(report.enrich_failed, 1);
        assert_eq!(report.enrich_skipped, 2);
        assert_eq!(report.new_alerts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn long_retry_after_does_not_stall_the_batch() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("2", "h2", "R1"),
            alert("3", "h3", "R1"),
        ])]);
        let reports = MockReports::new(ReportReply::Throttled(86_400));
        let pipeline = h.pipeline(feed).with_enricher(
            Arc::clone(&reports) as Arc<dyn ReportSource>,
            RetryConfig::default(),
        );
        let runner = IngestRunner::new(Arc::new(pipeline), Duration::from_secs(1800));

        let start = tokio::time::Instant::now();
        let report = runner.trigger().await.unwrap();

        assert_eq!(report.new_alerts, 3);
        assert_eq!(h.store.alert_count().unwrap(), 3);
        assert_eq!(h.stats.count("R1"), 3);
        assert_eq!(reports.calls.load(Ordering::Relaxed), 1);
        assert_eq!(report.enrich_failed, 1);
        assert_eq!(report.enrich_skipped, 2);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn short_retry_after_is_honoured() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
        let reports = MockReports::new(ReportReply::Throttled(20));
        let pipeline = h.pipeline(feed).with_enricher(
            Arc::clone(&reports) as Arc<dyn ReportSource>,
            RetryConfig::default(),
        );

        let start = tokio::time::Instant::now();
        let report = pipeline.run_once().await.unwrap();

        // One retry after the advertised wait, then the pause kicks in.
        assert_eq!(reports.calls.load(Ordering::Relaxed), 2);
        assert_eq!(report.enrich_failed, 1);
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn empty_hash_skips_enrichment() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "", "R1")])]);
        let reports = MockReports::new(ReportReply::NotFound);
        let pipeline = h
            .pipeline(feed)
            .with_enricher(Arc::clone(&reports) as Arc<dyn ReportSource>, no_retry());

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(reports.calls.load(Ordering::Relaxed), 0);
        assert_eq!(report.enrich_skipped, 1);
    }

    #[tokio::test]
    async fn redelivery_is_not_re_enriched() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![
            FeedReply::Batch(vec![alert("1", "h1", "R1")]),
            FeedReply::Batch(vec![alert("1", "h1", "R1")]),
        ]);
        let reports = MockReports::new(ReportReply::Fields(json!({"positives": 1})));
        let pipeline = h
            .pipeline(feed)
            .with_enricher(Arc::clone(&reports) as Arc<dyn ReportSource>, no_retry());

        pipeline.run_once().await.unwrap();
        pipeline.run_once().await.unwrap();

        assert_eq!(reports.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn duplicate_key_backstop_skips_alert() {
        let store = Arc::new(BlindStore(MemoryAlertStore::new()));
        let stats = Arc::new(MemoryRuleStatStore::new());
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![
            alert("1", "h1", "R1"),
            alert("1", "h1", "R1"),
            alert("2", "h2", "R1"),
        ])]);
        let pipeline = IngestPipeline::new(
            feed,
            Arc::clone(&store) as Arc<dyn AlertStore>,
            Arc::clone(&stats) as Arc<dyn RuleStatStore>,
        );

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.duplicate_keys, 1);
        assert_eq!(report.new_alerts, 2);
        assert_eq!(stats.count("R1"), 2);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn unavailable_store_aborts_run() {
        let stats = Arc::new(MemoryRuleStatStore::new());
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
        let pipeline = IngestPipeline::new(
            feed,
            Arc::new(UnavailableStore),
            Arc::clone(&stats) as Arc<dyn RuleStatStore>,
        );

        let err = pipeline.run_once().await.unwrap_err();

        assert!(matches!(err, IngestError::Store(AlertError::QueryFailed(_))));
        assert!(stats.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn optional_stages_disabled_by_default() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);
        let pipeline = h.pipeline(feed);

        assert!(!pipeline.enrichment_enabled());
        assert!(!pipeline.retirement_enabled());

        let report = pipeline.run_once().await.unwrap();
        assert_eq!(report.enriched + report.enrich_failed + report.enrich_skipped, 0);
        assert_eq!(report.retired + report.retire_partial + report.retire_failed, 0);
    }

    #[tokio::test]
    async fn first_seen_is_stamped_on_insert() {
        let h = Harness::new();
        let feed = ScriptedFeed::new(vec![FeedReply::Batch(vec![alert("1", "h1", "R1")])]);

        h.pipeline(feed).run_once().await.unwrap();

        let stored = h.store.get_alert("1").unwrap().unwrap();
        assert!(stored.first_seen_ns > 0);
    }
}
