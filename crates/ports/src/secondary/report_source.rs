use std::future::Future;
use std::pin::Pin;

use domain::alert::entity::FieldMap;
use domain::ingest::error::EnrichError;

/// Secondary port for fetching the detailed report behind a content hash.
pub trait ReportSource: Send + Sync {
    /// Return every field the remote service exposes for `content_hash`.
    ///
    /// `RateLimited` must stay distinguishable from other failures so the
    /// caller can back off instead of giving up.
    fn fetch_report<'a>(
        &'a self,
        content_hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FieldMap, EnrichError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoReports;
    impl ReportSource for NoReports {
        fn fetch_report<'a>(
            &'a self,
            content_hash: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<FieldMap, EnrichError>> + Send + 'a>> {
            Box::pin(async move { Err(EnrichError::NotFound(content_hash.to_string())) })
        }
    }

    #[test]
    fn report_source_is_dyn_compatible() {
        let source: Box<dyn ReportSource> = Box::new(NoReports);
        let _ = source;
    }
}
