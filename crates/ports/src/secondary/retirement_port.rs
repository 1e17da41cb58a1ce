use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use domain::ingest::entity::RetirementResult;
use domain::ingest::error::RetireError;

/// Secondary port for marking notifications as consumed on the remote side.
///
/// Performs no local bookkeeping. A result with `confirmed < requested` is
/// returned as `Ok` and must be inspected by the caller.
pub trait RetirementPort: Send + Sync {
    fn retire<'a>(
        &'a self,
        alert_ids: &'a BTreeSet<String>,
    ) -> Pin<Box<dyn Future<Output = Result<RetirementResult, RetireError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;
    impl RetirementPort for AcceptAll {
        fn retire<'a>(
            &'a self,
            alert_ids: &'a BTreeSet<String>,
        ) -> Pin<Box<dyn Future<Output = Result<RetirementResult, RetireError>> + Send + 'a>>
        {
            let n = alert_ids.len();
            Box::pin(async move { Ok(RetirementResult::new(n, n)) })
        }
    }

    #[test]
    fn retirement_port_is_dyn_compatible() {
        let port: Box<dyn RetirementPort> = Box::new(AcceptAll);
        let _ = port;
    }
}
