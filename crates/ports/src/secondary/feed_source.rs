use std::future::Future;
use std::pin::Pin;

use domain::alert::entity::Alert;
use domain::ingest::error::FeedError;

/// Secondary port for pulling the pending notification batch.
///
/// Uses `Pin<Box<dyn Future>>` return type (instead of RPITIT) so the trait
/// is dyn-compatible and can be used as `Arc<dyn NotificationFeed>`.
pub trait NotificationFeed: Send + Sync {
    /// Fetch every pending notification, in the order the source delivers them.
    ///
    /// Read-only with respect to remote state. Errors are returned as-is;
    /// retrying is the caller's decision.
    fn fetch_notifications<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Alert>, FeedError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyFeed;
    impl NotificationFeed for EmptyFeed {
        fn fetch_notifications<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Alert>, FeedError>> + Send + 'a>> {
            Box::pin(async { Ok(vec![]) })
        }
    }

    #[test]
    fn notification_feed_is_dyn_compatible() {
        let feed: Box<dyn NotificationFeed> = Box::new(EmptyFeed);
        let _ = feed;
    }
}
