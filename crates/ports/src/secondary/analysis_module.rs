use std::future::Future;
use std::pin::Pin;

use domain::analysis::entity::{AnalysisStatus, AnalysisTicket, SampleRef};
use domain::analysis::error::AnalysisError;

/// Pluggable sample analyzer, selected by name from configuration.
pub trait AnalysisModule: Send + Sync {
    /// Registry name this module was built under.
    fn name(&self) -> &str;

    /// Submit a sample for analysis.
    fn analyze_sample<'a>(
        &'a self,
        sample: &'a SampleRef,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisTicket, AnalysisError>> + Send + 'a>>;

    fn check_status<'a>(
        &'a self,
        ticket: &'a AnalysisTicket,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisStatus, AnalysisError>> + Send + 'a>>;

    /// Release whatever the analyzer holds for this ticket.
    fn cleanup<'a>(
        &'a self,
        ticket: &'a AnalysisTicket,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'a>>;
}
