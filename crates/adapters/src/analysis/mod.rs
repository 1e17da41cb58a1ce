//! Static registry of analysis modules.
//!
//! Modules are selected by configuration name and built from a fixed
//! factory table.

pub mod cuckoo;

use std::sync::Arc;

use domain::analysis::entity::AnalyzerSettings;
use domain::analysis::error::AnalysisError;
use ports::secondary::analysis_module::AnalysisModule;

type Factory = fn(&AnalyzerSettings) -> Result<Arc<dyn AnalysisModule>, AnalysisError>;

const REGISTRY: &[(&str, Factory)] = &[("cuckoo", cuckoo::build)];

/// Build the analyzer registered under `settings.module`.
pub fn build_analyzer(settings: &AnalyzerSettings) -> Result<Arc<dyn AnalysisModule>, AnalysisError> {
    let factory = REGISTRY
        .iter()
        .find(|(name, _)| *name == settings.module)
        .map(|(_, factory)| factory)
        .ok_or_else(|| AnalysisError::UnknownModule(settings.module.clone()))?;
    factory(settings)
}
