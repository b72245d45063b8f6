pub mod analysis;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod progress;
pub mod reorganize;
pub mod scanner;

pub use classify::{ClassificationAdapter, ClassificationResult, ClassifierConfig};
pub use config::{AppConfig, CategorySet};
pub use engine::{AnalysisEngine, AnalysisSummary, FileAnalysis};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use reorganize::{
    ApplyReport, ReorganizationPlan, ReorganizationState, Reorganizer, RollbackOutcome,
    RollbackReport,
};
pub use scanner::FileRecord;
