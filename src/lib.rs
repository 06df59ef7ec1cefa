//! Final-year-project similarity analysis and evaluation panel planning.
//!
//! Project texts are vectorized with TF-IDF, similar pairs are mined and
//! explained, projects are labelled with research domains, and supervision
//! groups are packed into evaluation panels under instructor-capacity limits.
//! [`pipeline::analyze`] runs the whole flow; [`report::write_outputs`]
//! serializes the result.

pub mod allocate;
pub mod cancel;
pub mod categorize;
pub mod config;
pub mod error;
pub mod explain;
pub mod helper;
pub mod model;
pub mod overlap;
pub mod pipeline;
pub mod report;
pub mod roster;
pub mod similarity;
pub mod spreadsheet;
pub mod text;
pub mod tfidf;

pub use cancel::CancelToken;
pub use config::{AllocationConstraints, AnalysisConfig};
pub use error::{CategorizerError, PlannerError, Result};
pub use pipeline::{analyze, AnalysisRequest};
pub use report::{write_outputs, AnalysisReport, AnalysisSummary};
