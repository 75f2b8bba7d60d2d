pub mod cache;
pub mod classify;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod garbage;
pub mod html;
pub mod llm;
pub mod pipeline;
pub mod rate_limit;
pub mod sources;
pub mod validate;
mod walker;

pub use cache::BuildCache;
pub use classify::{classify_combat_style, classify_specialty};
pub use error::ScraperError;
pub use extract::{DraftFields, FieldExtractor};
pub use fetch::{HttpFetcher, PageFetcher};
pub use garbage::is_garbage;
pub use llm::{ClaudeCli, GenerateError, TextGenerator};
pub use pipeline::{IngestOptions, IngestState, Ingestor, RunSummary};
pub use rate_limit::PolitenessDelay;
pub use sources::{normalize, NormalizeContext, RawBuild};
pub use validate::{
    RejectedDraft, Rejection, SemanticCheck, ValidationPipeline, ValidationReport,
};
