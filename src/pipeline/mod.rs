//! Export pipeline: upload selection, document extraction, batched writers, path seeding.

pub mod context;
pub mod error_handler;
pub mod extract;
pub mod orchestrator;
pub mod seed;
pub mod stores;
pub mod vacuum;
pub mod writer;

pub use context::{Cancellation, ExportParams, PipelineChannels, create_pipeline_channels};
pub use error_handler::{ExportError, is_benign, observe};
pub use extract::{DocumentExtractor, classify_document, is_skipped_symbol, join_root_path};
pub use orchestrator::export;
pub use seed::seed_initial_path_ranks;
pub use stores::{DocumentSource, RankingStore};
pub use vacuum::vacuum_stale_ranking_data;
pub use writer::drain_in_batches;
