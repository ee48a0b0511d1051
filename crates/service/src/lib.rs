//! Service layer for vecdb-setup
//!
//! Sequences the provisioning steps over storage and the embedding provider,
//! and reports each run between banners.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]

pub mod banner;
mod embedding_service;
mod error;
mod pipeline;

pub use banner::{
    log_completion_banner, log_failure_banner, log_started_banner, run_reported, COMPLETE_TITLE,
    FAILED_TITLE, STARTED_TITLE,
};
pub use embedding_service::{EmbeddingPopulation, EmbeddingReport, EmbeddingService, TableEmbeddings};
pub use error::{error_chain, ErrorKind, SetupError};
pub use pipeline::{
    PgStepExecutor, PipelineReport, ProvisioningPipeline, SetupStep, StepExecutor, StepOutcome,
};
