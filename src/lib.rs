//! aitidy - organize a directory with help from a language model
//!
//! Files are scanned, described by an LLM, and placed into a folder
//! hierarchy that is either suggested per file or synthesized for the whole
//! directory at once. Every run is previewed before anything moves, logged
//! when executed, and can be undone.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_category;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod naming;
pub mod oracle;
pub mod output;
pub mod plan;
pub mod project;
pub mod scanner;
pub mod schema;
pub mod undo;
pub mod workflow;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use error::{OrganizeError, OrganizeResult};
pub use executor::{ExecutionReport, Operation, PlanExecutor};
pub use file_category::{Category, FileMapper};
pub use models::{FileAnalysis, FileMetadata};
pub use naming::NamingScheme;
pub use oracle::{CompletionRequest, OpenAiClient, Oracle, OracleError};
pub use plan::{OrganizationPlan, PlanBuilder, PlanMode};
pub use schema::{OrganizationSchema, SchemaSynthesizer};
pub use undo::{OperationLogger, UndoManager, UndoReport};

pub use cli::{Cli, run_cli};
