//! Endpoint discovery and resolution for Java/Kotlin HTTP clients.
//!
//! Three scan strategies (declarative annotations, builder-chain
//! heuristics, wrapper-method heuristics) feed one merged, deduplicated
//! endpoint list; base URLs come from source inference with a
//! project-root `apiscout.yaml` override document taking precedence.
//! [`ProjectContext`] ties the pipeline together with version-keyed
//! caching.

mod base_url;
mod config;
mod context;
mod details;
mod endpoint;
mod error;
mod fs_project;
mod project;
mod scan;
mod source_index;
mod url;

pub use base_url::{BaseUrlResolver, Provenance, ResolvedBaseUrl, normalize_base_url};
pub use config::EndpointConfig;
pub use context::{ProjectContext, ScanOutcome, ScanToken};
pub use details::{AuthRequirement, DetailResolver, EndpointDocDetails, ParamList, Parameter};
pub use endpoint::{Endpoint, EndpointKey, compare_endpoints, normalize_path};
pub use error::ScoutError;
pub use fs_project::FsProject;
pub use project::{
    AnnotationUse, ClassSymbol, ConfigFile, FieldSymbol, MemProject, MethodSymbol, ParamSymbol,
    Project, SourceFile, SymbolIndex,
};
pub use scan::{Scanner, StrategyKind};
