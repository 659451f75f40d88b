//! Range store, fetch coordination, alignment and assembly.

pub mod align;
pub mod assemble;
pub mod coordinator;
pub mod export;
pub mod localfile;
pub mod provider;
pub mod schema;
pub mod store;

pub use align::{resample, Direction};
pub use assemble::{AssembleOptions, AssemblyPipeline};
pub use coordinator::FetchCoordinator;
pub use export::{ExportError, ExportFormat, Layout};
pub use localfile::{FileKind, LocalFileSource};
pub use provider::{AdapterError, SourceAdapter, SourceRegistry};
pub use store::{CachedSeries, ClearFilter, EntrySummary, RangeStore, StoreError};
