pub mod config;
pub mod fetcher;
pub mod notifier;
pub mod orchestrator;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod traits;
pub mod types;

pub use config::{LogFormat, RunConfig, SlackCredentials};
pub use fetcher::Fetcher;
pub use notifier::SlackNotifier;
pub use orchestrator::{FailurePolicy, Orchestrator, RunReport, SourceOutcome};
pub use pipeline::PipelineRunner;
pub use sources::{build_registry, SOURCE_NAMES};
pub use store::SeenStore;
pub use traits::{DedupStore, Notifier, Source};
pub use types::*;
