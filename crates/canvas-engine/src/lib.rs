pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod request;
pub mod retry;

pub use config::EndpointConfig;
pub use error::{GenerationError, ItemLoadError};
pub use orchestrator::{
    LoadedImage, Notice, NoticeLevel, Orchestrator, OrchestratorEvent, RunReport, SessionSnapshot,
};
pub use providers::{
    load_model_catalog, ImageSource, ModelSource, PollinationsClient, PromptEnhancer,
};
pub use retry::RetryPolicy;
