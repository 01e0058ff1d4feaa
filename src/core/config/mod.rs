pub mod error;
pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use error::ConfigError;
pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    ClassifierSettings, LlmSettings, LoggingSettings, ProviderKind, RagSettings, ServerSettings,
    Settings,
};
