// Infrastructure layer modules
pub mod config;
pub mod event_sender;
pub mod logging;
pub mod secrets_ops;

// Re-exports
pub use config::{WebhookConfig, WebhookConfigError};
pub use event_sender::{EventSender, SendError, SendOutcome};
pub use logging::init_logging;
pub use secrets_ops::{AwsSecretsOps, CachedSecretsOps, SecretsOps, SecretsOpsError};
