// Domain layer modules
pub mod app_secrets;
pub mod gitlab_event;
pub mod webhook_request;
pub mod webhook_response;

// Re-exports
pub use app_secrets::{AppSecrets, AppSecretsError};
pub use gitlab_event::{
    GITLAB_EVENT_HEADER, GITLAB_EVENT_UUID_HEADER, GitlabEvent, GitlabEventError, GitlabEventKind,
    SAMPLE_ISSUE_EVENT,
};
pub use webhook_request::WebhookRequest;
pub use webhook_response::{ACCEPTED_MESSAGE, WebhookResponse};
