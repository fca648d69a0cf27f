/// GitLab webhook event model
///
/// Resolves the event kind from the `X-Gitlab-Event` header, falling back to the
/// payload's `object_kind`, and extracts the fields worth logging.
use serde_json::Value;
use thiserror::Error;

use super::WebhookRequest;

/// Header carrying the GitLab event name (e.g. "Issue Hook")
pub const GITLAB_EVENT_HEADER: &str = "X-Gitlab-Event";

/// Header carrying the per-delivery UUID
pub const GITLAB_EVENT_UUID_HEADER: &str = "X-Gitlab-Event-UUID";

/// Built-in GitLab issue payload used by the smoke client and tests
pub const SAMPLE_ISSUE_EVENT: &str = include_str!("../../fixtures/issue_event.json");

/// GitLab webhook event kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitlabEventKind {
    Push,
    TagPush,
    Issue,
    ConfidentialIssue,
    Note,
    ConfidentialNote,
    MergeRequest,
    WikiPage,
    Pipeline,
    Job,
    Deployment,
    FeatureFlag,
    Release,
    Emoji,
    ResourceAccessToken,
    Member,
    Subgroup,
    Project,
    /// Anything GitLab adds later; keeps the raw name
    Other(String),
}

impl GitlabEventKind {
    /// Map an `X-Gitlab-Event` header value
    pub fn from_header(value: &str) -> Self {
        match value.trim() {
            "Push Hook" => Self::Push,
            "Tag Push Hook" => Self::TagPush,
            "Issue Hook" => Self::Issue,
            "Confidential Issue Hook" => Self::ConfidentialIssue,
            "Note Hook" => Self::Note,
            "Confidential Note Hook" => Self::ConfidentialNote,
            "Merge Request Hook" => Self::MergeRequest,
            "Wiki Page Hook" => Self::WikiPage,
            "Pipeline Hook" => Self::Pipeline,
            "Job Hook" => Self::Job,
            "Deployment Hook" => Self::Deployment,
            "Feature Flag Hook" => Self::FeatureFlag,
            "Release Hook" => Self::Release,
            "Emoji Hook" => Self::Emoji,
            "Resource Access Token Hook" => Self::ResourceAccessToken,
            "Member Hook" => Self::Member,
            "Subgroup Hook" => Self::Subgroup,
            "Project Hook" => Self::Project,
            other => Self::Other(other.to_string()),
        }
    }

    /// Map a payload `object_kind` value
    ///
    /// Confidential issues and notes share `issue` / `note` with their public
    /// counterparts; only the header distinguishes them.
    pub fn from_object_kind(value: &str) -> Self {
        match value.trim() {
            "push" => Self::Push,
            "tag_push" => Self::TagPush,
            "issue" => Self::Issue,
            "note" => Self::Note,
            "merge_request" => Self::MergeRequest,
            "wiki_page" => Self::WikiPage,
            "pipeline" => Self::Pipeline,
            "build" => Self::Job,
            "deployment" => Self::Deployment,
            "feature_flag" => Self::FeatureFlag,
            "release" => Self::Release,
            "emoji" => Self::Emoji,
            "access_token" => Self::ResourceAccessToken,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical `X-Gitlab-Event` value
    pub fn header_name(&self) -> &str {
        match self {
            Self::Push => "Push Hook",
            Self::TagPush => "Tag Push Hook",
            Self::Issue => "Issue Hook",
            Self::ConfidentialIssue => "Confidential Issue Hook",
            Self::Note => "Note Hook",
            Self::ConfidentialNote => "Confidential Note Hook",
            Self::MergeRequest => "Merge Request Hook",
            Self::WikiPage => "Wiki Page Hook",
            Self::Pipeline => "Pipeline Hook",
            Self::Job => "Job Hook",
            Self::Deployment => "Deployment Hook",
            Self::FeatureFlag => "Feature Flag Hook",
            Self::Release => "Release Hook",
            Self::Emoji => "Emoji Hook",
            Self::ResourceAccessToken => "Resource Access Token Hook",
            Self::Member => "Member Hook",
            Self::Subgroup => "Subgroup Hook",
            Self::Project => "Project Hook",
            Self::Other(name) => name,
        }
    }
}

/// GitLab event parse errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GitlabEventError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("request body is not a JSON object")]
    NotObject,

    #[error("event kind could not be determined from header or object_kind")]
    UnknownKind,
}

/// A parsed GitLab webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub struct GitlabEvent {
    pub kind: GitlabEventKind,
    pub object_kind: Option<String>,
    pub event_uuid: Option<String>,
    /// `project.path_with_namespace`
    pub project: Option<String>,
    /// `user.username`, or `user_username` on push-style payloads
    pub user: Option<String>,
    /// `object_attributes.action`
    pub action: Option<String>,
    /// `object_attributes.iid`, or `object_attributes.id` when there is no iid
    pub object_iid: Option<u64>,
    pub payload: Value,
}

impl GitlabEvent {
    /// Parse a delivery from an event header and raw body
    pub fn parse(event_header: Option<&str>, body: &str) -> Result<Self, GitlabEventError> {
        if body.trim().is_empty() {
            return Err(GitlabEventError::EmptyBody);
        }

        let payload: Value =
            serde_json::from_str(body).map_err(|e| GitlabEventError::InvalidJson(e.to_string()))?;

        let object = payload.as_object().ok_or(GitlabEventError::NotObject)?;

        let object_kind = object
            .get("object_kind")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Header wins; object_kind is the fallback
        let kind = match event_header.map(str::trim).filter(|h| !h.is_empty()) {
            Some(header) => GitlabEventKind::from_header(header),
            None => match object_kind.as_deref().filter(|k| !k.trim().is_empty()) {
                Some(k) => GitlabEventKind::from_object_kind(k),
                None => return Err(GitlabEventError::UnknownKind),
            },
        };

        let project = payload
            .pointer("/project/path_with_namespace")
            .and_then(Value::as_str)
            .map(str::to_string);

        let user = payload
            .pointer("/user/username")
            .and_then(Value::as_str)
            .or_else(|| payload.get("user_username").and_then(Value::as_str))
            .map(str::to_string);

        let action = payload
            .pointer("/object_attributes/action")
            .and_then(Value::as_str)
            .map(str::to_string);

        let object_iid = payload
            .pointer("/object_attributes/iid")
            .and_then(Value::as_u64)
            .or_else(|| payload.pointer("/object_attributes/id").and_then(Value::as_u64));

        Ok(Self {
            kind,
            object_kind,
            event_uuid: None,
            project,
            user,
            action,
            object_iid,
            payload,
        })
    }

    /// Parse a delivery from a webhook request
    pub fn from_request(request: &WebhookRequest) -> Result<Self, GitlabEventError> {
        let body = request.body.as_deref().unwrap_or("");
        let mut event = Self::parse(request.header(GITLAB_EVENT_HEADER), body)?;
        event.event_uuid = request
            .header(GITLAB_EVENT_UUID_HEADER)
            .map(str::to_string);
        Ok(event)
    }
}
