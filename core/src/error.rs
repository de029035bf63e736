use thiserror::Error;

/// Failures that single-item tools report back to the agent instead of propagating.
///
/// `NotFound` deliberately covers both "does not exist" and "exists but belongs to someone
/// else", so a caller can never probe for content owned by other users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// Ownership check failed or the id did not resolve.
    #[error("{kind} not found.")]
    NotFound { kind: ContentKind },
    /// A dependent fetch (data/image) failed after the item was resolved.
    #[error("Failed to fetch {kind} {what}.")]
    FetchFailed { kind: ContentKind, what: Rendition },
    /// The item exists but the bounded context excludes it.
    #[error("The {kind} is not in the set of content this server is allowed to access.")]
    NotAllowed { kind: ContentKind },
}

impl ContentError {
    /// Machine-readable code, e.g. `custom-view-not-found` or `image-fetch-failed`.
    pub fn code(&self) -> String {
        match self {
            ContentError::NotFound { kind } => format!("{}-not-found", kind.slug()),
            ContentError::FetchFailed { what, .. } => format!("{}-fetch-failed", what.slug()),
            ContentError::NotAllowed { kind } => format!("{}-not-allowed", kind.slug()),
        }
    }

    /// Sentence-case message suitable for the agent, e.g. "Custom view not found."
    pub fn message(&self) -> String {
        let text = self.to_string();
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    CustomView,
    Workbook,
    View,
}

impl ContentKind {
    fn slug(self) -> &'static str {
        match self {
            ContentKind::CustomView => "custom-view",
            ContentKind::Workbook => "workbook",
            ContentKind::View => "view",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ContentKind::CustomView => "custom view",
            ContentKind::Workbook => "workbook",
            ContentKind::View => "view",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendition {
    Data,
    Image,
}

impl Rendition {
    fn slug(self) -> &'static str {
        match self {
            Rendition::Data => "data",
            Rendition::Image => "image",
        }
    }
}

impl std::fmt::Display for Rendition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Error codes used across the tool surface
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const TOOL_DISABLED: &str = "tool_disabled";
    pub const AUTH_FAILED: &str = "auth_failed";
    pub const REST_ERROR: &str = "rest_error";
}
