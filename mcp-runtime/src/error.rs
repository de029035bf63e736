use serde_json::{Value, json};
use tableau_mcp_core::error::{ContentError, codes};
use thiserror::Error;

/// Failures talking to the Tableau REST API.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: u16,
        body: Value,
    },
    #[error("unexpected response shape from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("sign-in failed: {0}")]
    Auth(String),
}

impl RestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Startup configuration problems. Reported once and the process exits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SERVER is required (base URL of Tableau Server or Tableau Cloud)")]
    MissingServer,
    #[error("SERVER is not a valid http(s) URL: {0}")]
    InvalidServer(String),
    #[error("{0} is required for the selected AUTH method")]
    MissingCredential(&'static str),
    #[error("{0} was provided but contains no ids; omit it to disable the restriction")]
    EmptyAllowList(&'static str),
    #[error("MAX_RESULT_LIMIT must be greater than zero")]
    ZeroMaxResultLimit,
    #[error("INCLUDE_TOOLS and EXCLUDE_TOOLS cannot be used together")]
    ConflictingToolFilters,
    #[error("unknown tool name '{0}' in tool filter")]
    UnknownTool(String),
}

/// JSON-RPC protocol error.
#[derive(Debug)]
pub(crate) struct RpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
    pub(crate) data: Option<Value>,
}

impl RpcError {
    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    pub(crate) fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub(crate) fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

/// Tool-level failure, rendered into the `isError` tool result envelope.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub docs_hint: Option<String>,
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_FAILED, message).with_field(field)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        if let Some(details) = &self.details {
            payload["details"] = details.clone();
        }
        payload
    }
}

impl From<ContentError> for ToolError {
    fn from(err: ContentError) -> Self {
        ToolError::new(err.code(), err.message())
    }
}

impl From<RestError> for ToolError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http { url, source } => ToolError::new(
                "connection_error",
                format!("Failed to reach Tableau at {url}: {source}"),
            )
            .with_docs_hint("Ensure SERVER points to a reachable Tableau Server or Tableau Cloud pod."),
            RestError::Status { url, status, body } => ToolError::new(
                codes::REST_ERROR,
                format!("Tableau REST API returned HTTP {status}"),
            )
            .with_details(json!({ "url": url, "status": status, "body": body })),
            RestError::Decode { url, message } => ToolError::new(
                codes::REST_ERROR,
                format!("Unexpected response shape from Tableau: {message}"),
            )
            .with_details(json!({ "url": url })),
            RestError::Auth(message) => ToolError::new(codes::AUTH_FAILED, message).with_docs_hint(
                "Check AUTH and the PAT_* or CONNECTED_APP_* settings, and that SITE_NAME matches the site content URL.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableau_mcp_core::error::{ContentKind, Rendition};

    #[test]
    fn content_errors_keep_their_codes() {
        let err: ToolError = ContentError::FetchFailed {
            kind: ContentKind::CustomView,
            what: Rendition::Data,
        }
        .into();
        assert_eq!(err.code, "data-fetch-failed");
        assert_eq!(err.message, "Failed to fetch custom view data.");
        assert_eq!(err.to_value()["error"], "data-fetch-failed");
        assert!(err.to_value().get("field").is_none());
    }

    #[test]
    fn status_errors_carry_details() {
        let err: ToolError = RestError::Status {
            url: "https://tableau.example.com/api/3.24/sites/s/workbooks".into(),
            status: 403,
            body: json!({ "error": { "code": "403004" } }),
        }
        .into();
        assert_eq!(err.code, codes::REST_ERROR);
        let value = err.to_value();
        assert_eq!(value["details"]["status"], 403);
        assert_eq!(value["details"]["body"]["error"]["code"], "403004");
    }

    #[test]
    fn validation_errors_name_the_field() {
        let value = ToolError::validation("pageSize", "'pageSize' must be greater than zero")
            .to_value();
        assert_eq!(value["error"], codes::VALIDATION_FAILED);
        assert_eq!(value["field"], "pageSize");
    }
}
