use std::collections::HashSet;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use serde_json::{Value, json};
use tableau_mcp_core::bounded::{BoundedContext, parse_id_list};
use url::Url;

use crate::auth::Credentials;
use crate::error::ConfigError;
use crate::tools::tool_names;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthMethod {
    /// Personal access token
    #[default]
    Pat,
    /// Connected app with direct trust (JWT)
    DirectTrust,
}

/// Connection and policy settings. Every flag falls back to an environment variable.
#[derive(Args, Clone, Debug, Default)]
pub struct TableauArgs {
    /// Base URL of Tableau Server or Tableau Cloud
    #[arg(long, env = "SERVER")]
    pub server: Option<String>,
    /// Site content URL (empty for the default site)
    #[arg(long, env = "SITE_NAME", default_value = "")]
    pub site_name: String,
    /// REST API version
    #[arg(long, env = "TABLEAU_API_VERSION", default_value = "3.24")]
    pub api_version: String,
    /// Sign-in method
    #[arg(long, env = "AUTH", value_enum, default_value_t = AuthMethod::Pat)]
    pub auth: AuthMethod,
    #[arg(long, env = "PAT_NAME")]
    pub pat_name: Option<String>,
    #[arg(long, env = "PAT_VALUE", hide_env_values = true)]
    pub pat_value: Option<String>,
    /// Username placed in the `sub` claim of connected-app tokens
    #[arg(long, env = "JWT_SUB_CLAIM")]
    pub jwt_sub_claim: Option<String>,
    #[arg(long, env = "CONNECTED_APP_CLIENT_ID")]
    pub connected_app_client_id: Option<String>,
    #[arg(long, env = "CONNECTED_APP_SECRET_ID")]
    pub connected_app_secret_id: Option<String>,
    #[arg(long, env = "CONNECTED_APP_SECRET_VALUE", hide_env_values = true)]
    pub connected_app_secret_value: Option<String>,
    /// Upper bound on items returned by any list tool
    #[arg(long, env = "MAX_RESULT_LIMIT")]
    pub max_result_limit: Option<u64>,
    /// Comma-separated project ids content must belong to
    #[arg(long, env = "INCLUDE_PROJECT_IDS")]
    pub include_project_ids: Option<String>,
    /// Comma-separated workbook ids content must belong to
    #[arg(long, env = "INCLUDE_WORKBOOK_IDS")]
    pub include_workbook_ids: Option<String>,
    /// Comma-separated datasource ids that may be exposed
    #[arg(long, env = "INCLUDE_DATASOURCE_IDS")]
    pub include_datasource_ids: Option<String>,
    /// Only expose these tools (comma-separated)
    #[arg(long, env = "INCLUDE_TOOLS")]
    pub include_tools: Option<String>,
    /// Hide these tools (comma-separated)
    #[arg(long, env = "EXCLUDE_TOOLS")]
    pub exclude_tools: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFilter {
    All,
    Include(HashSet<String>),
    Exclude(HashSet<String>),
}

impl ToolFilter {
    pub fn allows(&self, name: &str) -> bool {
        match self {
            ToolFilter::All => true,
            ToolFilter::Include(names) => names.contains(name),
            ToolFilter::Exclude(names) => !names.contains(name),
        }
    }
}

/// Validated runtime settings, built once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub server: Url,
    pub site_name: String,
    pub api_version: String,
    pub credentials: Credentials,
    pub max_result_limit: Option<u64>,
    pub bounded: Arc<BoundedContext>,
    pub tools: ToolFilter,
}

impl RuntimeConfig {
    pub fn from_args(args: TableauArgs) -> Result<Self, ConfigError> {
        let server = parse_server(args.server.as_deref())?;
        let credentials = credentials(&args)?;

        if args.max_result_limit == Some(0) {
            return Err(ConfigError::ZeroMaxResultLimit);
        }

        let bounded = BoundedContext {
            project_ids: allow_list(args.include_project_ids.as_deref(), "INCLUDE_PROJECT_IDS")?,
            workbook_ids: allow_list(
                args.include_workbook_ids.as_deref(),
                "INCLUDE_WORKBOOK_IDS",
            )?,
            datasource_ids: allow_list(
                args.include_datasource_ids.as_deref(),
                "INCLUDE_DATASOURCE_IDS",
            )?,
        };

        let tools = tool_filter(args.include_tools.as_deref(), args.exclude_tools.as_deref())?;

        Ok(Self {
            server,
            site_name: args.site_name.trim().to_string(),
            api_version: args.api_version,
            credentials,
            max_result_limit: args.max_result_limit,
            bounded: Arc::new(bounded),
            tools,
        })
    }

    /// Non-secret view of the configuration for the startup log line.
    pub fn summary(&self) -> Value {
        let count = |ids: &Option<HashSet<String>>| ids.as_ref().map(HashSet::len);
        json!({
            "server": self.server.as_str(),
            "site": self.site_name,
            "api_version": self.api_version,
            "auth": self.credentials.method(),
            "max_result_limit": self.max_result_limit,
            "allowed_projects": count(&self.bounded.project_ids),
            "allowed_workbooks": count(&self.bounded.workbook_ids),
            "allowed_datasources": count(&self.bounded.datasource_ids),
        })
    }
}

fn parse_server(raw: Option<&str>) -> Result<Url, ConfigError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingServer)?;
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidServer(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidServer(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingCredential(name))
}

fn credentials(args: &TableauArgs) -> Result<Credentials, ConfigError> {
    match args.auth {
        AuthMethod::Pat => Ok(Credentials::PersonalAccessToken {
            name: required(&args.pat_name, "PAT_NAME")?,
            secret: required(&args.pat_value, "PAT_VALUE")?,
        }),
        AuthMethod::DirectTrust => Ok(Credentials::DirectTrust {
            username: required(&args.jwt_sub_claim, "JWT_SUB_CLAIM")?,
            client_id: required(&args.connected_app_client_id, "CONNECTED_APP_CLIENT_ID")?,
            secret_id: required(&args.connected_app_secret_id, "CONNECTED_APP_SECRET_ID")?,
            secret_value: required(
                &args.connected_app_secret_value,
                "CONNECTED_APP_SECRET_VALUE",
            )?,
        }),
    }
}

/// Unset means no restriction. Set but blank is an error.
fn allow_list(
    raw: Option<&str>,
    name: &'static str,
) -> Result<Option<HashSet<String>>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let ids = parse_id_list(raw);
    if ids.is_empty() {
        return Err(ConfigError::EmptyAllowList(name));
    }
    Ok(Some(ids))
}

fn tool_filter(include: Option<&str>, exclude: Option<&str>) -> Result<ToolFilter, ConfigError> {
    let include = include.map(parse_id_list).filter(|names| !names.is_empty());
    let exclude = exclude.map(parse_id_list).filter(|names| !names.is_empty());

    let known = tool_names();
    let validate = |names: HashSet<String>| -> Result<HashSet<String>, ConfigError> {
        if let Some(unknown) = names.iter().find(|name| !known.contains(&name.as_str())) {
            return Err(ConfigError::UnknownTool(unknown.clone()));
        }
        Ok(names)
    };

    match (include, exclude) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingToolFilters),
        (Some(names), None) => Ok(ToolFilter::Include(validate(names)?)),
        (None, Some(names)) => Ok(ToolFilter::Exclude(validate(names)?)),
        (None, None) => Ok(ToolFilter::All),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat_args() -> TableauArgs {
        TableauArgs {
            server: Some("https://tableau.example.com".into()),
            api_version: "3.24".into(),
            pat_name: Some("mcp".into()),
            pat_value: Some("secret".into()),
            ..TableauArgs::default()
        }
    }

    #[test]
    fn minimal_pat_config() {
        let config = RuntimeConfig::from_args(pat_args()).unwrap();
        assert_eq!(config.credentials.method(), "pat");
        assert!(config.bounded.is_unrestricted());
        assert_eq!(config.tools, ToolFilter::All);
        assert_eq!(config.summary()["allowed_projects"], Value::Null);
    }

    #[test]
    fn server_is_required_and_must_be_http() {
        let mut args = pat_args();
        args.server = None;
        assert_eq!(
            RuntimeConfig::from_args(args).unwrap_err(),
            ConfigError::MissingServer
        );

        let mut args = pat_args();
        args.server = Some("ftp://tableau.example.com".into());
        assert!(matches!(
            RuntimeConfig::from_args(args).unwrap_err(),
            ConfigError::InvalidServer(_)
        ));
    }

    #[test]
    fn direct_trust_requires_every_connected_app_field() {
        let mut args = pat_args();
        args.auth = AuthMethod::DirectTrust;
        args.jwt_sub_claim = Some("analyst".into());
        args.connected_app_client_id = Some("client".into());
        args.connected_app_secret_id = Some("kid".into());
        assert_eq!(
            RuntimeConfig::from_args(args.clone()).unwrap_err(),
            ConfigError::MissingCredential("CONNECTED_APP_SECRET_VALUE")
        );

        args.connected_app_secret_value = Some("value".into());
        let config = RuntimeConfig::from_args(args).unwrap();
        assert_eq!(config.credentials.method(), "direct-trust");
    }

    #[test]
    fn allow_lists_are_parsed_and_blank_lists_rejected() {
        let mut args = pat_args();
        args.include_project_ids = Some("p1, p2".into());
        let config = RuntimeConfig::from_args(args).unwrap();
        let projects = config.bounded.project_ids.as_ref().unwrap();
        assert!(projects.contains("p1") && projects.contains("p2"));
        assert!(config.bounded.workbook_ids.is_none());

        let mut args = pat_args();
        args.include_workbook_ids = Some(" , ".into());
        assert_eq!(
            RuntimeConfig::from_args(args).unwrap_err(),
            ConfigError::EmptyAllowList("INCLUDE_WORKBOOK_IDS")
        );
    }

    #[test]
    fn zero_max_result_limit_is_rejected() {
        let mut args = pat_args();
        args.max_result_limit = Some(0);
        assert_eq!(
            RuntimeConfig::from_args(args).unwrap_err(),
            ConfigError::ZeroMaxResultLimit
        );
    }

    #[test]
    fn tool_filters() {
        assert_eq!(
            tool_filter(Some("list-views"), Some("get-workbook")).unwrap_err(),
            ConfigError::ConflictingToolFilters
        );
        assert_eq!(
            tool_filter(Some("list-everything"), None).unwrap_err(),
            ConfigError::UnknownTool("list-everything".into())
        );

        let include = tool_filter(Some("list-views, get-view-data"), None).unwrap();
        assert!(include.allows("list-views"));
        assert!(!include.allows("list-workbooks"));

        let exclude = tool_filter(None, Some("get-view-image")).unwrap();
        assert!(!exclude.allows("get-view-image"));
        assert!(exclude.allows("get-view-data"));

        assert_eq!(tool_filter(Some(" "), None).unwrap(), ToolFilter::All);
    }
}
