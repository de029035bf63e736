use serde_json::{Map, Value};
use tableau_mcp_core::pagination::{PageConfig, effective_limit};

use crate::error::ToolError;
use crate::rest::ListQuery;

pub(crate) fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Value::String(_) => Err(ToolError::validation(key, format!("'{key}' must not be empty"))),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

pub(crate) fn arg_optional_string(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

/// Optional integer that must be strictly positive when present.
pub(crate) fn arg_optional_positive_u64(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, ToolError> {
    let invalid = || ToolError::validation(key, format!("'{key}' must be a positive integer"));
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) | None => Err(invalid()),
            Some(v) => Ok(Some(v)),
        },
        Some(_) => Err(invalid()),
    }
}

/// Paging and server-side query arguments shared by the list tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ListArgs {
    pub page_size: Option<u32>,
    pub limit: Option<u64>,
    pub query: ListQuery,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ListArgOptions {
    pub filter: bool,
    pub sort: bool,
}

impl ListArgs {
    pub(crate) fn parse(
        args: &Map<String, Value>,
        options: ListArgOptions,
    ) -> Result<Self, ToolError> {
        let page_size = arg_optional_positive_u64(args, "pageSize")?
            .map(|size| {
                u32::try_from(size).map_err(|_| {
                    ToolError::validation("pageSize", "'pageSize' is too large")
                })
            })
            .transpose()?;
        let limit = arg_optional_positive_u64(args, "limit")?;
        let filter = if options.filter {
            arg_optional_string(args, "filter")?
        } else {
            None
        };
        let sort = if options.sort {
            arg_optional_string(args, "sort")?
        } else {
            None
        };
        Ok(Self {
            page_size,
            limit,
            query: ListQuery {
                filter,
                sort,
                fields: None,
            },
        })
    }

    pub(crate) fn page_config(&self, max_result_limit: Option<u64>) -> PageConfig {
        PageConfig {
            page_size: self.page_size,
            limit: effective_limit(max_result_limit, self.limit),
        }
    }
}
