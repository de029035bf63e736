//! Tool catalogue, argument parsing and dispatch.
//!
//! Parsing happens before sign-in so malformed calls never cost a round trip to Tableau.

mod args;
mod custom_views;
mod datasources;
mod favorites;
mod views;
mod workbooks;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tableau_mcp_core::bounded::{BoundedContext, ConstrainedResult, ResourcePolicy};
use tableau_mcp_core::error::{ContentError, ContentKind, Rendition, codes};

use crate::error::{RestError, ToolError};
use crate::rest::SiteApi;

use args::{ListArgOptions, ListArgs, arg_optional_positive_u64, required_string};
pub(crate) use favorites::FavoriteKind;

pub(crate) const SCOPE_CONTENT_READ: &str = "tableau:content:read";
pub(crate) const SCOPE_VIEWS_DOWNLOAD: &str = "tableau:views:download";

const READ: &[&str] = &[SCOPE_CONTENT_READ];
const DOWNLOAD: &[&str] = &[SCOPE_CONTENT_READ, SCOPE_VIEWS_DOWNLOAD];

#[derive(Debug)]
pub(crate) struct ToolDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub scopes: &'static [&'static str],
}

impl ToolDefinition {
    pub(crate) fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema,
            "annotations": {
                "title": self.title,
                "readOnlyHint": true,
                "openWorldHint": false
            }
        })
    }
}

pub(crate) fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list-custom-views",
            title: "List Custom Views",
            description: "Lists the custom views owned by the signed-in user. Supports paging with `pageSize` and `limit`, and server-side ordering with `sort` (e.g. `name:asc`).",
            input_schema: list_schema(false, true),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-custom-view",
            title: "Get Custom View",
            description: "Retrieves one of the signed-in user's custom views by id. Views owned by other users are reported as not found.",
            input_schema: id_schema("customViewId", "The id of the custom view."),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-custom-view-data",
            title: "Get Custom View Data",
            description: "Downloads the underlying data of one of the signed-in user's custom views as CSV.",
            input_schema: rendition_schema("customViewId", "The id of the custom view."),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-custom-view-image",
            title: "Get Custom View Image",
            description: "Renders one of the signed-in user's custom views as a high-resolution PNG image.",
            input_schema: rendition_schema("customViewId", "The id of the custom view."),
            scopes: DOWNLOAD,
        },
        ToolDefinition {
            name: "list-favorite-workbooks",
            title: "List Favorite Workbooks",
            description: "Lists the workbooks the signed-in user has marked as favorites.",
            input_schema: empty_schema(),
            scopes: READ,
        },
        ToolDefinition {
            name: "list-favorite-views",
            title: "List Favorite Views",
            description: "Lists the views the signed-in user has marked as favorites.",
            input_schema: empty_schema(),
            scopes: READ,
        },
        ToolDefinition {
            name: "list-favorite-projects",
            title: "List Favorite Projects",
            description: "Lists the projects the signed-in user has marked as favorites.",
            input_schema: empty_schema(),
            scopes: READ,
        },
        ToolDefinition {
            name: "list-favorite-datasources",
            title: "List Favorite Datasources",
            description: "Lists the published datasources the signed-in user has marked as favorites.",
            input_schema: empty_schema(),
            scopes: READ,
        },
        ToolDefinition {
            name: "list-workbooks",
            title: "List Workbooks",
            description: "Lists workbooks on the site. `filter` accepts a Tableau REST filter expression such as `name:eq:Superstore` or `projectName:in:[Finance,Sales]`.",
            input_schema: list_schema(true, false),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-workbook",
            title: "Get Workbook",
            description: "Retrieves a workbook by id, including the views it contains.",
            input_schema: id_schema("workbookId", "The id of the workbook."),
            scopes: READ,
        },
        ToolDefinition {
            name: "list-views",
            title: "List Views",
            description: "Lists views on the site. `filter` accepts a Tableau REST filter expression such as `name:eq:Overview` or `viewUrlName:eq:Map`.",
            input_schema: list_schema(true, false),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-view-data",
            title: "Get View Data",
            description: "Downloads the underlying data of a view as CSV.",
            input_schema: rendition_schema("viewId", "The id of the view."),
            scopes: READ,
        },
        ToolDefinition {
            name: "get-view-image",
            title: "Get View Image",
            description: "Renders a view as a high-resolution PNG image.",
            input_schema: rendition_schema("viewId", "The id of the view."),
            scopes: DOWNLOAD,
        },
        ToolDefinition {
            name: "list-datasources",
            title: "List Datasources",
            description: "Lists published datasources on the site. `filter` accepts a Tableau REST filter expression such as `name:eq:Orders`.",
            input_schema: list_schema(true, false),
            scopes: READ,
        },
    ]
}

pub(crate) fn tool_names() -> Vec<&'static str> {
    tool_definitions().into_iter().map(|tool| tool.name).collect()
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

fn list_schema(filter: bool, sort: bool) -> Value {
    let mut properties = json!({
        "pageSize": {
            "type": "integer",
            "minimum": 1,
            "description": "Items requested per page from Tableau (default 100)."
        },
        "limit": {
            "type": "integer",
            "minimum": 1,
            "description": "Maximum number of items to return across all pages."
        }
    });
    if filter {
        properties["filter"] = json!({
            "type": "string",
            "description": "Tableau REST API filter expression, e.g. `name:eq:Sales`."
        });
    }
    if sort {
        properties["sort"] = json!({
            "type": "string",
            "description": "Tableau REST API sort expression, e.g. `name:asc`."
        });
    }
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false
    })
}

fn id_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description }
        },
        "required": [field],
        "additionalProperties": false
    })
}

fn rendition_schema(field: &str, description: &str) -> Value {
    let mut schema = id_schema(field, description);
    schema["properties"]["maxAge"] = json!({
        "type": "integer",
        "minimum": 1,
        "description": "Accept a cached rendering up to this many minutes old."
    });
    schema
}

/// Read-only state every tool sees.
#[derive(Debug, Clone)]
pub(crate) struct ToolContext {
    pub bounded: Arc<BoundedContext>,
    pub max_result_limit: Option<u64>,
}

pub(crate) enum ToolOutput {
    Constrained(ConstrainedResult<Value>),
    Item(Value),
    Csv(String),
    Png(Vec<u8>),
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ToolCall {
    ListCustomViews(ListArgs),
    GetCustomView { id: String },
    GetCustomViewData { id: String, max_age: Option<u64> },
    GetCustomViewImage { id: String, max_age: Option<u64> },
    ListFavorites(FavoriteKind),
    ListWorkbooks(ListArgs),
    GetWorkbook { id: String },
    ListViews(ListArgs),
    GetViewData { id: String, max_age: Option<u64> },
    GetViewImage { id: String, max_age: Option<u64> },
    ListDatasources(ListArgs),
}

impl ToolCall {
    pub(crate) fn parse(name: &str, args: &Map<String, Value>) -> Result<Self, ToolError> {
        const FILTERED: ListArgOptions = ListArgOptions {
            filter: true,
            sort: false,
        };
        let call = match name {
            "list-custom-views" => ToolCall::ListCustomViews(ListArgs::parse(
                args,
                ListArgOptions {
                    filter: false,
                    sort: true,
                },
            )?),
            "get-custom-view" => ToolCall::GetCustomView {
                id: required_string(args, "customViewId")?,
            },
            "get-custom-view-data" => ToolCall::GetCustomViewData {
                id: required_string(args, "customViewId")?,
                max_age: arg_optional_positive_u64(args, "maxAge")?,
            },
            "get-custom-view-image" => ToolCall::GetCustomViewImage {
                id: required_string(args, "customViewId")?,
                max_age: arg_optional_positive_u64(args, "maxAge")?,
            },
            "list-favorite-workbooks" => ToolCall::ListFavorites(FavoriteKind::Workbooks),
            "list-favorite-views" => ToolCall::ListFavorites(FavoriteKind::Views),
            "list-favorite-projects" => ToolCall::ListFavorites(FavoriteKind::Projects),
            "list-favorite-datasources" => ToolCall::ListFavorites(FavoriteKind::Datasources),
            "list-workbooks" => ToolCall::ListWorkbooks(ListArgs::parse(args, FILTERED)?),
            "get-workbook" => ToolCall::GetWorkbook {
                id: required_string(args, "workbookId")?,
            },
            "list-views" => ToolCall::ListViews(ListArgs::parse(args, FILTERED)?),
            "get-view-data" => ToolCall::GetViewData {
                id: required_string(args, "viewId")?,
                max_age: arg_optional_positive_u64(args, "maxAge")?,
            },
            "get-view-image" => ToolCall::GetViewImage {
                id: required_string(args, "viewId")?,
                max_age: arg_optional_positive_u64(args, "maxAge")?,
            },
            "list-datasources" => ToolCall::ListDatasources(ListArgs::parse(args, FILTERED)?),
            other => {
                return Err(
                    ToolError::new(codes::UNKNOWN_TOOL, format!("Unknown tool '{other}'"))
                        .with_field("name")
                        .with_docs_hint("Call tools/list to see the available tools."),
                );
            }
        };
        Ok(call)
    }

    /// Scopes requested for the connected-app token used by this call.
    pub(crate) fn scopes(&self) -> &'static [&'static str] {
        match self {
            ToolCall::GetCustomViewImage { .. } | ToolCall::GetViewImage { .. } => DOWNLOAD,
            _ => READ,
        }
    }
}

pub(crate) async fn execute<A: SiteApi>(
    call: &ToolCall,
    api: &A,
    ctx: &ToolContext,
) -> Result<ToolOutput, ToolError> {
    match call {
        ToolCall::ListCustomViews(list) => custom_views::list(api, ctx, list).await,
        ToolCall::GetCustomView { id } => custom_views::get(api, ctx, id).await,
        ToolCall::GetCustomViewData { id, max_age } => {
            custom_views::get_data(api, ctx, id, *max_age).await
        }
        ToolCall::GetCustomViewImage { id, max_age } => {
            custom_views::get_image(api, ctx, id, *max_age).await
        }
        ToolCall::ListFavorites(kind) => favorites::list(api, ctx, *kind).await,
        ToolCall::ListWorkbooks(list) => workbooks::list(api, ctx, list).await,
        ToolCall::GetWorkbook { id } => workbooks::get(api, ctx, id).await,
        ToolCall::ListViews(list) => views::list(api, ctx, list).await,
        ToolCall::GetViewData { id, max_age } => views::get_data(api, ctx, id, *max_age).await,
        ToolCall::GetViewImage { id, max_age } => views::get_image(api, ctx, id, *max_age).await,
        ToolCall::ListDatasources(list) => datasources::list(api, ctx, list).await,
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::new("serialization_failed", format!("Failed to encode result: {e}")))
}

/// Run `items` through `policy` and encode the survivors.
fn constrain_to_output<T: Serialize + Clone>(
    policy: ResourcePolicy<T>,
    items: &[T],
    bounded: &BoundedContext,
) -> Result<ToolOutput, ToolError> {
    let constrained = match policy.constrain(items, bounded) {
        ConstrainedResult::Success(kept) => {
            tracing::info!(fetched = items.len(), returned = kept.len(), "result constrained");
            ConstrainedResult::Success(to_json(&kept)?)
        }
        ConstrainedResult::NoData { message } => ConstrainedResult::NoData { message },
        ConstrainedResult::FilteredEmpty { message } => {
            tracing::info!(fetched = items.len(), "all items filtered by bounded context");
            ConstrainedResult::FilteredEmpty { message }
        }
    };
    Ok(ToolOutput::Constrained(constrained))
}

/// Resolve a single item by id. An HTTP status error means the id did not resolve for this
/// user and is reported as not found; other failures propagate.
async fn resolve<T, Fut>(kind: ContentKind, lookup: Fut) -> Result<T, ToolError>
where
    Fut: Future<Output = Result<T, RestError>>,
{
    match lookup.await {
        Ok(item) => Ok(item),
        Err(err @ RestError::Status { .. }) => {
            tracing::info!(%kind, status = ?err.status(), "lookup rejected, reporting not found");
            Err(ContentError::NotFound { kind }.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Fetch data or an image for an item that has already been resolved and checked.
async fn dependent_fetch<T, Fut>(
    kind: ContentKind,
    what: Rendition,
    fetch: Fut,
) -> Result<T, ToolError>
where
    Fut: Future<Output = Result<T, RestError>>,
{
    fetch.await.map_err(|err| {
        tracing::warn!(%kind, rendition = %what, error = %err, "dependent fetch failed");
        ContentError::FetchFailed { kind, what }.into()
    })
}
