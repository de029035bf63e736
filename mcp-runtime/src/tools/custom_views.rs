use std::future::Future;

use tableau_mcp_core::content::{CustomView, policies};
use tableau_mcp_core::error::{ContentError, ContentKind, Rendition};
use tableau_mcp_core::pagination::paginate;

use super::args::ListArgs;
use super::{ToolContext, ToolOutput, constrain_to_output, dependent_fetch, resolve, to_json};
use crate::error::{RestError, ToolError};
use crate::rest::SiteApi;

const KIND: ContentKind = ContentKind::CustomView;

pub(super) async fn list<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    args: &ListArgs,
) -> Result<ToolOutput, ToolError> {
    let config = args.page_config(ctx.max_result_limit);
    let items = paginate(config, |page| api.list_custom_views(&args.query, page)).await?;
    constrain_to_output(policies::custom_views(), &items, &ctx.bounded)
}

pub(super) async fn get<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
) -> Result<ToolOutput, ToolError> {
    let view = fetch_own_custom_view(api, ctx, id).await?;
    Ok(ToolOutput::Item(to_json(&view)?))
}

pub(super) async fn get_data<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
    max_age: Option<u64>,
) -> Result<ToolOutput, ToolError> {
    fetch_owned_then(api, ctx, id, Rendition::Data, |view| async move {
        api.get_custom_view_data(&view.id, max_age).await
    })
    .await
    .map(ToolOutput::Csv)
}

pub(super) async fn get_image<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
    max_age: Option<u64>,
) -> Result<ToolOutput, ToolError> {
    fetch_owned_then(api, ctx, id, Rendition::Image, |view| async move {
        api.get_custom_view_image(&view.id, max_age).await
    })
    .await
    .map(ToolOutput::Png)
}

/// Fetch a custom view, confirm the signed-in user owns it and that its workbook is
/// inside the bounded context.
///
/// A foreign owner, a missing owner and a rejected lookup all collapse into the same
/// not-found error, so existence of other users' views is never revealed.
pub(crate) async fn fetch_own_custom_view<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
) -> Result<CustomView, ToolError> {
    let view = resolve(KIND, api.get_custom_view(id)).await?;
    if !view.is_owned_by(api.user_id()) {
        tracing::info!(custom_view_id = %id, "custom view not owned by caller");
        return Err(ContentError::NotFound { kind: KIND }.into());
    }
    if !policies::custom_views().permits(&view, &ctx.bounded) {
        tracing::info!(custom_view_id = %id, "custom view excluded by bounded context");
        return Err(ContentError::NotAllowed { kind: KIND }.into());
    }
    Ok(view)
}

/// Run `action` against a custom view only after ownership and the bounded context are
/// confirmed. A failing `action` is reported as a fetch failure for `what`.
pub(crate) async fn fetch_owned_then<A, T, F, Fut>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
    what: Rendition,
    action: F,
) -> Result<T, ToolError>
where
    A: SiteApi,
    F: FnOnce(CustomView) -> Fut,
    Fut: Future<Output = Result<T, RestError>>,
{
    let view = fetch_own_custom_view(api, ctx, id).await?;
    dependent_fetch(KIND, what, action(view)).await
}
