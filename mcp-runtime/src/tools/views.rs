use tableau_mcp_core::content::{View, policies};
use tableau_mcp_core::error::{ContentError, ContentKind, Rendition};
use tableau_mcp_core::pagination::paginate;

use super::args::ListArgs;
use super::{ToolContext, ToolOutput, constrain_to_output, dependent_fetch, resolve};
use crate::error::ToolError;
use crate::rest::{ListQuery, SiteApi};

const KIND: ContentKind = ContentKind::View;

/// Ask for the parent ids the bounded context filters on.
const LIST_FIELDS: &str = "_default_,workbook.id,project.id";

pub(super) async fn list<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    args: &ListArgs,
) -> Result<ToolOutput, ToolError> {
    let config = args.page_config(ctx.max_result_limit);
    let query = ListQuery {
        fields: Some(LIST_FIELDS.to_string()),
        ..args.query.clone()
    };
    let items = paginate(config, |page| api.list_views(&query, page)).await?;
    constrain_to_output(policies::views(), &items, &ctx.bounded)
}

pub(super) async fn get_data<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
    max_age: Option<u64>,
) -> Result<ToolOutput, ToolError> {
    let view = fetch_permitted_view(api, ctx, id).await?;
    dependent_fetch(KIND, Rendition::Data, api.get_view_data(&view.id, max_age))
        .await
        .map(ToolOutput::Csv)
}

pub(super) async fn get_image<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
    max_age: Option<u64>,
) -> Result<ToolOutput, ToolError> {
    let view = fetch_permitted_view(api, ctx, id).await?;
    dependent_fetch(KIND, Rendition::Image, api.get_view_image(&view.id, max_age))
        .await
        .map(ToolOutput::Png)
}

async fn fetch_permitted_view<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
) -> Result<View, ToolError> {
    let view = resolve(KIND, api.get_view(id)).await?;
    if !policies::views().permits(&view, &ctx.bounded) {
        tracing::info!(view_id = %id, "view excluded by bounded context");
        return Err(ContentError::NotAllowed { kind: KIND }.into());
    }
    Ok(view)
}
