use tableau_mcp_core::content::policies;
use tableau_mcp_core::pagination::paginate;

use super::args::ListArgs;
use super::{ToolContext, ToolOutput, constrain_to_output};
use crate::error::ToolError;
use crate::rest::SiteApi;

pub(super) async fn list<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    args: &ListArgs,
) -> Result<ToolOutput, ToolError> {
    let config = args.page_config(ctx.max_result_limit);
    let items = paginate(config, |page| api.list_datasources(&args.query, page)).await?;
    constrain_to_output(policies::datasources(), &items, &ctx.bounded)
}
