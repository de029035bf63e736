use tableau_mcp_core::content::policies;

use super::{ToolContext, ToolOutput, constrain_to_output};
use crate::error::ToolError;
use crate::rest::SiteApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FavoriteKind {
    Workbooks,
    Views,
    Projects,
    Datasources,
}

/// The favorites endpoint is not paged; one call returns every kind and the caller's bucket
/// is picked out here.
pub(super) async fn list<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    kind: FavoriteKind,
) -> Result<ToolOutput, ToolError> {
    let favorites = api.get_favorites().await?;
    let bounded = &ctx.bounded;
    match kind {
        FavoriteKind::Workbooks => {
            constrain_to_output(policies::favorite_workbooks(), &favorites.workbooks, bounded)
        }
        FavoriteKind::Views => {
            constrain_to_output(policies::favorite_views(), &favorites.views, bounded)
        }
        FavoriteKind::Projects => {
            constrain_to_output(policies::favorite_projects(), &favorites.projects, bounded)
        }
        FavoriteKind::Datasources => constrain_to_output(
            policies::favorite_datasources(),
            &favorites.datasources,
            bounded,
        ),
    }
}
