use tableau_mcp_core::content::policies;
use tableau_mcp_core::error::{ContentError, ContentKind};
use tableau_mcp_core::pagination::paginate;

use super::args::ListArgs;
use super::{ToolContext, ToolOutput, constrain_to_output, resolve, to_json};
use crate::error::ToolError;
use crate::rest::SiteApi;

pub(super) async fn list<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    args: &ListArgs,
) -> Result<ToolOutput, ToolError> {
    let config = args.page_config(ctx.max_result_limit);
    let items = paginate(config, |page| api.list_workbooks(&args.query, page)).await?;
    constrain_to_output(policies::workbooks(), &items, &ctx.bounded)
}

pub(super) async fn get<A: SiteApi>(
    api: &A,
    ctx: &ToolContext,
    id: &str,
) -> Result<ToolOutput, ToolError> {
    let workbook = resolve(ContentKind::Workbook, api.get_workbook(id)).await?;
    if !policies::workbooks().permits(&workbook, &ctx.bounded) {
        tracing::info!(workbook_id = %id, "workbook excluded by bounded context");
        return Err(ContentError::NotAllowed {
            kind: ContentKind::Workbook,
        }
        .into());
    }
    Ok(ToolOutput::Item(to_json(&workbook)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::ListQuery;
    use crate::tools::fake::{FakeSite, allow, workbook};
    use std::sync::Arc;
    use tableau_mcp_core::bounded::{BoundedContext, ConstrainedResult};

    fn ctx(bounded: BoundedContext, max_result_limit: Option<u64>) -> ToolContext {
        ToolContext {
            bounded: Arc::new(bounded),
            max_result_limit,
        }
    }

    fn site() -> FakeSite {
        let mut site = FakeSite::new("u1");
        site.workbooks = vec![workbook("w1", "p1"), workbook("w2", "p2")];
        site
    }

    #[tokio::test]
    async fn project_allow_list_keeps_only_matching_workbooks() {
        let site = site();
        let bounded = BoundedContext {
            project_ids: allow(&["p1"]),
            ..BoundedContext::default()
        };
        let output = list(&site, &ctx(bounded, None), &ListArgs::default())
            .await
            .unwrap();
        let ToolOutput::Constrained(ConstrainedResult::Success(items)) = output else {
            panic!("expected success");
        };
        assert_eq!(items.as_array().unwrap().len(), 1);
        assert_eq!(items[0]["id"], "w1");
    }

    #[tokio::test]
    async fn filter_and_page_size_reach_the_site() {
        let mut site = site();
        site.workbooks = (0..5).map(|i| workbook(&format!("w{i}"), "p1")).collect();
        let args = ListArgs {
            page_size: Some(2),
            limit: Some(3),
            query: ListQuery {
                filter: Some("name:eq:Sales".to_string()),
                ..ListQuery::default()
            },
        };
        list(&site, &ctx(BoundedContext::default(), None), &args)
            .await
            .unwrap();
        assert_eq!(site.calls(), vec!["list_workbooks:1", "list_workbooks:2"]);
        assert!(
            site.queries
                .borrow()
                .iter()
                .all(|q| q.filter.as_deref() == Some("name:eq:Sales"))
        );
    }

    #[tokio::test]
    async fn get_outside_allow_list_is_not_allowed() {
        let site = site();
        let bounded = BoundedContext {
            workbook_ids: allow(&["w1"]),
            ..BoundedContext::default()
        };
        let err = get(&site, &ctx(bounded, None), "w2").await.err().unwrap();
        assert_eq!(err.code, "workbook-not-allowed");
    }

    #[tokio::test]
    async fn get_unknown_workbook_is_not_found() {
        let site = site();
        let err = get(&site, &ctx(BoundedContext::default(), None), "w9")
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, "workbook-not-found");
    }

    #[tokio::test]
    async fn get_permitted_workbook() {
        let site = site();
        let ToolOutput::Item(item) = get(&site, &ctx(BoundedContext::default(), None), "w2")
            .await
            .unwrap()
        else {
            panic!("expected item");
        };
        assert_eq!(item["project"]["id"], "p2");
    }
}
