//! In-memory `SiteApi` used by the tool tests.

use std::cell::RefCell;
use std::collections::HashSet;

use serde_json::{Value, json};
use tableau_mcp_core::content::{CustomView, Datasource, Favorites, View, Workbook};
use tableau_mcp_core::pagination::{Page, PageRequest, Pagination};

use crate::error::RestError;
use crate::rest::{ListQuery, SiteApi};

pub(crate) struct FakeSite {
    pub user_id: String,
    pub custom_views: Vec<CustomView>,
    pub workbooks: Vec<Workbook>,
    pub views: Vec<View>,
    pub datasources: Vec<Datasource>,
    pub favorites: Favorites,
    /// Ids whose data/image endpoints fail.
    pub broken_renditions: Vec<String>,
    pub offline: bool,
    pub calls: RefCell<Vec<String>>,
    pub queries: RefCell<Vec<ListQuery>>,
}

impl FakeSite {
    pub(crate) fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            custom_views: Vec::new(),
            workbooks: Vec::new(),
            views: Vec::new(),
            datasources: Vec::new(),
            favorites: Favorites::default(),
            broken_renditions: Vec::new(),
            offline: false,
            calls: RefCell::new(Vec::new()),
            queries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn called(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) -> Result<(), RestError> {
        self.calls.borrow_mut().push(call.clone());
        if self.offline {
            return Err(RestError::Decode {
                url: call,
                message: "site is offline".to_string(),
            });
        }
        Ok(())
    }

    fn page<T: Clone>(&self, items: &[T], request: PageRequest) -> Page<T> {
        let size = request.page_size as usize;
        let start = (request.page_number as usize - 1) * size;
        let data = items.iter().skip(start).take(size).cloned().collect();
        Page {
            pagination: Pagination {
                page_number: u64::from(request.page_number),
                page_size: u64::from(request.page_size),
                total_available: items.len() as u64,
            },
            data,
        }
    }

    fn rendition(&self, id: &str, payload: Vec<u8>) -> Result<Vec<u8>, RestError> {
        if self.broken_renditions.iter().any(|broken| broken == id) {
            return Err(status(500));
        }
        Ok(payload)
    }
}

fn status(code: u16) -> RestError {
    RestError::Status {
        url: "fake".to_string(),
        status: code,
        body: Value::Null,
    }
}

fn find<T: Clone>(items: &[T], id: &str, key: impl Fn(&T) -> &str) -> Result<T, RestError> {
    items
        .iter()
        .find(|item| key(item) == id)
        .cloned()
        .ok_or_else(|| status(404))
}

impl SiteApi for FakeSite {
    fn site_id(&self) -> &str {
        "site-1"
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_custom_views(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<CustomView>, RestError> {
        self.record(format!("list_custom_views:{}", page.page_number))?;
        self.queries.borrow_mut().push(query.clone());
        let owned: Vec<CustomView> = self
            .custom_views
            .iter()
            .filter(|cv| cv.is_owned_by(&self.user_id))
            .cloned()
            .collect();
        Ok(self.page(&owned, page))
    }

    async fn get_custom_view(&self, id: &str) -> Result<CustomView, RestError> {
        self.record(format!("get_custom_view:{id}"))?;
        find(&self.custom_views, id, |cv| cv.id.as_str())
    }

    async fn get_custom_view_data(
        &self,
        id: &str,
        _max_age: Option<u64>,
    ) -> Result<String, RestError> {
        self.record(format!("get_custom_view_data:{id}"))?;
        let bytes = self.rendition(id, format!("Region,Sales\nWest,{id}\n").into_bytes())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_custom_view_image(
        &self,
        id: &str,
        _max_age: Option<u64>,
    ) -> Result<Vec<u8>, RestError> {
        self.record(format!("get_custom_view_image:{id}"))?;
        self.rendition(id, b"\x89PNG\r\n".to_vec())
    }

    async fn get_favorites(&self) -> Result<Favorites, RestError> {
        self.record("get_favorites".to_string())?;
        Ok(self.favorites.clone())
    }

    async fn list_workbooks(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Workbook>, RestError> {
        self.record(format!("list_workbooks:{}", page.page_number))?;
        self.queries.borrow_mut().push(query.clone());
        Ok(self.page(&self.workbooks, page))
    }

    async fn get_workbook(&self, id: &str) -> Result<Workbook, RestError> {
        self.record(format!("get_workbook:{id}"))?;
        find(&self.workbooks, id, |wb| wb.id.as_str())
    }

    async fn list_views(&self, query: &ListQuery, page: PageRequest) -> Result<Page<View>, RestError> {
        self.record(format!("list_views:{}", page.page_number))?;
        self.queries.borrow_mut().push(query.clone());
        Ok(self.page(&self.views, page))
    }

    async fn get_view(&self, id: &str) -> Result<View, RestError> {
        self.record(format!("get_view:{id}"))?;
        find(&self.views, id, |view| view.id.as_str())
    }

    async fn get_view_data(&self, id: &str, _max_age: Option<u64>) -> Result<String, RestError> {
        self.record(format!("get_view_data:{id}"))?;
        let bytes = self.rendition(id, b"Category,Profit\nTech,10\n".to_vec())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_view_image(&self, id: &str, _max_age: Option<u64>) -> Result<Vec<u8>, RestError> {
        self.record(format!("get_view_image:{id}"))?;
        self.rendition(id, b"\x89PNG\r\n".to_vec())
    }

    async fn list_datasources(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Datasource>, RestError> {
        self.record(format!("list_datasources:{}", page.page_number))?;
        self.queries.borrow_mut().push(query.clone());
        Ok(self.page(&self.datasources, page))
    }
}

pub(crate) fn custom_view(id: &str, owner: &str, workbook: &str) -> CustomView {
    from_json(json!({
        "id": id,
        "name": format!("Custom {id}"),
        "owner": { "id": owner },
        "workbook": { "id": workbook },
        "view": { "id": format!("view-of-{id}") }
    }))
}

pub(crate) fn workbook(id: &str, project: &str) -> Workbook {
    from_json(json!({
        "id": id,
        "name": format!("Workbook {id}"),
        "project": { "id": project, "name": format!("Project {project}") }
    }))
}

pub(crate) fn view(id: &str, workbook: &str, project: &str) -> View {
    from_json(json!({
        "id": id,
        "name": format!("View {id}"),
        "workbook": { "id": workbook },
        "project": { "id": project }
    }))
}

pub(crate) fn datasource(id: &str, project: &str) -> Datasource {
    from_json(json!({
        "id": id,
        "name": format!("Datasource {id}"),
        "project": { "id": project, "name": format!("Project {project}") }
    }))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

pub(crate) fn allow(ids: &[&str]) -> Option<HashSet<String>> {
    Some(ids.iter().map(|id| id.to_string()).collect())
}
