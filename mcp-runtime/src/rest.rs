use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tableau_mcp_core::content::{CustomView, Datasource, FavoriteEntry, Favorites, View, Workbook};
use tableau_mcp_core::pagination::{Page, PageRequest, Pagination};

use crate::auth::Credentials;
use crate::error::RestError;
use crate::util::{client, parse_response_body};

const AUTH_HEADER: &str = "X-Tableau-Auth";

/// Optional server-side query knobs forwarded to list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
}

/// The slice of the Tableau site API the tools depend on.
///
/// One implementation talks HTTP ([`RestSession`]); tests use an in-memory fake.
#[allow(async_fn_in_trait)]
pub trait SiteApi {
    fn site_id(&self) -> &str;
    /// The signed-in user. Custom view ownership is checked against this id.
    fn user_id(&self) -> &str;

    async fn list_custom_views(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<CustomView>, RestError>;
    async fn get_custom_view(&self, id: &str) -> Result<CustomView, RestError>;
    async fn get_custom_view_data(&self, id: &str, max_age: Option<u64>)
    -> Result<String, RestError>;
    async fn get_custom_view_image(
        &self,
        id: &str,
        max_age: Option<u64>,
    ) -> Result<Vec<u8>, RestError>;

    async fn get_favorites(&self) -> Result<Favorites, RestError>;

    async fn list_workbooks(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Workbook>, RestError>;
    async fn get_workbook(&self, id: &str) -> Result<Workbook, RestError>;

    async fn list_views(&self, query: &ListQuery, page: PageRequest)
    -> Result<Page<View>, RestError>;
    async fn get_view(&self, id: &str) -> Result<View, RestError>;
    async fn get_view_data(&self, id: &str, max_age: Option<u64>) -> Result<String, RestError>;
    async fn get_view_image(&self, id: &str, max_age: Option<u64>) -> Result<Vec<u8>, RestError>;

    async fn list_datasources(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Datasource>, RestError>;
}

/// Unauthenticated entry point. Every tool invocation signs in afresh.
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
    site_content_url: String,
    credentials: Credentials,
}

impl RestClient {
    pub fn new(
        server: &Url,
        api_version: &str,
        site_content_url: &str,
        credentials: Credentials,
    ) -> Self {
        Self {
            http: client(),
            api_base: format!(
                "{}/api/{}",
                server.as_str().trim_end_matches('/'),
                api_version
            ),
            site_content_url: site_content_url.to_string(),
            credentials,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn sign_in(&self, scopes: &[&str]) -> Result<RestSession, RestError> {
        let url = format!("{}/auth/signin", self.api_base);
        let body = self.credentials.signin_body(&self.site_content_url, scopes)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| RestError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| RestError::Http {
            url: url.clone(),
            source,
        })?;
        let payload = parse_response_body(&bytes);
        if !status.is_success() {
            let detail = payload
                .pointer("/error/detail")
                .and_then(Value::as_str)
                .unwrap_or("no detail provided");
            return Err(RestError::Auth(format!(
                "Tableau rejected {} credentials with HTTP {}: {detail}",
                self.credentials.method(),
                status.as_u16()
            )));
        }

        let field = |pointer: &str| {
            payload
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RestError::Decode {
                    url: url.clone(),
                    message: format!("sign-in response is missing {pointer}"),
                })
        };

        Ok(RestSession {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            token: field("/credentials/token")?,
            site_id: field("/credentials/site/id")?,
            user_id: field("/credentials/user/id")?,
        })
    }
}

/// An authenticated session scoped to one site and one user.
pub struct RestSession {
    http: reqwest::Client,
    api_base: String,
    token: String,
    site_id: String,
    user_id: String,
}

impl RestSession {
    pub async fn sign_out(self) -> Result<(), RestError> {
        let url = format!("{}/auth/signout", self.api_base);
        let response = self
            .http
            .post(&url)
            .header(AUTH_HEADER, &self.token)
            .send()
            .await
            .map_err(|source| RestError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.unwrap_or_default();
        Err(RestError::Status {
            url,
            status: status.as_u16(),
            body: parse_response_body(&bytes),
        })
    }

    fn site_url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, RestError> {
        site_url(&self.api_base, &self.site_id, segments, query)
    }

    async fn get_raw(&self, url: Url, accept: &str) -> Result<Vec<u8>, RestError> {
        let display = url.to_string();
        let response = self
            .http
            .request(Method::GET, url)
            .header(AUTH_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|source| RestError::Http {
                url: display.clone(),
                source,
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| RestError::Http {
            url: display.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(RestError::Status {
                url: display,
                status: status.as_u16(),
                body: parse_response_body(&bytes),
            });
        }
        Ok(bytes.to_vec())
    }

    async fn get_json(&self, segments: &[&str], query: &[(&str, String)]) -> Result<(String, Value), RestError> {
        let url = self.site_url(segments, query)?;
        let display = url.to_string();
        let bytes = self.get_raw(url, "application/json").await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| RestError::Decode {
            url: display.clone(),
            message: e.to_string(),
        })?;
        Ok((display, body))
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &ListQuery,
        page: PageRequest,
        container: (&str, &str),
    ) -> Result<Page<T>, RestError> {
        let mut params = vec![
            ("pageSize", page.page_size.to_string()),
            ("pageNumber", page.page_number.to_string()),
        ];
        if let Some(filter) = &query.filter {
            params.push(("filter", filter.clone()));
        }
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        if let Some(fields) = &query.fields {
            params.push(("fields", fields.clone()));
        }
        let (url, body) = self.get_json(segments, &params).await?;
        decode_page(&url, &body, container)
    }

    async fn get_item<T: DeserializeOwned>(&self, segments: &[&str], key: &str) -> Result<T, RestError> {
        let (url, body) = self.get_json(segments, &[]).await?;
        decode_item(&url, &body, key)
    }

    async fn get_text(&self, segments: &[&str], max_age: Option<u64>) -> Result<String, RestError> {
        let url = self.site_url(segments, &max_age_param(max_age))?;
        let bytes = self.get_raw(url, "text/csv").await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_image(&self, segments: &[&str], max_age: Option<u64>) -> Result<Vec<u8>, RestError> {
        let mut query = vec![("resolution", "high".to_string())];
        query.extend(max_age_param(max_age));
        let url = self.site_url(segments, &query)?;
        self.get_raw(url, "image/png").await
    }
}

impl SiteApi for RestSession {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_custom_views(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<CustomView>, RestError> {
        let query = ListQuery {
            filter: Some(format!("ownerId:eq:{}", self.user_id)),
            ..query.clone()
        };
        self.get_page(&["customviews"], &query, page, ("customViews", "customView"))
            .await
    }

    async fn get_custom_view(&self, id: &str) -> Result<CustomView, RestError> {
        self.get_item(&["customviews", id], "customView")
            .await
    }

    async fn get_custom_view_data(
        &self,
        id: &str,
        max_age: Option<u64>,
    ) -> Result<String, RestError> {
        self.get_text(&["customviews", id, "data"], max_age)
            .await
    }

    async fn get_custom_view_image(
        &self,
        id: &str,
        max_age: Option<u64>,
    ) -> Result<Vec<u8>, RestError> {
        self.get_image(&["customviews", id, "image"], max_age)
            .await
    }

    async fn get_favorites(&self) -> Result<Favorites, RestError> {
        let (url, body) = self
            .get_json(&["favorites", self.user_id.as_str()], &[])
            .await?;
        let entries: Vec<FavoriteEntry> = decode_list(&url, &body, ("favorites", "favorite"))?;
        Ok(Favorites::from_entries(entries))
    }

    async fn list_workbooks(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Workbook>, RestError> {
        self.get_page(&["workbooks"], query, page, ("workbooks", "workbook"))
            .await
    }

    async fn get_workbook(&self, id: &str) -> Result<Workbook, RestError> {
        self.get_item(&["workbooks", id], "workbook").await
    }

    async fn list_views(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<View>, RestError> {
        self.get_page(&["views"], query, page, ("views", "view")).await
    }

    async fn get_view(&self, id: &str) -> Result<View, RestError> {
        self.get_item(&["views", id], "view").await
    }

    async fn get_view_data(&self, id: &str, max_age: Option<u64>) -> Result<String, RestError> {
        self.get_text(&["views", id, "data"], max_age).await
    }

    async fn get_view_image(&self, id: &str, max_age: Option<u64>) -> Result<Vec<u8>, RestError> {
        self.get_image(&["views", id, "image"], max_age).await
    }

    async fn list_datasources(
        &self,
        query: &ListQuery,
        page: PageRequest,
    ) -> Result<Page<Datasource>, RestError> {
        self.get_page(&["datasources"], query, page, ("datasources", "datasource"))
            .await
    }
}

/// Build `{api_base}/sites/{site}/{segments..}`. Each segment is percent-encoded on its own,
/// so ids cannot add path components or start a query.
fn site_url(
    api_base: &str,
    site_id: &str,
    segments: &[&str],
    query: &[(&str, String)],
) -> Result<Url, RestError> {
    let invalid = |message: String| RestError::Decode {
        url: api_base.to_string(),
        message,
    };
    let mut url = Url::parse(api_base).map_err(|e| invalid(format!("invalid request URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| invalid("API base cannot carry a path".to_string()))?
        .pop_if_empty()
        .push("sites")
        .push(site_id)
        .extend(segments);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn max_age_param(max_age: Option<u64>) -> Vec<(&'static str, String)> {
    max_age
        .map(|minutes| vec![("maxAge", minutes.to_string())])
        .unwrap_or_default()
}

/// Tableau wraps collections as `{ "workbooks": { "workbook": [...] } }` and sends `{}` when
/// there is nothing to return.
fn decode_list<T: DeserializeOwned>(
    url: &str,
    body: &Value,
    (outer, inner): (&str, &str),
) -> Result<Vec<T>, RestError> {
    match body.get(outer).and_then(|container| container.get(inner)) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items.clone()).map_err(|e| RestError::Decode {
            url: url.to_string(),
            message: format!("{outer}.{inner}: {e}"),
        }),
    }
}

fn decode_page<T: DeserializeOwned>(
    url: &str,
    body: &Value,
    container: (&str, &str),
) -> Result<Page<T>, RestError> {
    let pagination: Pagination = body
        .get("pagination")
        .cloned()
        .ok_or_else(|| RestError::Decode {
            url: url.to_string(),
            message: "missing pagination block".to_string(),
        })
        .and_then(|raw| {
            serde_json::from_value(raw).map_err(|e| RestError::Decode {
                url: url.to_string(),
                message: format!("pagination: {e}"),
            })
        })?;
    Ok(Page {
        pagination,
        data: decode_list(url, body, container)?,
    })
}

fn decode_item<T: DeserializeOwned>(url: &str, body: &Value, key: &str) -> Result<T, RestError> {
    let item = body.get(key).cloned().ok_or_else(|| RestError::Decode {
        url: url.to_string(),
        message: format!("missing '{key}'"),
    })?;
    serde_json::from_value(item).map_err(|e| RestError::Decode {
        url: url.to_string(),
        message: format!("{key}: {e}"),
    })
}
