use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bounded::{Dimension, ResourcePolicy};

/// `{ "id": "..." }` reference to another piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

/// Reference that also carries a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A saved, user-specific customization of a shared view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomView {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdRef>,
}

impl CustomView {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner.id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    /// Present on `get-workbook`, which returns the workbook's views inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdRef>,
}

/// One entry of the favorites array. The server sends a `label` plus exactly one content key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FavoriteEntry {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub workbook: Option<Workbook>,
    #[serde(default)]
    pub view: Option<View>,
    #[serde(default)]
    pub datasource: Option<Datasource>,
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default)]
    pub collection: Option<Collection>,
}

/// A user's favorites, split by content type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Favorites {
    pub workbooks: Vec<Workbook>,
    pub views: Vec<View>,
    pub datasources: Vec<Datasource>,
    pub projects: Vec<Project>,
    pub collections: Vec<Collection>,
}

impl Favorites {
    /// Split the mixed favorites array into typed buckets, keeping server order per bucket.
    /// Entries carrying none of the known content keys are skipped.
    pub fn from_entries(entries: Vec<FavoriteEntry>) -> Self {
        let mut favorites = Favorites::default();
        for entry in entries {
            if let Some(workbook) = entry.workbook {
                favorites.workbooks.push(workbook);
            } else if let Some(view) = entry.view {
                favorites.views.push(view);
            } else if let Some(datasource) = entry.datasource {
                favorites.datasources.push(datasource);
            } else if let Some(project) = entry.project {
                favorites.projects.push(project);
            } else if let Some(collection) = entry.collection {
                favorites.collections.push(collection);
            }
        }
        favorites
    }
}

fn ref_id<'a>(reference: &'a Option<NamedRef>) -> Option<&'a str> {
    reference.as_ref().map(|r| r.id.as_str())
}

pub mod policies {
    //! Per-kind instantiations of the bounded-context filter.

    use super::*;

    pub fn custom_views() -> ResourcePolicy<CustomView> {
        ResourcePolicy::<CustomView>::new("custom views", "custom views")
            .filter(Dimension::Workbook, |cv| ref_id(&cv.workbook))
    }

    pub fn favorite_workbooks() -> ResourcePolicy<Workbook> {
        ResourcePolicy::<Workbook>::new("favorite workbooks", "workbooks")
            .filter(Dimension::Project, |wb| ref_id(&wb.project))
            .filter(Dimension::Workbook, |wb| Some(wb.id.as_str()))
    }

    pub fn favorite_views() -> ResourcePolicy<View> {
        ResourcePolicy::<View>::new("favorite views", "views")
            .filter(Dimension::Workbook, |view| ref_id(&view.workbook))
    }

    pub fn favorite_projects() -> ResourcePolicy<Project> {
        ResourcePolicy::<Project>::new("favorite projects", "projects")
            .filter(Dimension::Project, |project| Some(project.id.as_str()))
    }

    pub fn favorite_datasources() -> ResourcePolicy<Datasource> {
        ResourcePolicy::<Datasource>::new("favorite datasources", "datasources")
            .filter(Dimension::Project, |ds| ref_id(&ds.project))
            .filter(Dimension::Datasource, |ds| Some(ds.id.as_str()))
    }

    pub fn workbooks() -> ResourcePolicy<Workbook> {
        ResourcePolicy::<Workbook>::new("workbooks", "workbooks")
            .with_no_data_message("No workbooks were found.")
            .filter(Dimension::Project, |wb| ref_id(&wb.project))
            .filter(Dimension::Workbook, |wb| Some(wb.id.as_str()))
    }

    pub fn views() -> ResourcePolicy<View> {
        ResourcePolicy::<View>::new("views", "views")
            .with_no_data_message("No views were found.")
            .filter(Dimension::Project, |view| ref_id(&view.project))
            .filter(Dimension::Workbook, |view| ref_id(&view.workbook))
    }

    pub fn datasources() -> ResourcePolicy<Datasource> {
        ResourcePolicy::<Datasource>::new("datasources", "datasources")
            .with_no_data_message("No datasources were found.")
            .filter(Dimension::Project, |ds| ref_id(&ds.project))
            .filter(Dimension::Datasource, |ds| Some(ds.id.as_str()))
    }
}
