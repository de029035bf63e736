use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Value, json};

/// Server-side allow-lists restricting which content this deployment may expose.
///
/// `None` for a dimension means "no restriction". Built once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedContext {
    pub project_ids: Option<HashSet<String>>,
    pub workbook_ids: Option<HashSet<String>>,
    pub datasource_ids: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Project,
    Workbook,
    Datasource,
}

impl BoundedContext {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn allowed(&self, dimension: Dimension) -> Option<&HashSet<String>> {
        match dimension {
            Dimension::Project => self.project_ids.as_ref(),
            Dimension::Workbook => self.workbook_ids.as_ref(),
            Dimension::Datasource => self.datasource_ids.as_ref(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.project_ids.is_none() && self.workbook_ids.is_none() && self.datasource_ids.is_none()
    }
}

/// Outcome of running a raw result set through a [`ResourcePolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConstrainedResult<T> {
    /// Nothing came back from the server.
    NoData { message: String },
    /// Something came back but every item was excluded by the bounded context.
    FilteredEmpty { message: String },
    Success(T),
}

impl<T> ConstrainedResult<T> {
    pub fn is_empty(&self) -> bool {
        !matches!(self, ConstrainedResult::Success(_))
    }

    pub fn empty_message(&self) -> Option<&str> {
        match self {
            ConstrainedResult::NoData { message } | ConstrainedResult::FilteredEmpty { message } => {
                Some(message)
            }
            ConstrainedResult::Success(_) => None,
        }
    }
}

impl<T: Serialize> ConstrainedResult<T> {
    pub fn to_value(&self) -> Value {
        match self {
            ConstrainedResult::NoData { message } => json!({
                "type": "empty",
                "reason": "no_data",
                "message": message
            }),
            ConstrainedResult::FilteredEmpty { message } => json!({
                "type": "empty",
                "reason": "filtered",
                "message": message
            }),
            ConstrainedResult::Success(result) => json!({
                "type": "success",
                "result": result
            }),
        }
    }
}

type IdAccessor<T> = fn(&T) -> Option<&str>;

/// Filtering rules for one resource kind: which bounded-context dimensions apply and how to
/// read the relevant id off an item.
pub struct ResourcePolicy<T> {
    no_data_message: String,
    filtered_message: String,
    filters: Vec<(Dimension, IdAccessor<T>)>,
}

impl<T> ResourcePolicy<T> {
    /// `plural` names the resource in messages, e.g. "favorite workbooks".
    /// `noun` is the unqualified plural used in the policy sentence, e.g. "workbooks".
    pub fn new(plural: &str, noun: &str) -> Self {
        Self {
            no_data_message: format!("No {plural} found for the current user."),
            filtered_message: [
                format!(
                    "The set of allowed {noun} that can be accessed is limited by the server configuration."
                ),
                format!(
                    "While {plural} were found, they were all filtered out by the server configuration."
                ),
            ]
            .join(" "),
            filters: Vec::new(),
        }
    }

    pub fn with_no_data_message(mut self, message: impl Into<String>) -> Self {
        self.no_data_message = message.into();
        self
    }

    pub fn filter(mut self, dimension: Dimension, accessor: IdAccessor<T>) -> Self {
        self.filters.push((dimension, accessor));
        self
    }

    /// Whether a single item passes every dimension configured for this kind.
    pub fn permits(&self, item: &T, bounded: &BoundedContext) -> bool {
        self.filters.iter().all(|(dimension, accessor)| {
            match bounded.allowed(*dimension) {
                None => true,
                Some(allowed) => accessor(item).is_some_and(|id| allowed.contains(id)),
            }
        })
    }

    pub fn constrain(&self, items: &[T], bounded: &BoundedContext) -> ConstrainedResult<Vec<T>>
    where
        T: Clone,
    {
        if items.is_empty() {
            return ConstrainedResult::NoData {
                message: self.no_data_message.clone(),
            };
        }

        let kept: Vec<T> = items
            .iter()
            .filter(|item| self.permits(item, bounded))
            .cloned()
            .collect();

        if kept.is_empty() {
            return ConstrainedResult::FilteredEmpty {
                message: self.filtered_message.clone(),
            };
        }

        ConstrainedResult::Success(kept)
    }
}

/// Parse a comma-separated id list. Whitespace is trimmed and blanks are skipped.
pub fn parse_id_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
