// src/models.rs
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use validator::{Validate, ValidationError};

/// A stored password record.
///
/// Field names on the wire follow the original schema, so `password_details`
/// serializes as `password_Details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub id: Uuid,
    pub password_category: String,
    pub project_name: String,
    #[serde(rename = "password_Details")]
    pub password_details: String,
    pub date: DateTime<Utc>,
}

/// Input for a new record. A missing `date` is filled with the insertion time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewPasswordRecord {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub password_category: String,

    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub project_name: String,

    #[serde(default, rename = "password_Details")]
    #[validate(custom(function = "not_blank"))]
    pub password_details: String,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl NewPasswordRecord {
    pub fn new(category: &str, project: &str, details: &str) -> Self {
        Self {
            password_category: category.to_string(),
            project_name: project.to_string(),
            password_details: details.to_string(),
            date: None,
        }
    }
}

/// Partial update. `date` is deliberately absent: it never changes after insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RecordUpdate {
    #[validate(custom(function = "not_blank"))]
    pub password_category: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub project_name: Option<String>,

    #[serde(rename = "password_Details")]
    #[validate(custom(function = "not_blank"))]
    pub password_details: Option<String>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.password_category.is_none()
            && self.project_name.is_none()
            && self.password_details.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Exact match on the category
    pub password_category: Option<String>,
    /// Case-insensitive substring match on the project name
    pub project_name_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Oldest,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub sort: SortOrder,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit, sort: SortOrder::default() }
    }

    pub fn newest_first(mut self) -> Self {
        self.sort = SortOrder::Newest;
        self
    }

    /// Rows to skip before this page. Only meaningful once `page >= 1`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of results plus count metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: u64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: u64, request: &PageRequest) -> Self {
        let limit = u64::from(request.limit.max(1));
        let total_pages = total_docs.div_ceil(limit);
        let page = request.page;

        let has_prev_page = page > 1;
        let has_next_page = u64::from(page) < total_pages;

        Self {
            docs,
            total_docs,
            limit: request.limit,
            page,
            total_pages,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_record_passes_validation() {
        let new = NewPasswordRecord::new("email", "billing", "hunter2");
        assert!(new.validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let new = NewPasswordRecord::new("email", "   ", "");
        let errors = new.validate().unwrap_err();
        let fields = errors.field_errors();

        assert_eq!(fields.len(), 2);
        assert!(fields.contains_key("project_name"));
        assert!(!fields.contains_key("password_category"));
    }

    #[test]
    fn missing_json_fields_become_validation_errors() {
        let new: NewPasswordRecord =
            serde_json::from_str(r#"{"project_name": "billing", "password_Details": "x"}"#).unwrap();
        let errors = new.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password_category"));
        assert!(new.date.is_none());
    }

    #[test]
    fn update_only_validates_supplied_fields() {
        let update = RecordUpdate {
            project_name: Some("infra".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert!(!update.is_empty());

        let blank = RecordUpdate {
            password_details: Some(" ".into()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());
        assert!(RecordUpdate::default().is_empty());
    }

    #[test]
    fn page_metadata_for_middle_page() {
        let page = Page::new(vec![1, 2, 3], 10, &PageRequest::new(2, 3));
        assert_eq!(page.total_pages, 4);
        assert!(page.has_prev_page);
        assert!(page.has_next_page);
        assert_eq!(page.prev_page, Some(1));
        assert_eq!(page.next_page, Some(3));
    }

    #[test]
    fn page_metadata_for_empty_collection() {
        let page: Page<u8> = Page::new(vec![], 0, &PageRequest::new(1, 10));
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_prev_page);
        assert!(!page.has_next_page);
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn page_serializes_with_camel_case_keys() {
        let page = Page::new(vec!["a"], 1, &PageRequest::new(1, 5));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalDocs"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["hasNextPage"], false);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 25).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }
}
