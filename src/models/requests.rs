//! Request DTOs for the contacts API
//!
//! Request bodies plus the query string accepted by the list and count
//! endpoints.

use serde::Deserialize;

use crate::expr::{Expr, Specification};
use crate::models::Contact;
use crate::query::QueryOptions;

/// Longest accepted contact name
const MAX_NAME_LENGTH: usize = 200;

fn validate_contact(name: &str, email: Option<&str>) -> Option<String> {
    if name.trim().is_empty() {
        return Some("Name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Some(format!(
            "Name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        ));
    }
    match email {
        Some(email) if !email.contains('@') => Some(format!("Invalid email '{}'", email)),
        _ => None,
    }
}

/// Request body for POST /contacts
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CreateContactRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_contact(&self.name, self.email.as_deref())
    }

    pub fn into_contact(self) -> Contact {
        Contact::new(self.name, self.email)
    }
}

/// Request body for PUT /contacts/:id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateContactRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UpdateContactRequest {
    pub fn validate(&self) -> Option<String> {
        validate_contact(&self.name, self.email.as_deref())
    }

    pub fn into_contact(self, id: i32) -> Contact {
        Contact {
            id,
            name: self.name,
            email: self.email,
        }
    }
}

/// Query string for GET /contacts and GET /contacts/count
///
/// # Fields
/// - `name`: exact name match
/// - `prefix`: case-insensitive name prefix
/// - `ids`: comma separated list of ids
/// - `page`/`size`: 1-based paging, ignored without `size`
/// - `sort`: comma separated fields, `-` prefix for descending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactQuery {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub ids: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub sort: Option<String>,
}

impl ContactQuery {
    /// Combines the given filters; no filters matches every contact.
    pub fn specification(&self) -> Result<Specification<Contact>, String> {
        let mut spec = Specification::all();

        if let Some(name) = self.name.as_deref() {
            let name = name.to_string();
            spec = spec.and_also(&Specification::build("c", |c| {
                c.member("name").eq(Expr::local("name", name))
            }));
        }

        if let Some(prefix) = self.prefix.as_deref() {
            let prefix = prefix.to_lowercase();
            spec = spec.and_also(&Specification::build("c", |c| {
                c.member("name")
                    .to_lower()
                    .starts_with(Expr::local("prefix", prefix))
            }));
        }

        if let Some(ids) = self.ids.as_deref() {
            let ids = parse_ids(ids)?;
            spec = spec.and_also(&Specification::build("c", |c| {
                Expr::local("ids", ids).contains(c.member("id"))
            }));
        }

        Ok(spec)
    }

    pub fn options(&self) -> QueryOptions {
        let mut options = QueryOptions::new();
        if let Some(sort) = self.sort.as_deref() {
            options = options.sort_from_str(sort);
        }
        if let Some(size) = self.size {
            options = options.paged(self.page.unwrap_or(1), size);
        }
        options
    }
}

fn parse_ids(ids: &str) -> Result<Vec<i32>, String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse().map_err(|_| format!("Invalid id '{}'", id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i32, name: &str) -> Contact {
        Contact {
            id,
            name: name.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_create_request_deserialize() {
        let json = r#"{"name": "Ada"}"#;
        let req: CreateContactRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Ada");
        assert!(req.email.is_none());
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validation_errors() {
        let empty = CreateContactRequest {
            name: "  ".to_string(),
            email: None,
        };
        assert!(empty.validate().is_some());

        let bad_email = UpdateContactRequest {
            name: "Ada".to_string(),
            email: Some("nowhere".to_string()),
        };
        assert!(bad_email.validate().unwrap().contains("nowhere"));

        let long = CreateContactRequest {
            name: "x".repeat(MAX_NAME_LENGTH + 1),
            email: None,
        };
        assert!(long.validate().is_some());
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let spec = ContactQuery::default().specification().unwrap();
        assert!(spec.matches_all());
        assert!(ContactQuery::default().options().is_empty());
    }

    #[test]
    fn test_filters_combine() {
        let query = ContactQuery {
            prefix: Some("A".to_string()),
            ids: Some("1, 3".to_string()),
            ..ContactQuery::default()
        };
        let spec = query.specification().unwrap();

        assert!(spec.is_satisfied_by(&contact(1, "ada")));
        assert!(!spec.is_satisfied_by(&contact(2, "Alan")));
        assert!(!spec.is_satisfied_by(&contact(3, "Grace")));
    }

    #[test]
    fn test_name_filter_is_exact() {
        let query = ContactQuery {
            name: Some("Ada".to_string()),
            ..ContactQuery::default()
        };
        let spec = query.specification().unwrap();
        assert!(spec.is_satisfied_by(&contact(1, "Ada")));
        assert!(!spec.is_satisfied_by(&contact(1, "Ada L")));
    }

    #[test]
    fn test_bad_ids_rejected() {
        let query = ContactQuery {
            ids: Some("1,two".to_string()),
            ..ContactQuery::default()
        };
        assert!(query.specification().is_err());
    }

    #[test]
    fn test_paging_needs_size() {
        let query = ContactQuery {
            page: Some(2),
            ..ContactQuery::default()
        };
        assert!(query.options().page().is_none());

        let query = ContactQuery {
            page: Some(2),
            size: Some(10),
            sort: Some("-name".to_string()),
            ..ContactQuery::default()
        };
        assert_eq!(query.options().page(), Some((2, 10)));
        assert_eq!(query.options().sort().len(), 1);
    }
}
