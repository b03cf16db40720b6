use keepsake_types::api::{
    AddContentRequest, AddTagRequest, AddTagsToContentRequest, FieldIssue, LoginRequest,
    RegisterRequest, UpdateProfileRequest,
};
use keepsake_types::models::ContentType;

use crate::error::ApiError;

pub const MIN_USERNAME_LEN: usize = 8;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Request bodies that check their own fields before any store access.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldIssue::new(field, message));
    }

    fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, "is required");
            return false;
        }
        true
    }

    fn min_len(&mut self, field: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.push(field, format!("must be at least {} characters", min));
        }
    }

    fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.push(field, "must be a valid email address");
        }
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

/// `local@domain.tld` with word characters, `.`, `-`, `+` and `_` in the
/// local part and a dotted domain ending in an alphabetic label of two or
/// more letters.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'));

    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels
            .last()
            .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    local_ok && domain_ok
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        issues.required("name", &self.name);
        if issues.required("username", &self.username) {
            issues.min_len("username", &self.username, MIN_USERNAME_LEN);
        }
        if issues.required("email", &self.email) {
            issues.email("email", &self.email);
        }
        if issues.required("password", &self.password) {
            issues.min_len("password", &self.password, MIN_PASSWORD_LEN);
        }
        if self.password != self.confirm {
            issues.push("confirm", "Passwords do not match");
        }
        issues.finish()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        issues.required("identifier", &self.identifier);
        issues.required("password", &self.password);
        issues.finish()
    }
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        if let Some(name) = &self.name {
            issues.required("name", name);
        }
        if let Some(username) = &self.username {
            issues.min_len("username", username, MIN_USERNAME_LEN);
        }
        if let Some(email) = &self.email {
            issues.email("email", email);
        }
        if let Some(password) = &self.password {
            issues.min_len("password", password, MIN_PASSWORD_LEN);
        }
        issues.finish()
    }
}

impl Validate for AddContentRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        issues.required("link", &self.link);
        issues.required("title", &self.title);
        if self.kind.parse::<ContentType>().is_err() {
            let allowed: Vec<&str> = ContentType::ALL.iter().map(|t| t.as_str()).collect();
            issues.push("type", format!("must be one of: {}", allowed.join(", ")));
        }
        issues.finish()
    }
}

impl Validate for AddTagRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        issues.required("title", &self.title);
        issues.finish()
    }
}

impl Validate for AddTagsToContentRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut issues = Issues::default();
        issues.required("contentId", &self.content_id);
        if self.tag_ids.iter().any(|id| id.trim().is_empty()) {
            issues.push("tagIds", "must not contain empty ids");
        }
        issues.finish()
    }
}
