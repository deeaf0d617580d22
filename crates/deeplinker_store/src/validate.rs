//! Admission checks for records written through the admin tooling.
//!
//! The resolver never validates: it tolerates whatever the store holds.

use deeplinker_protocol::LinkRecord;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkValidationError {
    #[error("Slug is required")]
    EmptySlug,
    #[error("Slug must contain only letters, numbers, hyphens, and underscores: '{0}'")]
    InvalidSlug(String),
    #[error("At least one destination URL must be provided for '{0}'")]
    NoDestination(String),
}

/// Slugs are `[A-Za-z0-9_-]+`.
pub fn validate_slug(slug: &str) -> Result<(), LinkValidationError> {
    if slug.is_empty() {
        return Err(LinkValidationError::EmptySlug);
    }
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(LinkValidationError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// A record accepted by `add-link`: valid slug and at least one URL.
pub fn validate_new_link(link: &LinkRecord) -> Result<(), LinkValidationError> {
    validate_slug(&link.slug)?;
    if !link.has_destination() {
        return Err(LinkValidationError::NoDestination(link.slug.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("hello").is_ok());
        assert!(validate_slug("Product_2024-v2").is_ok());
        assert_eq!(validate_slug(""), Err(LinkValidationError::EmptySlug));
        for bad in ["a b", "a/b", "ünï", "a?b", "a.b"] {
            assert_eq!(
                validate_slug(bad),
                Err(LinkValidationError::InvalidSlug(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_new_link_needs_destination() {
        let link = LinkRecord::new("empty");
        assert_eq!(
            validate_new_link(&link),
            Err(LinkValidationError::NoDestination("empty".to_string()))
        );
        assert!(validate_new_link(&link.with_fallback_url("https://example.com")).is_ok());
    }
}
