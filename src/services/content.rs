//! Shared pieces of the CMS services: the error type, slug generation and
//! input validation.

use crate::models::TransitionError;

/// Longest accepted title (characters)
pub const MAX_TITLE_LENGTH: usize = 200;

/// Longest accepted slug (bytes)
pub const MAX_SLUG_LENGTH: usize = 200;

/// Characters kept for generated excerpts
pub const EXCERPT_LENGTH: usize = 200;

/// Error types for CMS content operations
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slug already exists: {0}")]
    DuplicateSlug(String),

    /// Feature switched off in the site settings
    #[error("{0}")]
    Disabled(String),

    #[error("Invalid status change: {0}")]
    Transition(#[from] TransitionError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ContentError {
    pub fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} '{}'", what, key))
    }
}

/// Generate a URL-friendly slug from a title.
///
/// ASCII letters and digits are lower-cased and kept, non-ASCII characters
/// are kept as-is, everything else becomes a hyphen. Runs of hyphens
/// collapse and leading/trailing hyphens are trimmed.
pub fn generate_slug(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut prev_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || !c.is_ascii() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    let trimmed = result.trim_end_matches('-');
    let mut end = trimmed.len().min(MAX_SLUG_LENGTH);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_end_matches('-').to_string()
}

/// Resolve the slug to store: an explicit one is normalised, otherwise it is
/// derived from the title.
pub(crate) fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, ContentError> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => generate_slug(s),
        None => generate_slug(title),
    };
    if slug.is_empty() {
        return Err(ContentError::Validation(
            "Slug cannot be empty; use a title with letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

pub(crate) fn validate_title(title: &str) -> Result<(), ContentError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentError::Validation("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ContentError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

pub(crate) fn validate_content(content: &str) -> Result<(), ContentError> {
    if content.trim().is_empty() {
        return Err(ContentError::Validation("Content cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug_simple() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  Merge   PDF_files  "), "merge-pdf-files");
    }

    #[test]
    fn test_generate_slug_keeps_non_ascii() {
        assert_eq!(generate_slug("PDF को जोड़ें"), "pdf-को-जोड़ें");
        assert_eq!(generate_slug("Café crème"), "café-crème");
    }

    #[test]
    fn test_generate_slug_only_punctuation() {
        assert_eq!(generate_slug("!!! ---"), "");
    }

    #[test]
    fn test_generate_slug_caps_length() {
        let slug = generate_slug(&"é".repeat(300));
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(slug.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(Some("  My Slug "), "ignored").unwrap(), "my-slug");
        assert_eq!(resolve_slug(None, "Compress PDF").unwrap(), "compress-pdf");
        assert_eq!(resolve_slug(Some(""), "From Title").unwrap(), "from-title");
        assert!(matches!(resolve_slug(None, "???"), Err(ContentError::Validation(_))));
    }

    #[test]
    fn test_validation() {
        assert!(validate_title("  ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
        assert!(validate_title("ok").is_ok());
        assert!(validate_content("\n\t").is_err());
        assert!(validate_content("body").is_ok());
    }
}
