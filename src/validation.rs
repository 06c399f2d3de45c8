//! Input validation for quotesync.
//!
//! This module provides validation functions for user-supplied quote fields.
//! All validators return QuoteError::Validation on failure.

use std::collections::HashSet;

use crate::error::{QuoteError, QuoteResult};
use crate::models::Quote;

pub const MAX_QUOTE_TEXT_LENGTH: usize = 10_000;
pub const MAX_AUTHOR_LENGTH: usize = 200;
pub const MAX_CATEGORY_LENGTH: usize = 100;
pub const MAX_QUOTE_ID_LENGTH: usize = 128;

/// Pseudo-category meaning "no filter".
pub const ALL_CATEGORIES: &str = "All";

fn validate_required(value: &str, field_name: &str, max_len: usize) -> QuoteResult<()> {
    let stripped = value.trim();

    if stripped.is_empty() {
        return Err(QuoteError::validation(
            field_name,
            "cannot be empty or whitespace only",
        ));
    }

    if stripped.chars().count() > max_len {
        return Err(QuoteError::validation(
            field_name,
            format!(
                "cannot exceed {} characters (got {})",
                max_len,
                stripped.chars().count()
            ),
        ));
    }

    Ok(())
}

/// Validate quote text (required).
pub fn validate_quote_text(text: &str) -> QuoteResult<()> {
    validate_required(text, "text", MAX_QUOTE_TEXT_LENGTH)
}

/// Validate a category name (required, and not the reserved "All").
pub fn validate_category(category: &str) -> QuoteResult<()> {
    validate_required(category, "category", MAX_CATEGORY_LENGTH)?;

    if category.trim() == ALL_CATEGORIES {
        return Err(QuoteError::validation(
            "category",
            format!("'{}' is reserved", ALL_CATEGORIES),
        ));
    }

    Ok(())
}

/// Validate an author (optional, may be empty).
pub fn validate_author(author: &str) -> QuoteResult<()> {
    if author.trim().chars().count() > MAX_AUTHOR_LENGTH {
        return Err(QuoteError::validation(
            "author",
            format!("cannot exceed {} characters", MAX_AUTHOR_LENGTH),
        ));
    }
    Ok(())
}

/// Validate a caller-supplied quote identifier.
pub fn validate_quote_id(id: &str) -> QuoteResult<()> {
    if id.is_empty() {
        return Err(QuoteError::validation("id", "cannot be empty"));
    }
    if id.len() > MAX_QUOTE_ID_LENGTH {
        return Err(QuoteError::validation(
            "id",
            format!("cannot exceed {} bytes", MAX_QUOTE_ID_LENGTH),
        ));
    }
    Ok(())
}

/// Check that every quote id in a collection is unique.
///
/// Ids are not checked for shape: remote ids are opaque and are stored as
/// received.
pub fn validate_unique_ids(quotes: &[Quote]) -> QuoteResult<()> {
    let mut seen = HashSet::with_capacity(quotes.len());
    for quote in quotes {
        if !seen.insert(quote.id.as_str()) {
            return Err(QuoteError::validation(
                "id",
                format!("duplicate quote id '{}'", quote.id),
            ));
        }
    }
    Ok(())
}
