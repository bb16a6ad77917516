//! URL slugs for catalog entries.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing usable was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is longer than the column allows.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A lowercase, hyphen-separated URL segment.
///
/// ```
/// use marigold_core::Slug;
///
/// let slug = Slug::from_name("Men's Linen Shirt (Blue)").unwrap();
/// assert_eq!(slug.as_str(), "men-s-linen-shirt-blue");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 200;

    /// Derive a slug from a display name.
    ///
    /// ASCII letters and digits are kept (lowercased); every other run of
    /// characters collapses into a single hyphen. Leading and trailing
    /// hyphens are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII alphanumerics.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        Self::check(out)
    }

    /// Accept a caller-supplied slug, normalizing it the same way as names.
    ///
    /// # Errors
    ///
    /// Returns an error if the normalized slug is empty or too long.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        Self::from_name(s)
    }

    fn check(s: String) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_collapses_separators() {
        assert_eq!(
            Slug::from_name("  Cotton -- Kurta  ").map(Slug::into_inner),
            Ok("cotton-kurta".to_string())
        );
    }

    #[test]
    fn test_from_name_drops_non_ascii() {
        assert_eq!(
            Slug::from_name("Café Mug 2").map(Slug::into_inner),
            Ok("caf-mug-2".to_string())
        );
    }

    #[test]
    fn test_from_name_empty() {
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
        assert_eq!(Slug::from_name(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let once = Slug::from_name("Denim Jacket").map(Slug::into_inner);
        let twice = once.clone().and_then(|s| Slug::parse(&s).map(Slug::into_inner));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_too_long() {
        let name = "a".repeat(Slug::MAX_LENGTH + 1);
        assert!(matches!(
            Slug::from_name(&name),
            Err(SlugError::TooLong { .. })
        ));
    }
}
