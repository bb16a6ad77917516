//! Seed the catalog from a YAML file.
//!
//! The file is a list of products using the same fields as the admin API:
//!
//! ```yaml
//! - name: Silk Scarf
//!   price: 1499
//!   stock: 20
//!   categories: [accessories]
//! - name: Linen Shirt
//!   slug: linen-shirt-white
//!   price: 2499
//!   discount: 10
//! ```
//!
//! Products are matched by slug, so seeding twice updates rather than
//! duplicates. The whole file is validated before anything is written.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use marigold_storefront::db::{ProductRepository, RepositoryError};
use marigold_storefront::error::FieldErrors;
use marigold_storefront::models::{ProductInput, ProductPayload};

use super::MissingDatabaseUrl;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid products")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Parse and validate every product in a catalog file.
///
/// Returns one `(index, errors)` pair per rejected entry.
///
/// # Errors
///
/// Returns `SeedError::Yaml` if the file is not a list of products.
pub fn parse_catalog(
    content: &str,
) -> Result<Result<Vec<ProductInput>, Vec<(usize, FieldErrors)>>, SeedError> {
    let payloads: Vec<ProductPayload> = serde_yaml::from_str(content)?;

    let mut inputs = Vec::with_capacity(payloads.len());
    let mut rejected = Vec::new();
    for (index, payload) in payloads.into_iter().enumerate() {
        match ProductInput::from_payload(payload, None) {
            Ok(input) => inputs.push(input),
            Err(errors) => rejected.push((index, errors)),
        }
    }

    Ok(if rejected.is_empty() {
        Ok(inputs)
    } else {
        Err(rejected)
    })
}

/// Upsert every product in `file_path`.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or if a write fails.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;

    let inputs = match parse_catalog(&content)? {
        Ok(inputs) => inputs,
        Err(rejected) => {
            error!("Catalog validation failed:");
            for (index, errors) in &rejected {
                error!("  - entry {index}: {errors}");
            }
            return Err(SeedError::Invalid(rejected.len()));
        }
    };
    info!(products = inputs.len(), "Catalog validated successfully");

    let database_url = super::database_url()?;
    let pool = super::connect(&database_url).await?;
    let repo = ProductRepository::new(&pool);

    for input in &inputs {
        let product = repo.upsert_by_slug(input).await?;
        info!(id = %product.id, slug = %product.slug, "Upserted product");
    }

    info!("Seeding complete! {} products written", inputs.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_derives_slugs() {
        let yaml = "
- name: Silk Scarf
  price: 1499
  stock: 20
  categories: [accessories]
- name: Linen Shirt
  slug: linen-shirt-white
  price: 2499
  discount: 10
";
        let inputs = parse_catalog(yaml).unwrap().unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].slug.as_str(), "silk-scarf");
        assert_eq!(inputs[0].stock, 20);
        assert_eq!(inputs[1].slug.as_str(), "linen-shirt-white");
        assert_eq!(inputs[1].discount, 10);
    }

    #[test]
    fn test_parse_catalog_reports_every_bad_entry() {
        let yaml = "
- name: Priceless
- name: Fine
  price: 100
- price: 100
";
        let rejected = parse_catalog(yaml).unwrap().unwrap_err();
        let indexes: Vec<usize> = rejected.iter().map(|(i, _)| *i).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert!(rejected[0].1.get("price").is_some());
        assert!(rejected[1].1.get("name").is_some());
    }

    #[test]
    fn test_parse_catalog_rejects_non_list() {
        assert!(matches!(
            parse_catalog("name: not a list"),
            Err(SeedError::Yaml(_))
        ));
    }
}
