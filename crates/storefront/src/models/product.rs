//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use marigold_core::{ProductId, Slug, discounted_price};

use crate::error::FieldErrors;

/// One `{key, value}` row of a product's specification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub key: String,
    pub value: String,
}

/// A catalog product as stored.
///
/// `price` is in whole currency units; `discount` is a percentage.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub brand: Option<String>,
    pub stock: i32,
    pub price: i64,
    pub discount: i32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub specifications: Json<Vec<Specification>>,
    pub rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price after discount, in whole units.
    #[must_use]
    pub fn discounted_price(&self) -> i64 {
        discounted_price(self.price, self.discount)
    }
}

/// Product JSON with the computed sale price.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub discounted_price: i64,
    pub in_stock: bool,
}

impl<'a> From<&'a Product> for ProductView<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            product,
            discounted_price: product.discounted_price(),
            in_stock: product.stock > 0,
        }
    }
}

/// Incoming product fields. Every field is optional so the same payload
/// serves creation, partial updates and catalog seeding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
    pub stock: Option<i64>,
    pub price: Option<i64>,
    pub discount: Option<i64>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub specifications: Option<Vec<Specification>>,
}

/// Validated product fields ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub short_description: String,
    pub image: Option<String>,
    pub images: Vec<String>,
    pub brand: Option<String>,
    pub stock: i32,
    pub price: i64,
    pub discount: i32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub specifications: Vec<Specification>,
}

const MAX_NAME_LENGTH: usize = 200;

impl ProductInput {
    /// Validate a payload, filling absent fields from `existing`.
    ///
    /// Without `existing`, `name` and `price` are required and the slug is
    /// derived from the name when not given.
    ///
    /// # Errors
    ///
    /// Returns every invalid field at once.
    pub fn from_payload(
        payload: ProductPayload,
        existing: Option<&Product>,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = payload
            .name
            .map(|n| n.trim().to_string())
            .or_else(|| existing.map(|p| p.name.clone()))
            .unwrap_or_default();
        if name.is_empty() {
            errors.add("name", "name is required");
        } else if name.chars().count() > MAX_NAME_LENGTH {
            errors.add("name", format!("name must be at most {MAX_NAME_LENGTH} characters"));
        }

        let slug = match (payload.slug, existing) {
            (Some(s), _) => Slug::parse(&s),
            (None, Some(p)) => Slug::parse(&p.slug),
            (None, None) => Slug::from_name(&name),
        };
        let slug = match slug {
            Ok(s) => Some(s),
            Err(e) => {
                errors.add("slug", e.to_string());
                None
            }
        };

        let price = payload.price.or_else(|| existing.map(|p| p.price));
        match price {
            None => errors.add("price", "price is required"),
            Some(p) if p <= 0 => errors.add("price", "price must be greater than 0"),
            Some(_) => {}
        }

        let stock = payload
            .stock
            .or_else(|| existing.map(|p| i64::from(p.stock)))
            .unwrap_or(0);
        let stock = match i32::try_from(stock) {
            Ok(s) if s >= 0 => s,
            _ => {
                errors.add("stock", "stock must be a non-negative integer");
                0
            }
        };

        let discount = payload
            .discount
            .or_else(|| existing.map(|p| i64::from(p.discount)))
            .unwrap_or(0);
        let discount = match i32::try_from(discount) {
            Ok(d) if (0..=100).contains(&d) => d,
            _ => {
                errors.add("discount", "discount must be between 0 and 100");
                0
            }
        };

        let (Some(slug), Some(price), true) = (slug, price, errors.is_empty()) else {
            return Err(errors);
        };

        Ok(Self {
            name,
            slug,
            description: payload
                .description
                .or_else(|| existing.map(|p| p.description.clone()))
                .unwrap_or_default(),
            short_description: payload
                .short_description
                .or_else(|| existing.map(|p| p.short_description.clone()))
                .unwrap_or_default(),
            image: payload.image.or_else(|| existing.and_then(|p| p.image.clone())),
            images: merge_list(payload.images, existing.map(|p| &p.images)),
            brand: payload.brand.or_else(|| existing.and_then(|p| p.brand.clone())),
            stock,
            price,
            discount,
            sizes: merge_list(payload.sizes, existing.map(|p| &p.sizes)),
            colors: merge_list(payload.colors, existing.map(|p| &p.colors)),
            categories: merge_list(payload.categories, existing.map(|p| &p.categories)),
            tags: merge_list(payload.tags, existing.map(|p| &p.tags)),
            specifications: payload
                .specifications
                .or_else(|| existing.map(|p| p.specifications.0.clone()))
                .unwrap_or_default(),
        })
    }
}

/// Take the new list if given, else the stored one; drop blank entries.
fn merge_list(new: Option<Vec<String>>, old: Option<&Vec<String>>) -> Vec<String> {
    new.or_else(|| old.cloned())
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(name: &str, price: i64) -> ProductPayload {
        ProductPayload {
            name: Some(name.to_string()),
            price: Some(price),
            ..ProductPayload::default()
        }
    }

    fn stored() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(3),
            name: "Linen Shirt".to_string(),
            slug: "linen-shirt".to_string(),
            description: "Breathable".to_string(),
            short_description: String::new(),
            image: None,
            images: vec![],
            brand: Some("Marigold".to_string()),
            stock: 4,
            price: 1499,
            discount: 10,
            sizes: vec!["M".to_string()],
            colors: vec![],
            categories: vec!["shirts".to_string()],
            tags: vec![],
            specifications: Json(vec![]),
            rating: Decimal::ZERO,
            review_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_derives_slug() {
        let input = ProductInput::from_payload(payload("Cotton Kurta", 899), None).unwrap();
        assert_eq!(input.slug.as_str(), "cotton-kurta");
        assert_eq!(input.stock, 0);
        assert_eq!(input.discount, 0);
    }

    #[test]
    fn test_create_requires_name_and_price() {
        let errors = ProductInput::from_payload(ProductPayload::default(), None).unwrap_err();
        assert!(errors.get("name").is_some());
        assert!(errors.get("price").is_some());
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let p = ProductPayload {
            stock: Some(-1),
            discount: Some(101),
            ..payload("Mug", 0)
        };
        let errors = ProductInput::from_payload(p, None).unwrap_err();
        assert!(errors.get("price").is_some());
        assert!(errors.get("stock").is_some());
        assert!(errors.get("discount").is_some());
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let existing = stored();
        let patch = ProductPayload {
            price: Some(1299),
            name: Some("Linen Shirt II".to_string()),
            ..ProductPayload::default()
        };
        let input = ProductInput::from_payload(patch, Some(&existing)).unwrap();
        assert_eq!(input.price, 1299);
        assert_eq!(input.slug.as_str(), "linen-shirt");
        assert_eq!(input.discount, 10);
        assert_eq!(input.categories, vec!["shirts".to_string()]);
        assert_eq!(input.brand.as_deref(), Some("Marigold"));
    }

    #[test]
    fn test_view_uses_discounted_price() {
        let product = stored();
        let json = serde_json::to_value(ProductView::from(&product)).unwrap();
        assert_eq!(json["price"], 1499);
        assert_eq!(json["discountedPrice"], 1349);
        assert_eq!(json["inStock"], true);
        assert_eq!(json["reviewCount"], 0);
    }
}
