//! Product repository: catalog listing, lookup and admin writes.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use marigold_core::ProductId;

use super::RepositoryError;
use crate::models::{Product, ProductInput};

const PRODUCT_COLUMNS: &str = "id, name, slug, description, short_description, image, images, \
     brand, stock, price, discount, sizes, colors, categories, tags, specifications, rating, \
     review_count, created_at, updated_at";

/// Column a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Price,
    Name,
    Rating,
}

impl SortField {
    /// Parse the `sortBy` query value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(Self::CreatedAt),
            "price" => Some(Self::Price),
            "name" => Some(Self::Name),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Price => "price",
            Self::Name => "name",
            Self::Rating => "rating",
        }
    }
}

/// Filters, sort and page for a catalog listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: bool,
    pub min_rating: Option<rust_decimal::Decimal>,
    pub sort: SortField,
    pub descending: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `query` and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product"
        ));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(query.sort.column())
            .push(if query.descending { " DESC" } else { " ASC" })
            .push(", id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let products = select
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM storefront.product");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        Ok((products, total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Fetch every product in `ids` that still exists. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Up to `limit` other products sharing at least one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        if product.categories.is_empty() {
            return Ok(Vec::new());
        }

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product \
             WHERE id <> $1 AND categories && $2 \
             ORDER BY rating DESC, created_at DESC LIMIT $3"
        ))
        .bind(product.id)
        .bind(&product.categories)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict("slug")` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.product (name, slug, description, short_description, image, \
             images, brand, stock, price, discount, sizes, colors, categories, tags, specifications) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        bind_input(sqlx::query_as::<_, Product>(&sql), input)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "slug"))
    }

    /// Overwrite every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict("slug")` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.product SET name = $1, slug = $2, description = $3, \
             short_description = $4, image = $5, images = $6, brand = $7, stock = $8, \
             price = $9, discount = $10, sizes = $11, colors = $12, categories = $13, \
             tags = $14, specifications = $15 \
             WHERE id = $16 RETURNING {PRODUCT_COLUMNS}"
        );
        bind_input(sqlx::query_as::<_, Product>(&sql), input)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "slug"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Insert or replace a product keyed by slug. Used by catalog seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_slug(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.product (name, slug, description, short_description, image, \
             images, brand, stock, price, discount, sizes, colors, categories, tags, specifications) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, short_description = EXCLUDED.short_description, \
             image = EXCLUDED.image, images = EXCLUDED.images, brand = EXCLUDED.brand, \
             stock = EXCLUDED.stock, price = EXCLUDED.price, discount = EXCLUDED.discount, \
             sizes = EXCLUDED.sizes, colors = EXCLUDED.colors, categories = EXCLUDED.categories, \
             tags = EXCLUDED.tags, specifications = EXCLUDED.specifications \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let product = bind_input(sqlx::query_as::<_, Product>(&sql), input)
            .fetch_one(self.pool)
            .await?;

        Ok(product)
    }

    /// Delete a product. Reviews cascade; cart and wishlist lines are pruned
    /// lazily when next read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

type ProductQueryAs<'q> =
    sqlx::query::QueryAs<'q, Postgres, Product, sqlx::postgres::PgArguments>;

/// Bind the fifteen editable columns in declaration order.
fn bind_input<'q>(query: ProductQueryAs<'q>, input: &'q ProductInput) -> ProductQueryAs<'q> {
    query
        .bind(&input.name)
        .bind(input.slug.as_str())
        .bind(&input.description)
        .bind(&input.short_description)
        .bind(input.image.as_deref())
        .bind(&input.images)
        .bind(input.brand.as_deref())
        .bind(input.stock)
        .bind(input.price)
        .bind(input.discount)
        .bind(&input.sizes)
        .bind(&input.colors)
        .bind(&input.categories)
        .bind(&input.tags)
        .bind(Json(&input.specifications))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    let mut first = true;

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        push_conjunction(builder, &mut first);
        builder
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        push_conjunction(builder, &mut first);
        builder.push_bind(category.to_string()).push(" = ANY(categories)");
    }
    if let Some(min) = query.min_price {
        push_conjunction(builder, &mut first);
        builder.push("price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        push_conjunction(builder, &mut first);
        builder.push("price <= ").push_bind(max);
    }
    if query.in_stock {
        push_conjunction(builder, &mut first);
        builder.push("stock > 0");
    }
    if let Some(rating) = query.min_rating {
        push_conjunction(builder, &mut first);
        builder.push("rating >= ").push_bind(rating);
    }
}

fn push_conjunction(builder: &mut QueryBuilder<'_, Postgres>, first: &mut bool) {
    builder.push(if std::mem::take(first) { " WHERE " } else { " AND " });
}

/// Escape `%`, `_` and `\` so user input matches literally under ILIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("price"), Some(SortField::Price));
        assert_eq!(SortField::parse("createdAt"), Some(SortField::CreatedAt));
        assert_eq!(SortField::parse("price; DROP TABLE"), None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("kurta"), "kurta");
    }

    #[test]
    fn test_filters_render_placeholders() {
        let query = ProductQuery {
            search: Some("shirt".into()),
            category: Some("men".into()),
            min_price: Some(100),
            in_stock: true,
            ..ProductQuery::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM storefront.product");
        push_filters(&mut builder, &query);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM storefront.product WHERE (name ILIKE $1 OR description ILIKE $2 \
             OR brand ILIKE $3) AND $4 = ANY(categories) AND price >= $5 AND stock > 0"
        );
    }

    #[test]
    fn test_no_filters_no_where() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        push_filters(&mut builder, &ProductQuery::default());
        assert_eq!(builder.sql(), "SELECT 1");
    }
}
