//! Catalog route handlers: listing, detail and reviews.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use marigold_core::ProductId;

use crate::db::products::{ProductQuery, SortField};
use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireAuth;
use crate::models::{Product, ProductView, Review};
use crate::state::AppState;

use super::to_json;

/// Page size when the client gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 12;
/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;
/// How many related products the detail view carries.
const RELATED_LIMIT: i64 = 4;
const MAX_COMMENT_LENGTH: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{product}", get(show))
        .route("/{product}/reviews", get(reviews).post(create_review))
}

/// Catalog listing query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock: Option<bool>,
    pub min_rating: Option<Decimal>,
}

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    /// Read `page` and `limit`, clamping the size to `1..=MAX_PAGE_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns the `page` field error when it is below 1.
    pub fn from_params(
        page: Option<i64>,
        limit: Option<i64>,
    ) -> std::result::Result<Self, FieldErrors> {
        let number = page.unwrap_or(1);
        if number < 1 {
            return Err([("page", "page must be at least 1")].into_iter().collect());
        }
        Ok(Self {
            number,
            size: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        })
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }

    #[must_use]
    pub fn pagination(self, total: i64) -> Pagination {
        Pagination {
            total,
            page: self.number,
            pages: (total + self.size - 1) / self.size,
            limit: self.size,
        }
    }
}

/// Pagination block of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub limit: i64,
}

impl ListParams {
    /// Validate into a repository query and the requested page.
    ///
    /// # Errors
    ///
    /// Returns every invalid parameter at once.
    pub fn into_query(self) -> std::result::Result<(ProductQuery, Page), FieldErrors> {
        let mut errors = FieldErrors::new();

        let page = match Page::from_params(self.page, self.limit) {
            Ok(page) => Some(page),
            Err(e) => {
                errors = e;
                None
            }
        };

        let sort = match self.sort_by.as_deref() {
            None => SortField::default(),
            Some(value) => SortField::parse(value).unwrap_or_else(|| {
                errors.add("sortBy", "sortBy must be one of createdAt, price, name, rating");
                SortField::default()
            }),
        };

        let descending = match self.sort_order.as_deref() {
            None | Some("desc") => true,
            Some("asc") => false,
            Some(_) => {
                errors.add("sortOrder", "sortOrder must be asc or desc");
                true
            }
        };

        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            errors.add("minPrice", "minPrice must not exceed maxPrice");
        }

        let Some(page) = page else {
            return Err(errors);
        };
        let query = ProductQuery {
            search: self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            category: self.category.filter(|c| !c.is_empty()),
            min_price: self.min_price,
            max_price: self.max_price,
            in_stock: self.in_stock.unwrap_or(false),
            min_rating: self.min_rating,
            sort,
            descending,
            limit: page.size,
            offset: page.offset(),
        };
        errors.finish_with((query, page))
    }
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse<'a> {
    pub success: bool,
    pub products: Vec<ProductView<'a>>,
    pub pagination: Pagination,
}

/// List catalog products.
///
/// GET /api/products
///
/// # Errors
///
/// Returns a validation error for bad query parameters.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<serde_json::Value>> {
    let (query, page) = params.into_query().map_err(AppError::Validation)?;
    let (products, total) = ProductRepository::new(state.pool()).list(&query).await?;

    let body = ProductListResponse {
        success: true,
        products: products.iter().map(ProductView::from).collect(),
        pagination: page.pagination(total),
    };
    Ok(Json(to_json(&body)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetailResponse<'a> {
    success: bool,
    product: ProductView<'a>,
    related_products: Vec<ProductView<'a>>,
    reviews: Vec<Review>,
}

/// Resolve a path segment as an id first, then as a slug.
async fn resolve(repo: &ProductRepository<'_>, key: &str) -> Result<Product> {
    if let Ok(id) = key.parse::<ProductId>()
        && let Some(product) = repo.get_by_id(id).await?
    {
        return Ok(product);
    }
    repo.get_by_slug(key)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Product detail by id or slug, with related products and reviews.
///
/// GET /api/products/{product}
///
/// # Errors
///
/// Returns `AppError::NotFound` if neither the id nor the slug resolves.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> Result<Json<serde_json::Value>> {
    let repo = ProductRepository::new(state.pool());
    let product = resolve(&repo, &key).await?;
    let related = repo.related(&product, RELATED_LIMIT).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product.id)
        .await?;

    let body = ProductDetailResponse {
        success: true,
        product: ProductView::from(&product),
        related_products: related.iter().map(ProductView::from).collect(),
        reviews,
    };
    Ok(Json(to_json(&body)?))
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub success: bool,
    pub reviews: Vec<Review>,
}

/// Reviews of one product, newest first.
///
/// GET /api/products/{product}/reviews
///
/// # Errors
///
/// Returns `AppError::NotFound` if the product doesn't exist.
#[instrument(skip(state))]
pub async fn reviews(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> Result<Json<ReviewsResponse>> {
    let product = resolve(&ProductRepository::new(state.pool()), &key).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product.id)
        .await?;
    Ok(Json(ReviewsResponse {
        success: true,
        reviews,
    }))
}

/// `POST /api/products/{product}/reviews` body.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewPayload {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

impl ReviewPayload {
    fn validate(self) -> std::result::Result<(i32, String), FieldErrors> {
        let mut errors = FieldErrors::new();

        let rating = match self.rating.map(i32::try_from) {
            Some(Ok(r)) if (1..=5).contains(&r) => r,
            Some(_) => {
                errors.add("rating", "rating must be between 1 and 5");
                0
            }
            None => {
                errors.add("rating", "rating is required");
                0
            }
        };

        let comment = self.comment.map(|c| c.trim().to_string()).unwrap_or_default();
        if comment.is_empty() {
            errors.add("comment", "comment is required");
        } else if comment.chars().count() > MAX_COMMENT_LENGTH {
            errors.add(
                "comment",
                format!("comment must be at most {MAX_COMMENT_LENGTH} characters"),
            );
        }

        errors.finish_with((rating, comment))
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: Review,
}

/// Review a product. One review per user per product.
///
/// POST /api/products/{product}/reviews
///
/// # Errors
///
/// Returns 404 for an unknown product and a `review` conflict for a second
/// review by the same user.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    PathParam(product_id): PathParam<ProductId>,
    JsonBody(payload): JsonBody<ReviewPayload>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    let (rating, comment) = payload.validate().map_err(AppError::Validation)?;

    let review = ReviewRepository::new(state.pool())
        .create(product_id, user.id, rating, &comment)
        .await?;
    tracing::info!(review_id = %review.id, rating, "Review created");

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            success: true,
            review,
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_defaults() {
        let (query, page) = ListParams::default().into_query().unwrap();
        assert_eq!(page, Page { number: 1, size: DEFAULT_PAGE_SIZE });
        assert_eq!(query.sort, SortField::CreatedAt);
        assert!(query.descending);
        assert_eq!(query.offset, 0);
        assert!(!query.in_stock);
    }

    #[test]
    fn test_list_clamps_limit_and_offsets_page() {
        let params = ListParams {
            page: Some(3),
            limit: Some(500),
            sort_by: Some("price".into()),
            sort_order: Some("asc".into()),
            ..ListParams::default()
        };
        let (query, page) = params.into_query().unwrap();
        assert_eq!(page.size, MAX_PAGE_SIZE);
        assert_eq!(query.offset, 200);
        assert_eq!(query.sort, SortField::Price);
        assert!(!query.descending);
    }

    #[test]
    fn test_list_rejects_bad_params() {
        let params = ListParams {
            page: Some(0),
            sort_by: Some("popularity".into()),
            sort_order: Some("sideways".into()),
            min_price: Some(500),
            max_price: Some(100),
            ..ListParams::default()
        };
        let errors = params.into_query().unwrap_err();
        assert!(errors.get("page").is_some());
        assert!(errors.get("sortBy").is_some());
        assert!(errors.get("sortOrder").is_some());
        assert!(errors.get("minPrice").is_some());
    }

    #[test]
    fn test_pagination_rounds_pages_up() {
        let page = Page { number: 2, size: 12 };
        assert_eq!(
            page.pagination(25),
            Pagination { total: 25, page: 2, pages: 3, limit: 12 }
        );
        assert_eq!(page.pagination(0).pages, 0);
    }

    #[test]
    fn test_review_payload_validation() {
        let errors = ReviewPayload {
            rating: Some(6),
            comment: Some("  ".into()),
        }
        .validate()
        .unwrap_err();
        assert!(errors.get("rating").is_some());
        assert!(errors.get("comment").is_some());

        let (rating, comment) = ReviewPayload {
            rating: Some(4),
            comment: Some(" Soft fabric ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(rating, 4);
        assert_eq!(comment, "Soft fabric");
    }
}
