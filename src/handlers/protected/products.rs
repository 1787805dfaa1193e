// handlers/protected/products.rs - /api/products CRUD handlers
//
// All routes here sit behind middleware::require_token.

use axum::extract::{
    rejection::{JsonRejection, PathRejection},
    Path, Query, State,
};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Principal};
use crate::server::inventory::InventoryState;
use crate::store::records::{NewProduct, Product, ProductPatch};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

/// Product as returned to clients, with the derived total
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub total_price: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let total_price = product.total_price();
        Self { product, total_price }
    }
}

fn product_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::bad_request("Product id must be a UUID"))
}

/// GET /api/products?search=
pub async fn list(
    State(state): State<InventoryState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ProductView>> {
    let products = state.products.list_products(query.search.as_deref()).await?;
    Ok(ApiResponse::success(products.into_iter().map(ProductView::from).collect()))
}

/// POST /api/products
pub async fn create(
    State(state): State<InventoryState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<ProductView> {
    let Json(product) = payload?;
    if product.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let created = state.products.insert_product(product).await?;
    info!(id = %created.id, by = %principal.username, "Product created");
    Ok(ApiResponse::created(created.into()))
}

/// PUT /api/products/:id
pub async fn update(
    State(state): State<InventoryState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> ApiResult<ProductView> {
    let id = product_id(path)?;
    let Json(patch) = payload?;

    match state.products.update_product(id, patch).await? {
        Some(updated) => Ok(ApiResponse::success(updated.into())),
        None => Err(ApiError::not_found("Product not found")),
    }
}

/// DELETE /api/products/:id
pub async fn delete(
    State(state): State<InventoryState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Value> {
    let id = product_id(path)?;

    if !state.products.delete_product(id).await? {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(ApiResponse::success(json!({ "id": id })))
}
