//! Seller order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use common::SellerOrderId;
use domain::{SellerId, SellerOrder};
use lifecycle::Page;
use serde::Deserialize;

use super::orders::UpdateStatusRequest;
use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// GET /seller-orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SellerOrder>, ApiError> {
    let id: SellerOrderId = parse_id("seller order", &id)?;
    Ok(Json(state.service.get_seller_order(id).await?))
}

/// PUT /seller-orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<SellerOrder>, ApiError> {
    let Json(req) = req?;
    let id: SellerOrderId = parse_id("seller order", &id)?;
    Ok(Json(
        state
            .service
            .update_seller_order_status(id, &req.status)
            .await?,
    ))
}

/// GET /sellers/{seller_id}/orders — a seller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_seller(
    State(state): State<Arc<AppState>>,
    Path(seller_id): Path<String>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<SellerOrder>>, ApiError> {
    let Query(params) = params?;
    let seller_id = SellerId::new(seller_id);
    if seller_id.is_blank() {
        return Err(ApiError::BadRequest("Seller ID is required".to_string()));
    }

    Ok(Json(
        state
            .service
            .list_seller_orders_for_seller(&seller_id, params.page, params.page_size)
            .await?,
    ))
}
