//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{BuyerId, NewOrder, Order, SellerOrder};
use lifecycle::{CancellationOutcome, OrderQuery, Page};
use serde::Deserialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub buyer_id: BuyerId,
}

/// POST /orders — create an order from checkout input.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    req: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = req?;
    let order = state.service.create(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders — list orders, optionally filtered by buyer and status.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OrderQuery>, QueryRejection>,
) -> Result<Json<Page<Order>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.service.list(query).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    Ok(Json(state.service.get(id).await?))
}

/// GET /orders/by-number/{number}
#[tracing::instrument(skip(state))]
pub async fn get_by_number(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.service.get_by_order_number(&number).await?))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(req) = req?;
    let id: OrderId = parse_id("order", &id)?;
    Ok(Json(
        state.service.update_order_status(id, &req.status).await?,
    ))
}

/// POST /orders/{id}/cancel — cancel on behalf of the buyer in the body.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    req: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<CancellationOutcome>, ApiError> {
    let Json(req) = req?;
    let id: OrderId = parse_id("order", &id)?;
    Ok(Json(state.service.cancel(id, &req.buyer_id).await?))
}

/// GET /orders/{id}/seller-orders
#[tracing::instrument(skip(state))]
pub async fn seller_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SellerOrder>>, ApiError> {
    let id: OrderId = parse_id("order", &id)?;
    Ok(Json(state.service.list_seller_orders_for_order(id).await?))
}
