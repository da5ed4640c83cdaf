use crate::auth::{Action, AuthenticatedUser, Resource};
use crate::error::AppError;
use crate::models::{CreateOrderRequest, ReleaseResponse, SettleOrderRequest};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use types::ids::OrderId;
use types::order::Order;

pub async fn create_buy_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    user.require(Resource::Orders, Action::Create)?;
    user.require_account(payload.account_id)?;

    let request = payload.into_new_order(user.user_id);
    let order = state.run(move |c| c.create_buy_order(request)).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn create_sell_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    user.require(Resource::Orders, Action::Create)?;
    user.require_account(payload.account_id)?;

    let request = payload.into_new_order(user.user_id);
    let order = state.run(move |c| c.create_sell_order(request)).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Load an order the caller is allowed to see.
async fn visible_order(state: &AppState, user: &AuthenticatedUser, order_id: OrderId) -> Result<Order, AppError> {
    let order = state.run(move |c| c.get_order(order_id)).await?;
    user.require_account(order.account_id)?;
    Ok(order)
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    user.require(Resource::Orders, Action::Read)?;
    Ok(Json(visible_order(&state, &user, order_id).await?))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    user.require(Resource::Orders, Action::Update)?;
    let order = state.run(move |c| c.confirm_order(order_id)).await?;
    Ok(Json(order))
}

pub async fn execute_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    user.require(Resource::Orders, Action::Update)?;
    let order = state.run(move |c| c.execute_order(order_id)).await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    user.require(Resource::Orders, Action::Cancel)?;
    visible_order(&state, &user, order_id).await?;
    let order = state.run(move |c| c.cancel_order(order_id)).await?;
    Ok(Json(order))
}

pub async fn settle_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
    Json(payload): Json<SettleOrderRequest>,
) -> Result<Json<Order>, AppError> {
    user.require(Resource::Orders, Action::Update)?;
    let request = payload.into_settlement(user.user_id);
    let order = state.run(move |c| c.settle_order(order_id, request)).await?;
    Ok(Json(order))
}

pub async fn release_reservation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ReleaseResponse>, AppError> {
    user.require(Resource::Orders, Action::Update)?;
    let released = state.run(move |c| c.release_reservation(order_id)).await?;
    Ok(Json(ReleaseResponse { released }))
}
