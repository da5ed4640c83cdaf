use crate::auth::{Action, AuthenticatedUser, Resource};
use crate::error::AppError;
use crate::models::{CashMovementRequest, OpenAccountRequest, PostingResponse};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use types::account::Account;
use types::holding::Holding;
use types::ids::{AccountId, AssetId};
use types::order::Order;
use types::transaction::LedgerEntry;

pub async fn open_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    user.require(Resource::Accounts, Action::Create)?;
    let account = state
        .run(move |c| c.open_customer_account(&payload.currency))
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, AppError> {
    user.require(Resource::Accounts, Action::Read)?;
    user.require_account(account_id)?;
    let account = state.run(move |c| c.get_account(account_id)).await?;
    Ok(Json(account))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<Order>>, AppError> {
    user.require(Resource::Orders, Action::Read)?;
    user.require_account(account_id)?;
    let orders = state.run(move |c| c.orders_for_account(account_id)).await?;
    Ok(Json(orders))
}

pub async fn list_entries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    user.require(Resource::Accounts, Action::Read)?;
    user.require_account(account_id)?;
    let entries = state.run(move |c| c.account_entries(account_id)).await?;
    Ok(Json(entries))
}

pub async fn get_holding(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((account_id, asset_id)): Path<(AccountId, AssetId)>,
) -> Result<Json<Holding>, AppError> {
    user.require(Resource::Accounts, Action::Read)?;
    user.require_account(account_id)?;
    let holding = state.run(move |c| c.get_holding(account_id, asset_id)).await?;
    Ok(Json(holding))
}

pub async fn deposit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
    Json(payload): Json<CashMovementRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    user.require(Resource::Accounts, Action::Update)?;
    let by = user.user_id;
    let order_number = state
        .run(move |c| c.deposit(account_id, payload.amount, Some(by), payload.comment))
        .await?;
    Ok((StatusCode::CREATED, Json(PostingResponse { order_number })))
}

pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(account_id): Path<AccountId>,
    Json(payload): Json<CashMovementRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    user.require(Resource::Accounts, Action::Update)?;
    let by = user.user_id;
    let order_number = state
        .run(move |c| c.withdraw(account_id, payload.amount, Some(by), payload.comment))
        .await?;
    Ok((StatusCode::CREATED, Json(PostingResponse { order_number })))
}
