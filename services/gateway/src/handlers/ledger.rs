use crate::auth::{Action, AuthenticatedUser, Resource};
use crate::error::AppError;
use crate::models::{PostingResponse, ReverseRequest};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use types::ids::OrderNumber;
use types::transaction::LedgerEntry;

fn parse_order_number(raw: &str) -> Result<OrderNumber, AppError> {
    OrderNumber::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Malformed order number: {}", raw)))
}

pub async fn get_entries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    user.require(Resource::Ledger, Action::Read)?;
    let order_number = parse_order_number(&order_number)?;
    let entries = state.run(move |c| c.ledger_entries(&order_number)).await?;
    Ok(Json(entries))
}

pub async fn reverse(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_number): Path<String>,
    Json(payload): Json<ReverseRequest>,
) -> Result<(StatusCode, Json<PostingResponse>), AppError> {
    user.require(Resource::Ledger, Action::Update)?;
    let order_number = parse_order_number(&order_number)?;
    let by = user.user_id;
    let reversal = state
        .run(move |c| c.reverse(&order_number, Some(by), payload.comment))
        .await?;
    Ok((StatusCode::CREATED, Json(PostingResponse { order_number: reversal })))
}
