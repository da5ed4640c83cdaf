use crate::auth::{Action, AuthenticatedUser, Resource};
use crate::error::AppError;
use crate::models::{RegisterAssetRequest, SeedInventoryRequest};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use types::asset::Asset;
use types::holding::Holding;
use types::ids::AssetId;

pub async fn register_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<RegisterAssetRequest>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    user.require(Resource::Assets, Action::Create)?;
    let asset = state
        .run(move |c| c.register_asset(&payload.symbol, payload.asset_type, &payload.currency))
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_asset(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(asset_id): Path<AssetId>,
) -> Result<Json<Asset>, AppError> {
    user.require(Resource::Assets, Action::Read)?;
    let asset = state.run(move |c| c.get_asset(asset_id)).await?;
    Ok(Json(asset))
}

/// Add units to the house inventory that customer purchases draw from.
pub async fn seed_inventory(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(asset_id): Path<AssetId>,
    Json(payload): Json<SeedInventoryRequest>,
) -> Result<Json<Holding>, AppError> {
    user.require(Resource::Assets, Action::Update)?;
    let holding = state
        .run(move |c| c.seed_house_inventory(asset_id, payload.quantity))
        .await?;
    Ok(Json(holding))
}
