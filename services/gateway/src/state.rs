use crate::auth;
use crate::error::AppError;
use jsonwebtoken::DecodingKey;
use persistence::LedgerDb;
use settlement::SettlementCoordinator;
use std::sync::Arc;
use types::errors::LedgerError;

pub type Coordinator = SettlementCoordinator<LedgerDb>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub decoding_key: DecodingKey,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, jwt_secret: &str) -> Self {
        Self {
            coordinator,
            decoding_key: auth::decoding_key(jwt_secret),
        }
    }

    /// Run a ledger operation on the blocking pool.
    pub async fn run<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&Coordinator) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        let outcome = tokio::task::spawn_blocking(move || work(&coordinator))
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("ledger worker failed: {}", e)))?;
        Ok(outcome?)
    }
}
