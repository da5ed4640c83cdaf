use crate::handlers::{account, asset, ledger, order};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/orders/buy", post(order::create_buy_order))
        .route("/orders/sell", post(order::create_sell_order))
        .route("/orders/{id}", get(order::get_order))
        .route("/orders/{id}/confirm", post(order::confirm_order))
        .route("/orders/{id}/execute", post(order::execute_order))
        .route("/orders/{id}/cancel", post(order::cancel_order))
        .route("/orders/{id}/settle", post(order::settle_order))
        .route("/orders/{id}/release", post(order::release_reservation))
        .route("/accounts", post(account::open_account))
        .route("/accounts/{id}", get(account::get_account))
        .route("/accounts/{id}/orders", get(account::list_orders))
        .route("/accounts/{id}/entries", get(account::list_entries))
        .route("/accounts/{id}/holdings/{asset_id}", get(account::get_holding))
        .route("/accounts/{id}/deposit", post(account::deposit))
        .route("/accounts/{id}/withdraw", post(account::withdraw))
        .route("/assets", post(asset::register_asset))
        .route("/assets/{id}", get(asset::get_asset))
        .route("/assets/{id}/inventory", post(asset::seed_inventory))
        .route("/ledger/{order_number}", get(ledger::get_entries))
        .route("/ledger/{order_number}/reverse", post(ledger::reverse));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, Role};
    use crate::state::Coordinator;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use jsonwebtoken::{EncodingKey, Header, encode};
    use persistence::LedgerDb;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use std::str::FromStr;
    use std::sync::Arc;
    use tower::ServiceExt;
    use types::ids::{AccountId, UserId};

    const SECRET: &str = "test-secret";

    fn make_app() -> Router {
        let coordinator = Coordinator::new(LedgerDb::in_memory());
        coordinator.open_house_account("USD", dec!(1000000.00)).unwrap();
        create_router(AppState::new(Arc::new(coordinator), SECRET))
    }

    fn token(role: Role, account_id: Option<AccountId>) -> String {
        let claims = Claims {
            sub: UserId::new().to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            role,
            account_id,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn decimal(value: &Value) -> Decimal {
        Decimal::from_str(value.as_str().unwrap()).unwrap()
    }

    /// Opens a funded customer and a registered asset with house inventory.
    async fn bootstrap(app: &Router, admin: &str) -> (String, String) {
        let (status, account) = send(app, Method::POST, "/v1/accounts", Some(admin), Some(json!({"currency": "USD"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let account_id = account["account_id"].as_str().unwrap().to_string();

        let (status, asset) = send(
            app,
            Method::POST,
            "/v1/assets",
            Some(admin),
            Some(json!({"symbol": "ACME", "asset_type": "equity", "currency": "USD"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let asset_id = asset["asset_id"].as_str().unwrap().to_string();

        let (status, _) = send(
            app,
            Method::POST,
            &format!("/v1/assets/{}/inventory", asset_id),
            Some(admin),
            Some(json!({"quantity": "500"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, posting) = send(
            app,
            Method::POST,
            &format!("/v1/accounts/{}/deposit", account_id),
            Some(admin),
            Some(json!({"amount": "1000.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(posting["order_number"].as_str().unwrap().starts_with('4'));

        (account_id, asset_id)
    }

    fn buy_body(account_id: &str, asset_id: &str, quantity: &str) -> Value {
        json!({
            "account_id": account_id,
            "asset_id": asset_id,
            "quantity": quantity,
            "price_per_unit": "20.00",
            "currency": "USD"
        })
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = make_app();
        let (status, body) = send(&app, Method::POST, "/v1/accounts", None, Some(json!({"currency": "USD"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let app = make_app();
        let claims = Claims {
            sub: UserId::new().to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            role: Role::Admin,
            account_id: None,
        };
        let forged = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"other")).unwrap();
        let (status, _) = send(&app, Method::POST, "/v1/accounts", Some(&forged), Some(json!({"currency": "USD"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_buy_lifecycle_over_http() {
        let app = make_app();
        let admin = token(Role::Admin, None);
        let (account_id, asset_id) = bootstrap(&app, &admin).await;

        let customer = token(Role::Customer, AccountId::from_str(&account_id).ok());
        let (status, order) = send(
            &app,
            Method::POST,
            "/v1/orders/buy",
            Some(&customer),
            Some(buy_body(&account_id, &asset_id, "10")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "created");
        assert_eq!(decimal(&order["total_amount"]), dec!(200.00));
        let order_id = order["order_id"].as_str().unwrap().to_string();

        let (_, account) = send(&app, Method::GET, &format!("/v1/accounts/{}", account_id), Some(&customer), None).await;
        assert_eq!(decimal(&account["available_cash"]), dec!(800.00));

        let manager = token(Role::OrderManager, None);
        for step in ["confirm", "execute"] {
            let (status, _) = send(&app, Method::POST, &format!("/v1/orders/{}/{}", order_id, step), Some(&manager), None).await;
            assert_eq!(status, StatusCode::OK, "{} failed", step);
        }
        let (status, settled) = send(
            &app,
            Method::POST,
            &format!("/v1/orders/{}/settle", order_id),
            Some(&manager),
            Some(json!({"settled_quantity": "10", "settled_amount": "200.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settled["status"], "settled");

        let (status, holding) = send(
            &app,
            Method::GET,
            &format!("/v1/accounts/{}/holdings/{}", account_id, asset_id),
            Some(&customer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&holding["quantity"]), dec!(10));

        let number = settled["settlement_order_number"].as_str().unwrap();
        let (status, entries) = send(&app, Method::GET, &format!("/v1/ledger/{}", number), Some(&manager), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_customer_cannot_confirm_or_touch_other_accounts() {
        let app = make_app();
        let admin = token(Role::Admin, None);
        let (account_id, asset_id) = bootstrap(&app, &admin).await;

        let stranger = token(Role::Customer, Some(AccountId::new()));
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/orders/buy",
            Some(&stranger),
            Some(buy_body(&account_id, &asset_id, "1")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");

        let owner = token(Role::Customer, AccountId::from_str(&account_id).ok());
        let (_, order) = send(&app, Method::POST, "/v1/orders/buy", Some(&owner), Some(buy_body(&account_id, &asset_id, "1"))).await;
        let order_id = order["order_id"].as_str().unwrap();
        let (status, _) = send(&app, Method::POST, &format!("/v1/orders/{}/confirm", order_id), Some(&owner), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, canceled) = send(&app, Method::POST, &format!("/v1/orders/{}/cancel", order_id), Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(canceled["status"], "canceled");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let app = make_app();
        let admin = token(Role::Admin, None);
        let (account_id, asset_id) = bootstrap(&app, &admin).await;

        let (_, order) = send(&app, Method::POST, "/v1/orders/buy", Some(&admin), Some(buy_body(&account_id, &asset_id, "10"))).await;
        let order_id = order["order_id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/v1/orders/{}/settle", order_id),
            Some(&admin),
            Some(json!({"settled_quantity": "10", "settled_amount": "200.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "INVALID_STATE_TRANSITION");

        let (status, body) = send(&app, Method::POST, "/v1/orders/buy", Some(&admin), Some(buy_body(&account_id, &asset_id, "100"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "INSUFFICIENT_FUNDS");

        let (status, body) = send(&app, Method::POST, "/v1/orders/sell", Some(&admin), Some(buy_body(&account_id, &asset_id, "1"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "INSUFFICIENT_HOLDINGS");

        let (status, body) = send(&app, Method::GET, &format!("/v1/orders/{}", AccountId::new()), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ORDER_NOT_FOUND");

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/v1/accounts/{}/withdraw", account_id),
            Some(&admin),
            Some(json!({"amount": "-5.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_INPUT");

        let (status, _) = send(&app, Method::GET, "/v1/ledger/12345", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reverse_deposit_over_http() {
        let app = make_app();
        let admin = token(Role::Admin, None);
        let (account_id, _) = bootstrap(&app, &admin).await;

        let (_, entries) = send(&app, Method::GET, &format!("/v1/accounts/{}/entries", account_id), Some(&admin), None).await;
        let number = entries[0]["order_number"].as_str().unwrap().to_string();

        let (status, reversal) = send(&app, Method::POST, &format!("/v1/ledger/{}/reverse", number), Some(&admin), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_ne!(reversal["order_number"].as_str().unwrap(), number);

        let (_, account) = send(&app, Method::GET, &format!("/v1/accounts/{}", account_id), Some(&admin), None).await;
        assert_eq!(decimal(&account["balance"]), Decimal::ZERO);

        let (status, body) = send(&app, Method::POST, &format!("/v1/ledger/{}/reverse", number), Some(&admin), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "INVALID_STATE_TRANSITION");
    }
}
