// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    custody::{DepositAddress, VaultAccount, VaultAsset},
    history::TransactionPage,
    market_data::{IdentifierEntry, TokenPlatform},
    state::AppState,
    storage::PartialWithdrawalRecord,
    withdrawal::{FeeComponent, FeeQuote, TransferType, WithdrawalRequest},
};

pub mod explorer;
pub mod health;
pub mod reconciliation;
pub mod tokens;
pub mod transactions;
pub mod vaults;
pub mod withdrawals;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/tokens/search", get(tokens::search_tokens))
        .route("/tokens/prices", get(tokens::token_prices))
        .route("/tokens/{address}/info", get(tokens::token_info))
        .route(
            "/vaults/{vault_id}/withdrawals/fee",
            post(withdrawals::quote_fee),
        )
        .route(
            "/vaults/{vault_id}/withdrawals",
            post(withdrawals::submit_withdrawal),
        )
        .route("/vaults/{vault_id}/payments", post(withdrawals::submit_payment))
        .route(
            "/vaults/{vault_id}/transactions",
            get(transactions::list_transactions),
        )
        .route("/vaults/{vault_id}/balances", get(vaults::get_balances))
        .route(
            "/vaults/{vault_id}/deposit-addresses",
            get(vaults::get_deposit_addresses),
        )
        .route(
            "/explorer/{chain_id}/tx/{tx_hash}",
            get(explorer::transaction_link),
        )
        .route(
            "/reconciliation/partial-withdrawals",
            get(reconciliation::list_partial_withdrawals),
        )
        .route(
            "/reconciliation/partial-withdrawals/{record_id}/resolve",
            post(reconciliation::resolve_partial_withdrawal),
        );

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        tokens::search_tokens,
        tokens::token_prices,
        tokens::token_info,
        withdrawals::quote_fee,
        withdrawals::submit_withdrawal,
        withdrawals::submit_payment,
        transactions::list_transactions,
        vaults::get_balances,
        vaults::get_deposit_addresses,
        explorer::transaction_link,
        reconciliation::list_partial_withdrawals,
        reconciliation::resolve_partial_withdrawal
    ),
    components(
        schemas(
            health::HealthResponse,
            health::HealthChecks,
            IdentifierEntry,
            TokenPlatform,
            WithdrawalRequest,
            TransferType,
            FeeQuote,
            FeeComponent,
            TransactionPage,
            VaultAccount,
            VaultAsset,
            DepositAddress,
            explorer::ExplorerLink,
            PartialWithdrawalRecord
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Tokens", description = "Token search and market prices"),
        (name = "Withdrawals", description = "Fee quotes, withdrawals and payments"),
        (name = "Transactions", description = "Vault transaction history"),
        (name = "Vaults", description = "Vault balances and deposit addresses"),
        (name = "Reconciliation", description = "Partially executed withdrawals")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::{
        assets::{AssetCatalog, SUPPORTED_ASSETS_TESTNET},
        clock::SystemClock,
        custody::{FireblocksClient, RequestSigner},
        market_data::{CmcClient, KeyPool, QuoteGateway},
        storage::ReconciliationStore,
    };

    const TEST_PRIVATE_KEY: &str = include_str!("../custody/testdata/signer_key.pem");

    // Nothing listens on the discard port, so unexpected upstream calls fail fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    struct TestApp {
        router: Router,
        store: Arc<ReconciliationStore>,
        _dir: tempfile::TempDir,
    }

    fn test_app(custody_url: &str) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReconciliationStore::open(&dir.path().join("r.redb")).unwrap());

        let pool = Arc::new(KeyPool::new(["test-key"]));
        let cmc = CmcClient::new(UNREACHABLE, pool).unwrap();
        let quotes = Arc::new(QuoteGateway::new(cmc, Arc::new(SystemClock)));

        let signer = RequestSigner::from_pem("test-api-key", TEST_PRIVATE_KEY).unwrap();
        let custody = Arc::new(FireblocksClient::new(custody_url, signer.clone(), signer).unwrap());

        let state = AppState::new(
            quotes,
            custody,
            store.clone(),
            AssetCatalog::new(SUPPORTED_ASSETS_TESTNET),
            "fee-vault",
        );
        TestApp {
            router: router(state),
            store,
            _dir: dir,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_store_status() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(&app.router, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["unresolved_partial_withdrawals"], 0);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = test_app(UNREACHABLE);
        let response = app
            .router
            .clone()
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(&app.router, get_request("/api-doc/openapi.json")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/v1/vaults/{vault_id}/withdrawals"].is_object());
    }

    #[tokio::test]
    async fn unsupported_asset_is_unprocessable() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(
            &app.router,
            post_json(
                "/v1/vaults/7/withdrawals",
                json!({
                    "type": "external",
                    "assetId": "DOGE",
                    "withdrawalAddress": "D9",
                    "amount": 1
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_code"], "unsupported_asset");
    }

    #[tokio::test]
    async fn missing_withdrawal_address_is_bad_request() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(
            &app.router,
            post_json(
                "/v1/vaults/7/withdrawals/fee",
                json!({ "type": "external", "assetId": "ETH_TEST5", "amount": "0.5" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_request");
    }

    #[tokio::test]
    async fn transactions_are_merged_from_custody() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "tx-1", "createdAt": 2000, "status": "COMPLETED" }
            ])))
            .expect(2)
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        let (status, body) =
            send(&app.router, get_request("/v1/vaults/7/transactions?limit=5")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["nextBeforeTimestamp"], 2000);
        assert_eq!(body["nextAfterTimestamp"], 2000);
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped_to_max_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transactions"))
            .and(query_param("limit", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let app = test_app(&server.uri());
        let (status, body) =
            send(&app.router, get_request("/v1/vaults/7/transactions?limit=900")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"], json!([]));
    }

    #[tokio::test]
    async fn custody_outage_is_service_unavailable() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(&app.router, get_request("/v1/vaults/7/balances")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_code"], "upstream_unavailable");
    }

    #[tokio::test]
    async fn explorer_link_is_built_for_known_chains() {
        let app = test_app(UNREACHABLE);
        let (status, body) = send(&app.router, get_request("/v1/explorer/137/tx/0xabc")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["explorerUrl"], "https://polygonscan.com/tx/0xabc");
        assert_eq!(body["chainId"], 137);

        let (status, body) = send(&app.router, get_request("/v1/explorer/10/tx/0xabc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "invalid_request");
    }

    #[tokio::test]
    async fn reconciliation_records_can_be_listed_and_resolved() {
        let app = test_app(UNREACHABLE);
        let record = PartialWithdrawalRecord::new("7", "ETH_TEST5", 1.0, "fee-tx")
            .with_reason("principal rejected");
        app.store.record(&record).unwrap();

        let list = || get_request("/v1/reconciliation/partial-withdrawals");
        let (status, body) = send(&app.router, list()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["feeTransferId"], "fee-tx");

        let uri = format!(
            "/v1/reconciliation/partial-withdrawals/{}/resolve",
            record.record_id
        );
        let (status, body) = send(&app.router, post_json(&uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["resolvedAt"].is_string());

        let (_, body) = send(&app.router, list()).await;
        assert_eq!(body, json!([]));

        let (status, _) = send(
            &app.router,
            post_json("/v1/reconciliation/partial-withdrawals/unknown/resolve", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
