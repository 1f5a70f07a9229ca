// src/services/api_server.rs
//! REST API for the certificate engine.
//!
//! Built with Axum. Handlers validate and parse raw input (addresses,
//! decimal token IDs) and hand typed arguments to the engine, batch
//! coordinator and query surface; the error taxonomy's HTTP mapping turns
//! domain failures into status codes. Endpoints:
//! - POST /mint, POST /batch-mint - issuance
//! - GET  /certificate/:token_id - record fetch
//! - POST /verify/:token_id, POST /batch-verify - authenticity checks
//! - POST /revoke/:token_id - one-way revocation
//! - GET  /issuer/:address, GET /recipient/:address - listings
//! - GET  /health - liveness and deployment mode

use crate::blockchain::chain_client::ChainClient;
use crate::error::EngineError;
use crate::models::certificate::{MintRequest, VerificationResult};
use crate::services::batch::BatchCoordinator;
use crate::services::certificate_engine::CertificateEngine;
use crate::services::query::VerificationQuery;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Error body returned for every failed request.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// Response for a single successful mint.
#[derive(Serialize)]
struct MintResponse {
    token_id: String,
    transaction_hash: String,
    block_number: u64,
    gas_used: String,
}

/// Request payload for batch issuance.
#[derive(Deserialize)]
struct BatchMintRequest {
    certificates: Vec<MintRequest>,
}

/// Request payload for batch verification.
#[derive(Deserialize)]
struct BatchVerifyRequest {
    token_ids: Vec<String>,
}

/// Query parameters for the issuer listing.
#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// API server state holding all service dependencies.
#[derive(Clone)]
pub struct ApiServer {
    engine: Arc<CertificateEngine>,
    batch: Arc<BatchCoordinator>,
    query: Arc<VerificationQuery>,
    read_only: bool,
}

impl ApiServer {
    pub fn new(
        engine: Arc<CertificateEngine>,
        batch: Arc<BatchCoordinator>,
        query: Arc<VerificationQuery>,
        read_only: bool,
    ) -> Self {
        ApiServer {
            engine,
            batch,
            query,
            read_only,
        }
    }

    /// Starts the API server and begins listening for requests.
    pub async fn run(self, addr: SocketAddr) {
        let app = Router::new()
            .route("/mint", post(Self::mint_handler))
            .route("/batch-mint", post(Self::batch_mint_handler))
            .route("/certificate/:token_id", get(Self::get_certificate_handler))
            .route("/verify/:token_id", post(Self::verify_handler))
            .route("/batch-verify", post(Self::batch_verify_handler))
            .route("/revoke/:token_id", post(Self::revoke_handler))
            .route("/issuer/:address", get(Self::issuer_handler))
            .route("/recipient/:address", get(Self::recipient_handler))
            .route("/health", get(Self::health_handler))
            .with_state(Arc::new(self));

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    }

    fn error_response(e: &EngineError) -> Response {
        (
            e.status_code(),
            Json(ErrorBody {
                error: e.to_string(),
                kind: e.kind(),
            }),
        )
            .into_response()
    }

    fn invalid_token_id(raw: &str) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("invalid token id: {:?}", raw),
                kind: "invalid_token_id",
            }),
        )
            .into_response()
    }

    /// Issues one certificate.
    ///
    /// # Endpoint
    /// POST /mint
    ///
    /// # Responses
    /// - 200 OK: token ID and receipt metadata
    /// - 400/403/503: per the error taxonomy
    async fn mint_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<MintRequest>,
    ) -> Response {
        match state.engine.mint(&payload).await {
            Ok(outcome) => match outcome.token_id() {
                Some(token_id) => (
                    StatusCode::OK,
                    Json(MintResponse {
                        token_id: token_id.to_string(),
                        transaction_hash: format!("{:?}", outcome.transaction_hash),
                        block_number: outcome.block_number,
                        gas_used: outcome.gas_used.to_string(),
                    }),
                )
                    .into_response(),
                None => Self::error_response(&EngineError::MintEventNotFound(format!(
                    "{:?}",
                    outcome.transaction_hash
                ))),
            },
            Err(e) => Self::error_response(&e),
        }
    }

    /// Issues a list of certificates, reporting per-item outcomes.
    ///
    /// # Endpoint
    /// POST /batch-mint
    async fn batch_mint_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<BatchMintRequest>,
    ) -> Response {
        match state.batch.mint_many(&payload.certificates).await {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Fetches the full on-chain record for one certificate.
    ///
    /// # Endpoint
    /// GET /certificate/:token_id
    async fn get_certificate_handler(
        State(state): State<Arc<ApiServer>>,
        Path(token_id): Path<String>,
    ) -> Response {
        let token_id = match U256::from_dec_str(&token_id) {
            Ok(id) => id,
            Err(_) => return Self::invalid_token_id(&token_id),
        };
        match state.engine.get(token_id).await {
            Ok(record) => (StatusCode::OK, Json(record)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Public authenticity check. Always 200: any failure, including a
    /// malformed or unknown token ID, reports as not found rather than
    /// leaking internal detail.
    ///
    /// # Endpoint
    /// POST /verify/:token_id
    async fn verify_handler(
        State(state): State<Arc<ApiServer>>,
        Path(token_id): Path<String>,
    ) -> Response {
        let result = match U256::from_dec_str(&token_id) {
            Ok(id) => state.query.verify_token(id).await,
            Err(_) => VerificationResult::not_found(),
        };
        (StatusCode::OK, Json(result)).into_response()
    }

    /// Verifies a list of token IDs with index-aligned results.
    ///
    /// # Endpoint
    /// POST /batch-verify
    async fn batch_verify_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<BatchVerifyRequest>,
    ) -> Response {
        let mut token_ids = Vec::with_capacity(payload.token_ids.len());
        for raw in &payload.token_ids {
            match U256::from_dec_str(raw) {
                Ok(id) => token_ids.push(id),
                Err(_) => return Self::invalid_token_id(raw),
            }
        }
        match state.batch.verify_many(&token_ids).await {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Revokes one certificate. Terminal: a revoked certificate never
    /// becomes valid again.
    ///
    /// # Endpoint
    /// POST /revoke/:token_id
    async fn revoke_handler(
        State(state): State<Arc<ApiServer>>,
        Path(token_id): Path<String>,
    ) -> Response {
        let token_id = match U256::from_dec_str(&token_id) {
            Ok(id) => id,
            Err(_) => return Self::invalid_token_id(&token_id),
        };
        match state.engine.revoke(token_id).await {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Lists recent certificates minted by an issuer.
    ///
    /// # Endpoint
    /// GET /issuer/:address?limit=N
    async fn issuer_handler(
        State(state): State<Arc<ApiServer>>,
        Path(address): Path<String>,
        Query(params): Query<ListParams>,
    ) -> Response {
        let issuer = match ChainClient::parse_address(&address) {
            Ok(addr) => addr,
            Err(e) => return Self::error_response(&e),
        };
        let limit = params.limit.unwrap_or(100);
        match state.engine.list_by_issuer(issuer, limit).await {
            Ok(records) => (StatusCode::OK, Json(records)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Lists certificates held by a recipient, via full supply scan.
    ///
    /// # Endpoint
    /// GET /recipient/:address
    async fn recipient_handler(
        State(state): State<Arc<ApiServer>>,
        Path(address): Path<String>,
    ) -> Response {
        let recipient = match ChainClient::parse_address(&address) {
            Ok(addr) => addr,
            Err(e) => return Self::error_response(&e),
        };
        match state.query.held_by(recipient).await {
            Ok(records) => (StatusCode::OK, Json(records)).into_response(),
            Err(e) => Self::error_response(&e),
        }
    }

    /// Liveness check, reporting whether the deployment can sign writes.
    ///
    /// # Endpoint
    /// GET /health
    async fn health_handler(State(state): State<Arc<ApiServer>>) -> Response {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "read_only": state.read_only,
            })),
        )
            .into_response()
    }
}
