// [apps/orchestrator/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER REGISTRY & PERIMETER FAULTS (V4.2)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE HANDLERS, FALLOS HTTP Y PAGINACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FAULT MAPPING: Validación -> 400, ausencia -> 404, conflicto -> 409,
 *    averías de infraestructura -> 502/503. Cuerpo uniforme
 *    {"error": "<mensaje>"}.
 * 2. LIST ENVELOPE: Todo listado responde
 *    {count, page, page_size, results}.
 * =================================================================
 */

pub mod customers;
pub mod fingerprint_details;
pub mod port_lists;
pub mod scan_details;
pub mod scan_types;
pub mod scans;
pub mod targets;
pub mod vuln_engine_results;

use crate::services::OrchestrationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use vapter_infra_db::repositories::{ListQuery, Paged};
use vapter_infra_db::DbError;

/// Fallo perimetral del centro de mando.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status_code, Json(json!({ "error": error_message }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(ledger_fault: DbError) -> Self {
        match ledger_fault {
            DbError::NotFound(identifier) => ApiError::NotFound(format!("Resource '{}' not found", identifier)),
            DbError::DuplicateTarget => {
                ApiError::Conflict("A live target with this address already exists for the customer".into())
            }
            DbError::ActiveScanConflict => {
                ApiError::Conflict("A non-terminal scan already exists for this target".into())
            }
            DbError::DuplicateName(name) => ApiError::Conflict(format!("Name '{}' is already taken", name)),
            DbError::StaleTransition => {
                ApiError::Conflict("Scan is not in a valid state for this operation".into())
            }
            DbError::MappingError(message) => ApiError::Validation(message),
            DbError::ConnectionError(message) | DbError::ConfigurationError(message) => {
                ApiError::Unavailable(message)
            }
            other_fault => ApiError::Internal(other_fault.to_string()),
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(orchestration_fault: OrchestrationError) -> Self {
        match orchestration_fault {
            OrchestrationError::Ledger(ledger_fault) => ledger_fault.into(),
            OrchestrationError::Broker(broker_fault) => ApiError::BadGateway(broker_fault.to_string()),
            OrchestrationError::Artifact(message) => ApiError::Validation(message),
        }
    }
}

/// Parámetros comunes de listado del perímetro.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn to_query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            page_size: self.page_size,
            ordering: self.ordering.clone(),
            search: self.search.clone(),
        }
    }
}

/// Sobre uniforme de listado paginado.
pub fn paged_envelope<T: serde::Serialize>(paged_result: Paged<T>) -> Json<serde_json::Value> {
    Json(json!({
        "count": paged_result.total,
        "page": paged_result.page,
        "page_size": paged_result.page_size,
        "results": paged_result.items,
    }))
}
