// [apps/orchestrator/src/handlers/fingerprint_details.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT PERIMETER HANDLERS (V4.1 - BULK GATE)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA MASIVA Y CONSULTAS DE HUELLAS
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use vapter_domain_models::Protocol;
use vapter_infra_db::repositories::fingerprint::NewFingerprintDetail;

#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintRowBody {
    pub scan_id: String,
    pub target_id: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_product: Option<String>,
    #[serde(default)]
    pub service_version: Option<String>,
    #[serde(default)]
    pub service_info: Option<String>,
    pub fingerprint_method: String,
    pub confidence_score: u8,
    #[serde(default)]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub additional_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateBody {
    pub fingerprint_details: Vec<FingerprintRowBody>,
}

#[derive(Debug, Deserialize)]
pub struct ByScanParams {
    pub scan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ByTargetParams {
    pub target_id: String,
    #[serde(default)]
    pub latest_only: bool,
}

fn to_repository_row(row_body: FingerprintRowBody) -> NewFingerprintDetail {
    NewFingerprintDetail {
        scan_id: row_body.scan_id,
        target_id: row_body.target_id,
        port: row_body.port,
        protocol: row_body.protocol,
        service_name: row_body.service_name,
        service_product: row_body.service_product,
        service_version: row_body.service_version,
        service_info: row_body.service_info,
        fingerprint_method: row_body.fingerprint_method,
        confidence_score: row_body.confidence_score,
        raw_response: row_body.raw_response,
        additional_info: row_body.additional_info,
    }
}

pub async fn list_fingerprint_details(
    State(application_state): State<AppState>,
    Query(list_params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paged_fingerprints = application_state
        .fingerprint_repository
        .list(&list_params.to_query())
        .await?;
    Ok(paged_envelope(paged_fingerprints))
}

/// POST /fingerprint-details — alta individual (lote de uno).
pub async fn create_fingerprint_detail(
    State(application_state): State<AppState>,
    Json(row_body): Json<FingerprintRowBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut sealed_rows = application_state
        .fingerprint_repository
        .bulk_create(vec![to_repository_row(row_body)])
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_rows.remove(0))))
}

/// POST /fingerprint-details/bulk_create — ingesta masiva del worker.
pub async fn bulk_create_fingerprint_details(
    State(application_state): State<AppState>,
    Json(bulk_body): Json<BulkCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    if bulk_body.fingerprint_details.is_empty() {
        return Err(ApiError::Validation("'fingerprint_details' must not be empty".into()));
    }

    let repository_rows = bulk_body
        .fingerprint_details
        .into_iter()
        .map(to_repository_row)
        .collect();

    let sealed_rows = application_state
        .fingerprint_repository
        .bulk_create(repository_rows)
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_rows)))
}

/// GET /fingerprint-details/by_scan?scan_id=...
pub async fn fingerprints_by_scan(
    State(application_state): State<AppState>,
    Query(by_scan_params): Query<ByScanParams>,
) -> Result<impl IntoResponse, ApiError> {
    let fingerprints = application_state
        .fingerprint_repository
        .list_by_scan(&by_scan_params.scan_id)
        .await?;
    Ok(Json(fingerprints))
}

/// GET /fingerprint-details/by_target?target_id=...&latest_only=true
pub async fn fingerprints_by_target(
    State(application_state): State<AppState>,
    Query(by_target_params): Query<ByTargetParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut fingerprints = application_state
        .fingerprint_repository
        .list_by_target(&by_target_params.target_id)
        .await?;

    if by_target_params.latest_only {
        // Última corrida con huellas selladas para el objetivo.
        let latest_scan_identifier = fingerprints
            .iter()
            .max_by(|left, right| left.created_at.cmp(&right.created_at))
            .map(|latest_row| latest_row.scan_id.clone());

        if let Some(scan_identifier) = latest_scan_identifier {
            fingerprints.retain(|row| row.scan_id == scan_identifier);
        }
    }

    Ok(Json(fingerprints))
}

/// GET /fingerprint-details/service_summary
pub async fn fingerprint_service_summary(
    State(application_state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let (total_fingerprints, summary_rows) =
        application_state.fingerprint_repository.service_summary().await?;

    let services: Vec<Value> = summary_rows
        .iter()
        .map(|summary_row| {
            json!({
                "service_name": summary_row.service_name,
                "service_version": summary_row.service_version,
                "count": summary_row.count,
            })
        })
        .collect();

    Ok(Json(json!({
        "total_fingerprints": total_fingerprints,
        "unique_services": services.len(),
        "services": services,
    })))
}

pub async fn retrieve_fingerprint_detail(
    State(application_state): State<AppState>,
    Path(fingerprint_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.fingerprint_repository.fetch(&fingerprint_identifier).await?))
}

pub async fn destroy_fingerprint_detail(
    State(application_state): State<AppState>,
    Path(fingerprint_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.fingerprint_repository.soft_delete(&fingerprint_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}
