// [apps/orchestrator/src/handlers/scan_details.rs]
/*!
 * =================================================================
 * APARATO: SCAN DETAIL PERIMETER HANDLERS (V4.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONSULTA Y CURADO DEL DETALLE DERIVADO
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct ScanDetailListParams {
    pub scan_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanDetailPatchBody {
    pub open_ports: Option<Value>,
    pub os_guess: Option<Value>,
}

pub async fn list_scan_details(
    State(application_state): State<AppState>,
    Query(detail_params): Query<ScanDetailListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let details = application_state
        .scan_detail_repository
        .list(detail_params.scan_id.as_deref())
        .await?;
    Ok(Json(details))
}

pub async fn retrieve_scan_detail(
    State(application_state): State<AppState>,
    Path(detail_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.scan_detail_repository.fetch(&detail_identifier).await?))
}

pub async fn patch_scan_detail(
    State(application_state): State<AppState>,
    Path(detail_identifier): Path<String>,
    Json(patch_body): Json<ScanDetailPatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = application_state.scan_detail_repository.fetch(&detail_identifier).await?;

    let open_ports_artifact = patch_body
        .open_ports
        .or(detail.open_ports.clone())
        .unwrap_or(Value::Null);
    let os_guess_artifact = patch_body.os_guess.or(detail.os_guess.clone());

    application_state
        .scan_detail_repository
        .set_derived_artifacts(&detail.scan_id, &open_ports_artifact, os_guess_artifact.as_ref())
        .await?;

    Ok(Json(application_state.scan_detail_repository.fetch(&detail_identifier).await?))
}

pub async fn destroy_scan_detail(
    State(application_state): State<AppState>,
    Path(detail_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.scan_detail_repository.delete_by_id(&detail_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}
