// [apps/orchestrator/src/handlers/vuln_engine_results.rs]
/*!
 * =================================================================
 * APARATO: VULN ENGINE RESULT HANDLERS (V4.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONSULTA DE RESULTADOS DEL MOTOR EXTERNO
 * =================================================================
 */

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct VulnEngineListParams {
    pub scan_id: Option<String>,
}

pub async fn list_vuln_engine_results(
    State(application_state): State<AppState>,
    Query(list_params): Query<VulnEngineListParams>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(scan_identifier) = list_params.scan_id {
        let scoped_result = application_state
            .vuln_engine_repository
            .fetch_by_scan(&scan_identifier)
            .await?;
        return Ok(Json(scoped_result.into_iter().collect::<Vec<_>>()));
    }

    Ok(Json(application_state.vuln_engine_repository.list().await?))
}

pub async fn retrieve_vuln_engine_result(
    State(application_state): State<AppState>,
    Path(result_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.vuln_engine_repository.fetch(&result_identifier).await?))
}
