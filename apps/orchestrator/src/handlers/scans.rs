// [apps/orchestrator/src/handlers/scans.rs]
/*!
 * =================================================================
 * APARATO: SCAN PERIMETER HANDLERS (V4.4 - LIFECYCLE GATE)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE ESCANEOS Y CALLBACKS DE WORKERS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RESULT INGESTION: El PATCH que fija 'parsed_nmap_results' dispara
 *    la derivación de open_ports/os_guess; el POST del motor externo
 *    dispara el conteo de severidades sobre el reporte verbatim.
 * 2. LIFECYCLE GATES: restart exige estado terminal; cancel exige estado
 *    no terminal; ambos conflictos responden 409.
 * 3. NO STATUS BYPASS: El PATCH genérico jamás escribe 'status'; las
 *    transiciones pertenecen a la máquina de estados.
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::services::{dispatcher, nmap_ingestion, vuln_report};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use vapter_domain_models::scan::USER_CANCELLED_MESSAGE;
use vapter_domain_models::{ReportFormat, StageModule, VulnerabilityCount};
use vapter_infra_db::repositories::scan::ScanFilters;
use vapter_infra_db::repositories::vuln_engine::VulnEngineReportUpload;

#[derive(Debug, Deserialize)]
pub struct ScanCreateBody {
    pub target_id: String,
    pub scan_type_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanPatchBody {
    pub parsed_nmap_results: Option<Value>,
    pub parsed_fingerprint_results: Option<Value>,
    pub parsed_vuln_engine_results: Option<Value>,
    pub parsed_web_results: Option<Value>,
    pub parsed_vuln_lookup_results: Option<Value>,
    pub report_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub target_id: Option<String>,
    pub customer_id: Option<String>,
    pub initiated_after: Option<DateTime<Utc>>,
    pub initiated_before: Option<DateTime<Utc>>,
    pub completed_after: Option<DateTime<Utc>>,
    pub completed_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VulnEngineProgressBody {
    #[serde(default)]
    pub external_task_id: Option<String>,
    pub external_status: String,
    pub progress: u8,
}

#[derive(Debug, Deserialize)]
pub struct VulnEngineResultsBody {
    #[serde(default)]
    pub external_task_id: Option<String>,
    #[serde(default)]
    pub external_report_id: Option<String>,
    #[serde(default)]
    pub external_target_id: Option<String>,
    pub report_format: ReportFormat,
    pub full_report: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Conteo pre-derivado opcional; ausente, el núcleo lo extrae del
    /// cuerpo del reporte.
    #[serde(default)]
    pub vulnerability_count: Option<VulnerabilityCount>,
}

pub async fn list_scans(
    State(application_state): State<AppState>,
    Query(scan_params): Query<ScanListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let scan_filters = ScanFilters {
        status: scan_params.status.clone(),
        target_id: scan_params.target_id.clone(),
        customer_id: scan_params.customer_id.clone(),
        initiated_after: scan_params.initiated_after,
        initiated_before: scan_params.initiated_before,
        completed_after: scan_params.completed_after,
        completed_before: scan_params.completed_before,
    };

    let list_query = ListParams {
        page: scan_params.page,
        page_size: scan_params.page_size,
        ordering: scan_params.ordering.clone(),
        search: scan_params.search.clone(),
    }
    .to_query();

    let paged_scans = application_state.scan_repository.list(&list_query, &scan_filters).await?;
    Ok(paged_envelope(paged_scans))
}

/// POST /scans — forja y arranca un escaneo.
pub async fn create_scan(
    State(application_state): State<AppState>,
    Json(create_body): Json<ScanCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let target = application_state.target_repository.fetch(&create_body.target_id).await?;
    let scan_type = application_state.scan_type_repository.fetch(&create_body.scan_type_id).await?;
    scan_type
        .validate()
        .map_err(|validation_fault| ApiError::Validation(validation_fault.to_string()))?;

    let forged_scan = application_state.scan_repository.create(&target.id, &scan_type.id).await?;

    let scan_snapshot = match dispatcher::start_scan(&application_state, &forged_scan).await {
        Ok(started_scan) => started_scan,
        Err(dispatch_fault) => {
            error!("💀 [SCANS]: Scan [{}] ignition collapsed: {}", forged_scan.id, dispatch_fault);
            application_state.scan_repository.fetch(&forged_scan.id).await?
        }
    };

    Ok((StatusCode::CREATED, Json(scan_snapshot)))
}

pub async fn retrieve_scan(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.scan_repository.fetch(&scan_identifier).await?))
}

/**
 * PATCH /scans/{id} — carga de artefactos de etapa por los workers.
 *
 * Efecto colateral: 'parsed_nmap_results' deriva el detalle del
 * descubrimiento (open_ports + os_guess).
 */
pub async fn patch_scan(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
    Json(patch_body): Json<ScanPatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.scan_repository.fetch(&scan_identifier).await?;

    let stage_artifacts: [(StageModule, &Option<Value>); 5] = [
        (StageModule::Nmap, &patch_body.parsed_nmap_results),
        (StageModule::Fingerprint, &patch_body.parsed_fingerprint_results),
        (StageModule::VulnEngine, &patch_body.parsed_vuln_engine_results),
        (StageModule::Web, &patch_body.parsed_web_results),
        (StageModule::VulnLookup, &patch_body.parsed_vuln_lookup_results),
    ];

    for (stage_module, stage_artifact) in stage_artifacts {
        if let Some(artifact_value) = stage_artifact {
            application_state
                .scan_repository
                .set_parsed_results(&scan_identifier, stage_module, artifact_value)
                .await?;

            if stage_module == StageModule::Nmap {
                nmap_ingestion::ingest_discovery_artifact(
                    &application_state,
                    &scan_identifier,
                    artifact_value,
                )
                .await?;
            }
        }
    }

    if let Some(report_path) = &patch_body.report_path {
        application_state
            .scan_repository
            .set_report_path(&scan_identifier, report_path)
            .await?;
    }

    Ok(Json(application_state.scan_repository.fetch(&scan_identifier).await?))
}

pub async fn destroy_scan(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.scan_repository.soft_delete(&scan_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}

/**
 * POST /scans/{id}/restart — válido solo desde estados terminales.
 * Purga artefactos, cronometría y detalle; re-encola el descubrimiento.
 */
pub async fn restart_scan(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let purged_scan = application_state
        .scan_repository
        .clear_for_restart(&scan_identifier)
        .await
        .map_err(|ledger_fault| match ledger_fault {
            vapter_infra_db::DbError::StaleTransition => {
                ApiError::Conflict("Only terminal scans can be restarted".into())
            }
            other_fault => other_fault.into(),
        })?;

    application_state.scan_detail_repository.delete_for_scan(&scan_identifier).await?;

    let scan_snapshot = match dispatcher::start_scan(&application_state, &purged_scan).await {
        Ok(started_scan) => started_scan,
        Err(dispatch_fault) => {
            error!("💀 [SCANS]: Restart ignition collapsed for [{}]: {}", scan_identifier, dispatch_fault);
            application_state.scan_repository.fetch(&scan_identifier).await?
        }
    };

    info!("♻️  [SCANS]: Scan [{}] restarted.", scan_identifier);
    Ok(Json(scan_snapshot))
}

/**
 * POST /scans/{id}/cancel — cancelación consultiva del usuario.
 * Los workers en vuelo terminan su invocación; sus señales tardías son
 * absorbidas idempotentemente por la máquina de estados.
 */
pub async fn cancel_scan(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let scan = application_state.scan_repository.fetch(&scan_identifier).await?;

    if scan.is_terminal() {
        return Err(ApiError::Conflict("Cannot cancel a terminal scan".into()));
    }

    application_state
        .scan_repository
        .mark_failed(&scan_identifier, USER_CANCELLED_MESSAGE)
        .await?;

    info!("🛑 [SCANS]: Scan [{}] cancelled by user command.", scan_identifier);
    Ok(Json(application_state.scan_repository.fetch(&scan_identifier).await?))
}

/// GET /scans/statistics
pub async fn scan_statistics(
    State(application_state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let scan_statistics = application_state.scan_repository.statistics(None).await?;

    let status_distribution: serde_json::Map<String, Value> = scan_statistics
        .status_distribution
        .into_iter()
        .map(|(status_label, count)| (status_label, json!(count)))
        .collect();

    Ok(Json(json!({
        "total_scans": scan_statistics.total_scans,
        "status_distribution": status_distribution,
        "recent_scans": scan_statistics.recent_scans,
    })))
}

/// PATCH /scans/{id}/vuln-engine-progress — latido periódico del motor.
pub async fn patch_vuln_engine_progress(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
    Json(progress_body): Json<VulnEngineProgressBody>,
) -> Result<impl IntoResponse, ApiError> {
    if progress_body.progress > 100 {
        return Err(ApiError::Validation("progress must lie within [0,100]".into()));
    }

    let scan = application_state.scan_repository.fetch(&scan_identifier).await?;

    application_state
        .vuln_engine_repository
        .upsert_progress(
            &scan.id,
            &scan.target_id,
            progress_body.external_task_id.as_deref(),
            &progress_body.external_status,
            progress_body.progress,
        )
        .await?;

    // Primer latido 'Running': sellar el arranque de la etapa.
    if progress_body.external_status.eq_ignore_ascii_case("running") {
        application_state
            .scan_detail_repository
            .stamp_stage_started(&scan.id, StageModule::VulnEngine)
            .await?;
    }

    Ok(Json(json!({ "status": "progress updated" })))
}

/**
 * POST /scans/{id}/vuln-engine-results — ingesta del reporte masivo.
 * El cuerpo crudo se almacena verbatim; el conteo de severidades se
 * deriva del XML cuando el worker no lo pre-computó.
 */
pub async fn post_vuln_engine_results(
    State(application_state): State<AppState>,
    Path(scan_identifier): Path<String>,
    Json(results_body): Json<VulnEngineResultsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let scan = application_state.scan_repository.fetch(&scan_identifier).await?;

    let vulnerability_count = results_body
        .vulnerability_count
        .unwrap_or_else(|| vuln_report::extract_vulnerability_count(&results_body.full_report));

    let sealed_result = application_state
        .vuln_engine_repository
        .store_report(VulnEngineReportUpload {
            scan_id: scan.id.clone(),
            target_id: scan.target_id.clone(),
            external_task_id: results_body.external_task_id,
            external_report_id: results_body.external_report_id,
            external_target_id: results_body.external_target_id,
            report_format: results_body.report_format,
            full_report: results_body.full_report,
            vulnerability_count,
            started_at: results_body.started_at,
            completed_at: results_body.completed_at.or_else(|| Some(Utc::now())),
        })
        .await?;

    // Artefacto estructurado del escaneo: resumen, jamás un booleano.
    let stage_summary = json!({
        "external_report_id": sealed_result.external_report_id,
        "report_format": sealed_result.report_format,
        "vulnerability_count": sealed_result.vulnerability_count,
    });
    application_state
        .scan_repository
        .set_parsed_results(&scan.id, StageModule::VulnEngine, &stage_summary)
        .await?;

    application_state
        .scan_detail_repository
        .stamp_stage_completed(&scan.id, StageModule::VulnEngine)
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_result)))
}
