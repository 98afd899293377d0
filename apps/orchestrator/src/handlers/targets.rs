// [apps/orchestrator/src/handlers/targets.rs]
/*!
 * =================================================================
 * APARATO: TARGET PERIMETER HANDLERS (V4.2 - SCAN IGNITION)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE OBJETIVOS Y ARRANQUE DE ESCANEOS
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::services::dispatcher;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::error;
use vapter_infra_db::repositories::scan::ScanFilters;
use vapter_infra_db::repositories::target::NewTarget;

#[derive(Debug, Deserialize)]
pub struct TargetCreateBody {
    pub customer_id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetPatchBody {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
    pub customer_id: Option<String>,
}

impl TargetListParams {
    fn list_params(&self) -> ListParams {
        ListParams {
            page: self.page,
            page_size: self.page_size,
            ordering: self.ordering.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetScanBody {
    pub scan_type_id: String,
}

pub async fn list_targets(
    State(application_state): State<AppState>,
    Query(target_params): Query<TargetListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paged_targets = application_state
        .target_repository
        .list(&target_params.list_params().to_query(), target_params.customer_id.as_deref())
        .await?;
    Ok(paged_envelope(paged_targets))
}

pub async fn create_target(
    State(application_state): State<AppState>,
    Json(create_body): Json<TargetCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    // El propietario debe existir y estar vivo.
    application_state.customer_repository.fetch(&create_body.customer_id).await?;

    let sealed_target = application_state
        .target_repository
        .create(NewTarget {
            customer_id: create_body.customer_id,
            name: create_body.name,
            address: create_body.address,
            description: create_body.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_target)))
}

pub async fn retrieve_target(
    State(application_state): State<AppState>,
    Path(target_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.target_repository.fetch(&target_identifier).await?))
}

pub async fn patch_target(
    State(application_state): State<AppState>,
    Path(target_identifier): Path<String>,
    Json(patch_body): Json<TargetPatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut target = application_state.target_repository.fetch(&target_identifier).await?;

    if let Some(name) = patch_body.name {
        target.name = name;
    }
    if let Some(address) = patch_body.address {
        target.address = address;
    }
    if patch_body.description.is_some() {
        target.description = patch_body.description;
    }

    Ok(Json(application_state.target_repository.update(&target).await?))
}

pub async fn destroy_target(
    State(application_state): State<AppState>,
    Path(target_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.target_repository.soft_delete(&target_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetScansParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl TargetScansParams {
    fn list_params(&self) -> ListParams {
        ListParams {
            page: self.page,
            page_size: self.page_size,
            ordering: self.ordering.clone(),
            search: self.search.clone(),
        }
    }
}

/// GET /targets/{id}/scans
pub async fn target_scans(
    State(application_state): State<AppState>,
    Path(target_identifier): Path<String>,
    Query(scans_params): Query<TargetScansParams>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.target_repository.fetch(&target_identifier).await?;

    let scan_filters = ScanFilters {
        status: scans_params.status.clone(),
        target_id: Some(target_identifier),
        ..ScanFilters::default()
    };

    let paged_scans = application_state
        .scan_repository
        .list(&scans_params.list_params().to_query(), &scan_filters)
        .await?;
    Ok(paged_envelope(paged_scans))
}

/**
 * POST /targets/{id}/scan — forja un escaneo y lo entrega al despachador.
 *
 * Un colapso del encolado deja el escaneo sellado en 'Failed'; la
 * respuesta sigue siendo 201 con el registro creado, fiel al contrato
 * de creación asíncrona.
 */
pub async fn ignite_target_scan(
    State(application_state): State<AppState>,
    Path(target_identifier): Path<String>,
    Json(scan_body): Json<TargetScanBody>,
) -> Result<impl IntoResponse, ApiError> {
    let target = application_state.target_repository.fetch(&target_identifier).await?;
    let scan_type = application_state.scan_type_repository.fetch(&scan_body.scan_type_id).await?;
    scan_type
        .validate()
        .map_err(|validation_fault| ApiError::Validation(validation_fault.to_string()))?;

    let forged_scan = application_state
        .scan_repository
        .create(&target.id, &scan_type.id)
        .await?;

    let scan_snapshot = match dispatcher::start_scan(&application_state, &forged_scan).await {
        Ok(started_scan) => started_scan,
        Err(dispatch_fault) => {
            error!("💀 [TARGETS]: Scan [{}] ignition collapsed: {}", forged_scan.id, dispatch_fault);
            application_state.scan_repository.fetch(&forged_scan.id).await?
        }
    };

    Ok((StatusCode::CREATED, Json(scan_snapshot)))
}
