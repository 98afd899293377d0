// [apps/orchestrator/src/handlers/scan_types.rs]
/*!
 * =================================================================
 * APARATO: SCAN TYPE PERIMETER HANDLERS (V4.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE RECETAS DE PIPELINE
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use vapter_infra_db::repositories::scan_type::NewScanType;

#[derive(Debug, Deserialize)]
pub struct ScanTypeCreateBody {
    pub name: String,
    #[serde(default)]
    pub only_discovery: bool,
    #[serde(default)]
    pub consider_alive: bool,
    #[serde(default)]
    pub be_quiet: bool,
    #[serde(default)]
    pub port_list_id: Option<String>,
    #[serde(default)]
    pub plugin_fingerprint: bool,
    #[serde(default)]
    pub plugin_vuln_engine: bool,
    #[serde(default)]
    pub plugin_web: bool,
    #[serde(default)]
    pub plugin_vuln_lookup: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanTypePatchBody {
    pub name: Option<String>,
    pub only_discovery: Option<bool>,
    pub consider_alive: Option<bool>,
    pub be_quiet: Option<bool>,
    pub port_list_id: Option<String>,
    pub plugin_fingerprint: Option<bool>,
    pub plugin_vuln_engine: Option<bool>,
    pub plugin_web: Option<bool>,
    pub plugin_vuln_lookup: Option<bool>,
    pub description: Option<String>,
}

pub async fn list_scan_types(
    State(application_state): State<AppState>,
    Query(list_params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paged_scan_types = application_state
        .scan_type_repository
        .list(&list_params.to_query())
        .await?;
    Ok(paged_envelope(paged_scan_types))
}

pub async fn create_scan_type(
    State(application_state): State<AppState>,
    Json(create_body): Json<ScanTypeCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    // Receta conflictiva: descubrimiento puro excluye plugins.
    if create_body.only_discovery
        && (create_body.plugin_fingerprint
            || create_body.plugin_vuln_engine
            || create_body.plugin_web
            || create_body.plugin_vuln_lookup)
    {
        return Err(ApiError::Validation("only_discovery excludes post-discovery plugins".into()));
    }

    if let Some(port_list_identifier) = &create_body.port_list_id {
        application_state.port_list_repository.fetch(port_list_identifier).await?;
    }

    let sealed_scan_type = application_state
        .scan_type_repository
        .create(NewScanType {
            name: create_body.name,
            only_discovery: create_body.only_discovery,
            consider_alive: create_body.consider_alive,
            be_quiet: create_body.be_quiet,
            port_list_id: create_body.port_list_id,
            plugin_fingerprint: create_body.plugin_fingerprint,
            plugin_vuln_engine: create_body.plugin_vuln_engine,
            plugin_web: create_body.plugin_web,
            plugin_vuln_lookup: create_body.plugin_vuln_lookup,
            description: create_body.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_scan_type)))
}

pub async fn retrieve_scan_type(
    State(application_state): State<AppState>,
    Path(scan_type_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.scan_type_repository.fetch(&scan_type_identifier).await?))
}

pub async fn patch_scan_type(
    State(application_state): State<AppState>,
    Path(scan_type_identifier): Path<String>,
    Json(patch_body): Json<ScanTypePatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut scan_type = application_state.scan_type_repository.fetch(&scan_type_identifier).await?;

    if let Some(name) = patch_body.name {
        scan_type.name = name;
    }
    if let Some(only_discovery) = patch_body.only_discovery {
        scan_type.only_discovery = only_discovery;
    }
    if let Some(consider_alive) = patch_body.consider_alive {
        scan_type.consider_alive = consider_alive;
    }
    if let Some(be_quiet) = patch_body.be_quiet {
        scan_type.be_quiet = be_quiet;
    }
    if patch_body.port_list_id.is_some() {
        scan_type.port_list_id = patch_body.port_list_id;
    }
    if let Some(plugin_fingerprint) = patch_body.plugin_fingerprint {
        scan_type.plugin_fingerprint = plugin_fingerprint;
    }
    if let Some(plugin_vuln_engine) = patch_body.plugin_vuln_engine {
        scan_type.plugin_vuln_engine = plugin_vuln_engine;
    }
    if let Some(plugin_web) = patch_body.plugin_web {
        scan_type.plugin_web = plugin_web;
    }
    if let Some(plugin_vuln_lookup) = patch_body.plugin_vuln_lookup {
        scan_type.plugin_vuln_lookup = plugin_vuln_lookup;
    }
    if patch_body.description.is_some() {
        scan_type.description = patch_body.description;
    }

    scan_type
        .validate()
        .map_err(|validation_fault| ApiError::Validation(validation_fault.to_string()))?;

    Ok(Json(application_state.scan_type_repository.update(&scan_type).await?))
}

pub async fn destroy_scan_type(
    State(application_state): State<AppState>,
    Path(scan_type_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.scan_type_repository.soft_delete(&scan_type_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}
