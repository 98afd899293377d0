// [apps/orchestrator/src/handlers/port_lists.rs]
/*!
 * =================================================================
 * APARATO: PORT LIST PERIMETER HANDLERS (V4.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE LISTAS DE PUERTOS
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use vapter_infra_db::repositories::port_list::NewPortList;

#[derive(Debug, Deserialize)]
pub struct PortListCreateBody {
    pub name: String,
    #[serde(default)]
    pub tcp_ports: Option<String>,
    #[serde(default)]
    pub udp_ports: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PortListPatchBody {
    pub name: Option<String>,
    pub tcp_ports: Option<String>,
    pub udp_ports: Option<String>,
    pub description: Option<String>,
}

pub async fn list_port_lists(
    State(application_state): State<AppState>,
    Query(list_params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paged_port_lists = application_state
        .port_list_repository
        .list(&list_params.to_query())
        .await?;
    Ok(paged_envelope(paged_port_lists))
}

pub async fn create_port_list(
    State(application_state): State<AppState>,
    Json(create_body): Json<PortListCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let sealed_port_list = application_state
        .port_list_repository
        .create(NewPortList {
            name: create_body.name,
            tcp_ports: create_body.tcp_ports,
            udp_ports: create_body.udp_ports,
            description: create_body.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_port_list)))
}

pub async fn retrieve_port_list(
    State(application_state): State<AppState>,
    Path(port_list_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.port_list_repository.fetch(&port_list_identifier).await?))
}

pub async fn patch_port_list(
    State(application_state): State<AppState>,
    Path(port_list_identifier): Path<String>,
    Json(patch_body): Json<PortListPatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut port_list = application_state.port_list_repository.fetch(&port_list_identifier).await?;

    if let Some(name) = patch_body.name {
        port_list.name = name;
    }
    if patch_body.tcp_ports.is_some() {
        port_list.tcp_ports = patch_body.tcp_ports;
    }
    if patch_body.udp_ports.is_some() {
        port_list.udp_ports = patch_body.udp_ports;
    }
    if patch_body.description.is_some() {
        port_list.description = patch_body.description;
    }

    Ok(Json(application_state.port_list_repository.update(&port_list).await?))
}

pub async fn destroy_port_list(
    State(application_state): State<AppState>,
    Path(port_list_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.port_list_repository.soft_delete(&port_list_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}
