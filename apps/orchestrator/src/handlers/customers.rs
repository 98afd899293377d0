// [apps/orchestrator/src/handlers/customers.rs]
/*!
 * =================================================================
 * APARATO: CUSTOMER PERIMETER HANDLERS (V4.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE CLIENTES Y AGREGADOS POR CLIENTE
 * =================================================================
 */

use crate::handlers::{paged_envelope, ApiError, ListParams};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use vapter_infra_db::repositories::customer::NewCustomer;
use vapter_infra_db::repositories::scan::ScanFilters;

#[derive(Debug, Deserialize)]
pub struct CustomerCreateBody {
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerPatchBody {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

pub async fn list_customers(
    State(application_state): State<AppState>,
    Query(list_params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paged_customers = application_state
        .customer_repository
        .list(&list_params.to_query())
        .await?;
    Ok(paged_envelope(paged_customers))
}

pub async fn create_customer(
    State(application_state): State<AppState>,
    Json(create_body): Json<CustomerCreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    if create_body.name.trim().is_empty() {
        return Err(ApiError::Validation("'name' must not be empty".into()));
    }
    if !create_body.email.contains('@') {
        return Err(ApiError::Validation("'email' is not a valid address".into()));
    }

    let sealed_customer = application_state
        .customer_repository
        .create(NewCustomer {
            name: create_body.name,
            company_name: create_body.company_name,
            email: create_body.email,
            phone: create_body.phone,
            contact_person: create_body.contact_person,
            address: create_body.address,
            notes: create_body.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(sealed_customer)))
}

pub async fn retrieve_customer(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(application_state.customer_repository.fetch(&customer_identifier).await?))
}

pub async fn patch_customer(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
    Json(patch_body): Json<CustomerPatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut customer = application_state.customer_repository.fetch(&customer_identifier).await?;

    if let Some(name) = patch_body.name {
        customer.name = name;
    }
    if let Some(email) = patch_body.email {
        if !email.contains('@') {
            return Err(ApiError::Validation("'email' is not a valid address".into()));
        }
        customer.email = email;
    }
    if patch_body.company_name.is_some() {
        customer.company_name = patch_body.company_name;
    }
    if patch_body.phone.is_some() {
        customer.phone = patch_body.phone;
    }
    if patch_body.contact_person.is_some() {
        customer.contact_person = patch_body.contact_person;
    }
    if patch_body.address.is_some() {
        customer.address = patch_body.address;
    }
    if patch_body.notes.is_some() {
        customer.notes = patch_body.notes;
    }

    Ok(Json(application_state.customer_repository.update(&customer).await?))
}

pub async fn destroy_customer(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.customer_repository.soft_delete(&customer_identifier).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /customers/{id}/targets
pub async fn customer_targets(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
    Query(list_params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.customer_repository.fetch(&customer_identifier).await?;

    let paged_targets = application_state
        .target_repository
        .list(&list_params.to_query(), Some(&customer_identifier))
        .await?;
    Ok(paged_envelope(paged_targets))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerScansParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl CustomerScansParams {
    fn list_params(&self) -> ListParams {
        ListParams {
            page: self.page,
            page_size: self.page_size,
            ordering: self.ordering.clone(),
            search: self.search.clone(),
        }
    }
}

/// GET /customers/{id}/scans
pub async fn customer_scans(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
    Query(scans_params): Query<CustomerScansParams>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.customer_repository.fetch(&customer_identifier).await?;

    let scan_filters = ScanFilters {
        status: scans_params.status.clone(),
        customer_id: Some(customer_identifier),
        ..ScanFilters::default()
    };

    let paged_scans = application_state
        .scan_repository
        .list(&scans_params.list_params().to_query(), &scan_filters)
        .await?;
    Ok(paged_envelope(paged_scans))
}

/// GET /customers/{id}/statistics
pub async fn customer_statistics(
    State(application_state): State<AppState>,
    Path(customer_identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    application_state.customer_repository.fetch(&customer_identifier).await?;

    let targets_count = application_state
        .target_repository
        .count_for_customer(&customer_identifier)
        .await?;
    let scan_statistics = application_state
        .scan_repository
        .statistics(Some(&customer_identifier))
        .await?;

    let status_distribution: serde_json::Map<String, serde_json::Value> = scan_statistics
        .status_distribution
        .into_iter()
        .map(|(status_label, count)| (status_label, json!(count)))
        .collect();

    Ok(Json(json!({
        "targets_count": targets_count,
        "scans_count": scan_statistics.total_scans,
        "status_distribution": status_distribution,
        "recent_scans": scan_statistics.recent_scans,
    })))
}
