// [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V4.3 - CONTROL SURFACE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA REST DEL PLANO DE CONTROL
 *
 * VISION HIPER-HOLÍSTICA:
 * Toda colección vive bajo '/api/orchestrator/'. El proxy de borde
 * posee la política CORS definitiva; esta capa permanece permisiva.
 * =================================================================
 */

use crate::handlers::{
    customers, fingerprint_details, port_lists, scan_details, scan_types, scans, targets,
    vuln_engine_results,
};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use axum::http::{header, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_control_surface_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: el proxy de borde gobierna la política definitiva.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE INVENTARIO: Clientes, listas de puertos y recetas
    let inventory_stratum = Router::new()
        .route("/customers/", get(customers::list_customers).post(customers::create_customer))
        .route(
            "/customers/:id/",
            get(customers::retrieve_customer)
                .patch(customers::patch_customer)
                .delete(customers::destroy_customer),
        )
        .route("/customers/:id/targets", get(customers::customer_targets))
        .route("/customers/:id/scans", get(customers::customer_scans))
        .route("/customers/:id/statistics", get(customers::customer_statistics))
        .route("/port-lists/", get(port_lists::list_port_lists).post(port_lists::create_port_list))
        .route(
            "/port-lists/:id/",
            get(port_lists::retrieve_port_list)
                .patch(port_lists::patch_port_list)
                .delete(port_lists::destroy_port_list),
        )
        .route("/scan-types/", get(scan_types::list_scan_types).post(scan_types::create_scan_type))
        .route(
            "/scan-types/:id/",
            get(scan_types::retrieve_scan_type)
                .patch(scan_types::patch_scan_type)
                .delete(scan_types::destroy_scan_type),
        );

    // ESTRATO DE OBJETIVOS Y CICLO DE VIDA DE ESCANEOS
    let assessment_stratum = Router::new()
        .route("/targets/", get(targets::list_targets).post(targets::create_target))
        .route(
            "/targets/:id/",
            get(targets::retrieve_target)
                .patch(targets::patch_target)
                .delete(targets::destroy_target),
        )
        .route("/targets/:id/scans", get(targets::target_scans))
        .route("/targets/:id/scan", post(targets::ignite_target_scan))
        .route("/scans/", get(scans::list_scans).post(scans::create_scan))
        .route("/scans/statistics", get(scans::scan_statistics))
        .route(
            "/scans/:id/",
            get(scans::retrieve_scan).patch(scans::patch_scan).delete(scans::destroy_scan),
        )
        .route("/scans/:id/restart", post(scans::restart_scan))
        .route("/scans/:id/cancel", post(scans::cancel_scan))
        .route("/scans/:id/vuln-engine-progress", patch(scans::patch_vuln_engine_progress))
        .route("/scans/:id/vuln-engine-results", post(scans::post_vuln_engine_results));

    // ESTRATO DE ARTEFACTOS: Detalles, huellas y motor externo
    let artifact_stratum = Router::new()
        .route("/scan-details/", get(scan_details::list_scan_details))
        .route(
            "/scan-details/:id/",
            get(scan_details::retrieve_scan_detail)
                .patch(scan_details::patch_scan_detail)
                .delete(scan_details::destroy_scan_detail),
        )
        .route(
            "/fingerprint-details/",
            get(fingerprint_details::list_fingerprint_details)
                .post(fingerprint_details::create_fingerprint_detail),
        )
        .route(
            "/fingerprint-details/bulk_create",
            post(fingerprint_details::bulk_create_fingerprint_details),
        )
        .route("/fingerprint-details/by_scan", get(fingerprint_details::fingerprints_by_scan))
        .route("/fingerprint-details/by_target", get(fingerprint_details::fingerprints_by_target))
        .route(
            "/fingerprint-details/service_summary",
            get(fingerprint_details::fingerprint_service_summary),
        )
        .route(
            "/fingerprint-details/:id/",
            get(fingerprint_details::retrieve_fingerprint_detail)
                .delete(fingerprint_details::destroy_fingerprint_detail),
        )
        .route(
            "/vuln-engine-results/",
            get(vuln_engine_results::list_vuln_engine_results),
        )
        .route(
            "/vuln-engine-results/:id/",
            get(vuln_engine_results::retrieve_vuln_engine_result),
        );

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest(
            "/api/orchestrator",
            Router::new()
                .merge(inventory_stratum)
                .merge(assessment_stratum)
                .merge(artifact_stratum),
        )
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
