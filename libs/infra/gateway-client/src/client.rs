// [libs/infra/gateway-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN GATEWAY UPLINK (V4.3 - STAGE SYNAPSE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SINAPSIS HTTP WORKER -> NÚCLEO CON REINTENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INPUT FETCH: Los workers leen el escaneo, la receta y la lista de
 *    puertos a través de este túnel, jamás del Ledger directamente.
 * 2. RESULT UPLOAD: Artefactos modestos viajan por PATCH /scans/{id};
 *    el reporte masivo del motor externo usa sus endpoints dedicados.
 * 3. BOUNDED INSISTENCE: 5xx y fallos de transporte se reintentan con
 *    retroceso 2^n acotado; 4xx es veredicto permanente.
 * =================================================================
 */

use crate::errors::ClientError;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use vapter_domain_models::{FingerprintDetail, PortList, Protocol, ReportFormat, Scan, ScanType, StageModule};

/// Huella saliente hacia 'POST /fingerprint-details/bulk_create'.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintUploadRow {
    pub scan_id: String,
    pub target_id: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_info: Option<String>,
    pub fingerprint_method: String,
    pub confidence_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

/// Latido de progreso hacia 'PATCH /scans/{id}/vuln-engine-progress'.
#[derive(Debug, Clone, Serialize)]
pub struct VulnEngineProgressPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_task_id: Option<String>,
    pub external_status: String,
    pub progress: u8,
}

/// Reporte final hacia 'POST /scans/{id}/vuln-engine-results'.
#[derive(Debug, Clone, Serialize)]
pub struct VulnEngineResultsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_target_id: Option<String>,
    pub report_format: ReportFormat,
    pub full_report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct GatewayClient {
    network_session_client: Client,
    gateway_base_endpoint: String,
    upload_max_retries: u32,
    retry_base_delay: Duration,
}

impl GatewayClient {
    /**
     * Inicializa el túnel con timeout y presupuesto de reintentos.
     */
    pub fn new(base_url: String, api_timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            network_session_client: Client::builder()
                .user_agent("VaPtER-Stage-Worker/4.0")
                .timeout(api_timeout)
                .build()
                .expect("FATAL: Gateway client initialization failed."),
            gateway_base_endpoint: base_url.trim_end_matches('/').to_string(),
            upload_max_retries: max_retries.max(1),
            retry_base_delay: retry_delay,
        }
    }

    // --- ESTRATO DE LECTURA DE INSUMOS ---

    #[instrument(skip(self))]
    pub async fn fetch_scan(&self, scan_identifier: &str) -> Result<Scan, ClientError> {
        let response_body = self
            .request_with_retry(Method::GET, &format!("/api/orchestrator/scans/{}/", scan_identifier), None)
            .await?;
        Ok(serde_json::from_value(response_body)?)
    }

    #[instrument(skip(self))]
    pub async fn fetch_scan_type(&self, scan_type_identifier: &str) -> Result<ScanType, ClientError> {
        let response_body = self
            .request_with_retry(
                Method::GET,
                &format!("/api/orchestrator/scan-types/{}/", scan_type_identifier),
                None,
            )
            .await?;
        Ok(serde_json::from_value(response_body)?)
    }

    #[instrument(skip(self))]
    pub async fn fetch_port_list(&self, port_list_identifier: &str) -> Result<PortList, ClientError> {
        let response_body = self
            .request_with_retry(
                Method::GET,
                &format!("/api/orchestrator/port-lists/{}/", port_list_identifier),
                None,
            )
            .await?;
        Ok(serde_json::from_value(response_body)?)
    }

    #[instrument(skip(self))]
    pub async fn fetch_fingerprints_by_scan(
        &self,
        scan_identifier: &str,
    ) -> Result<Vec<FingerprintDetail>, ClientError> {
        let response_body = self
            .request_with_retry(
                Method::GET,
                &format!("/api/orchestrator/fingerprint-details/by_scan?scan_id={}", scan_identifier),
                None,
            )
            .await?;
        Ok(serde_json::from_value(response_body)?)
    }

    // --- ESTRATO DE CARGA DE RESULTADOS ---

    /// PATCH del artefacto estructurado de una etapa sobre el escaneo.
    #[instrument(skip(self, stage_artifact))]
    pub async fn upload_parsed_results(
        &self,
        scan_identifier: &str,
        stage_module: StageModule,
        stage_artifact: &Value,
    ) -> Result<(), ClientError> {
        let mut patch_fields = serde_json::Map::new();
        patch_fields.insert(stage_module.parsed_results_field().to_string(), stage_artifact.clone());
        let patch_payload = Value::Object(patch_fields);

        self.request_with_retry(
            Method::PATCH,
            &format!("/api/orchestrator/scans/{}/", scan_identifier),
            Some(patch_payload),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, fingerprint_rows), fields(batch_size = fingerprint_rows.len()))]
    pub async fn bulk_create_fingerprints(
        &self,
        fingerprint_rows: &[FingerprintUploadRow],
    ) -> Result<(), ClientError> {
        let batch_payload = serde_json::to_value(fingerprint_rows)?;
        self.request_with_retry(
            Method::POST,
            "/api/orchestrator/fingerprint-details/bulk_create",
            Some(json!({ "fingerprint_details": batch_payload })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, progress_payload))]
    pub async fn patch_vuln_engine_progress(
        &self,
        scan_identifier: &str,
        progress_payload: &VulnEngineProgressPayload,
    ) -> Result<(), ClientError> {
        self.request_with_retry(
            Method::PATCH,
            &format!("/api/orchestrator/scans/{}/vuln-engine-progress", scan_identifier),
            Some(serde_json::to_value(progress_payload)?),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, results_payload))]
    pub async fn post_vuln_engine_results(
        &self,
        scan_identifier: &str,
        results_payload: &VulnEngineResultsPayload,
    ) -> Result<(), ClientError> {
        self.request_with_retry(
            Method::POST,
            &format!("/api/orchestrator/scans/{}/vuln-engine-results", scan_identifier),
            Some(serde_json::to_value(results_payload)?),
        )
        .await?;
        Ok(())
    }

    /// PATCH de la ruta del artefacto de reporte ensamblado.
    #[instrument(skip(self))]
    pub async fn patch_report_path(
        &self,
        scan_identifier: &str,
        report_path: &str,
    ) -> Result<(), ClientError> {
        self.request_with_retry(
            Method::PATCH,
            &format!("/api/orchestrator/scans/{}/", scan_identifier),
            Some(json!({ "report_path": report_path })),
        )
        .await?;
        Ok(())
    }

    // --- ESTRATO DE TRANSPORTE CON INSISTENCIA ACOTADA ---

    async fn request_with_retry(
        &self,
        http_method: Method,
        resource_path: &str,
        json_payload: Option<Value>,
    ) -> Result<Value, ClientError> {
        let target_url = format!("{}{}", self.gateway_base_endpoint, resource_path);
        let mut attempt_number: u32 = 0;

        loop {
            attempt_number += 1;

            let mut request_builder = self
                .network_session_client
                .request(http_method.clone(), &target_url);
            if let Some(payload) = &json_payload {
                request_builder = request_builder.json(payload);
            }

            match request_builder.send().await {
                Ok(network_response) => {
                    let response_status = network_response.status();

                    if response_status.is_success() {
                        let response_text = network_response.text().await.unwrap_or_default();
                        let response_body = if response_text.is_empty() {
                            Value::Null
                        } else {
                            serde_json::from_str(&response_text)?
                        };
                        debug!("📥 [UPLINK]: {} {} -> {}", http_method, resource_path, response_status);
                        return Ok(response_body);
                    }

                    if response_status == StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(resource_path.into()));
                    }

                    // 4xx distinto de 404: veredicto permanente del núcleo.
                    if response_status.is_client_error() {
                        let rejection_body = network_response.text().await.unwrap_or_default();
                        return Err(ClientError::ServerRejection {
                            status: response_status.as_u16(),
                            body: rejection_body,
                        });
                    }

                    warn!(
                        "⚠️ [UPLINK]: {} {} -> HTTP_{} (attempt {}/{})",
                        http_method, resource_path, response_status, attempt_number, self.upload_max_retries
                    );
                }
                Err(transport_fault) => {
                    warn!(
                        "⚠️ [UPLINK]: {} {} transport fault: {} (attempt {}/{})",
                        http_method, resource_path, transport_fault, attempt_number, self.upload_max_retries
                    );
                }
            }

            if attempt_number >= self.upload_max_retries {
                return Err(ClientError::RetriesExhausted(resource_path.into()));
            }

            let backoff_delay = self.retry_base_delay * 2u32.pow(attempt_number - 1);
            tokio::time::sleep(backoff_delay).await;
        }
    }
}
