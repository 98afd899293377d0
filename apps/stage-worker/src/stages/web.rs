// [apps/stage-worker/src/stages/web.rs]
/*!
 * =================================================================
 * APARATO: WEB PROBE EXECUTOR (V4.2 - SURFACE MAPPER)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: SONDEO HTTP DE SUPERFICIES WEB DESCUBIERTAS
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument};
use vapter_domain_models::nmap::{derive_open_ports, NmapRunResults, OpenPortEntry};
use vapter_domain_models::{StageModule, StagePhase};

/// Puertos sondeados como web aun sin huella de servicio explícita.
const WELL_KNOWN_WEB_PORTS: &[u16] = &[80, 443, 8000, 8080, 8443];

pub struct WebExecutor;

#[async_trait]
impl StageExecutor for WebExecutor {
    fn module(&self) -> StageModule {
        StageModule::Web
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        settings.web_scan_timeout
    }

    #[instrument(skip(self, context), fields(target = %context.request.target_host))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        let scan = context.gateway.fetch_scan(&context.request.scan_id).await?;

        let web_candidates: Vec<OpenPortEntry> = match &scan.parsed_nmap_results {
            Some(discovery_artifact) => {
                let discovery_results: NmapRunResults =
                    serde_json::from_value(discovery_artifact.clone()).map_err(|schema_fault| {
                        StageFailure::Permanent(format!("discovery artifact drift: {}", schema_fault))
                    })?;

                derive_open_ports(&discovery_results)
                    .tcp
                    .into_iter()
                    .filter(is_web_candidate)
                    .collect()
            }
            None => Vec::new(),
        };

        let probe_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|client_fault| StageFailure::Transient(client_fault.to_string()))?;

        let mut surface_entries: Vec<Value> = Vec::new();
        let candidate_count = web_candidates.len();

        for (probed_count, port_entry) in web_candidates.into_iter().enumerate() {
            let scheme = if port_entry.port == 443 || port_entry.port == 8443 { "https" } else { "http" };
            let probe_url = format!("{}://{}:{}/", scheme, context.request.target_host, port_entry.port);

            if let Ok(probe_response) = probe_client.get(&probe_url).send().await {
                let status_code = probe_response.status().as_u16();
                let server_header = probe_response
                    .headers()
                    .get("server")
                    .and_then(|header_value| header_value.to_str().ok())
                    .map(str::to_string);

                let page_title = probe_response
                    .text()
                    .await
                    .ok()
                    .and_then(|body_text| extract_page_title(&body_text));

                surface_entries.push(json!({
                    "port": port_entry.port,
                    "scheme": scheme,
                    "url": probe_url,
                    "status_code": status_code,
                    "server": server_header,
                    "title": page_title,
                }));
            }

            if candidate_count > 0 {
                let progress = (((probed_count + 1) * 100) / candidate_count) as u8;
                let _ = context
                    .status_emitter
                    .emit_progress(&context.request.scan_id, progress)
                    .await;
            }
        }

        let _ = context
            .status_emitter
            .emit_phase(&context.request.scan_id, StagePhase::Parsing)
            .await;

        let stage_artifact = json!({
            "probed_ports": candidate_count,
            "responsive_surfaces": surface_entries.len(),
            "surfaces": surface_entries,
        });

        context
            .gateway
            .upload_parsed_results(&context.request.scan_id, StageModule::Web, &stage_artifact)
            .await?;

        info!(
            "📤 [WEB]: {} responsive surfaces sealed for scan [{}].",
            stage_artifact["responsive_surfaces"], context.request.scan_id
        );
        Ok(())
    }
}

fn is_web_candidate(port_entry: &OpenPortEntry) -> bool {
    if WELL_KNOWN_WEB_PORTS.contains(&port_entry.port) {
        return true;
    }
    port_entry
        .service
        .as_deref()
        .map(|service_name| service_name.contains("http"))
        .unwrap_or(false)
}

fn extract_page_title(body_text: &str) -> Option<String> {
    let lowered_body = body_text.to_lowercase();
    let title_start = lowered_body.find("<title>")? + "<title>".len();
    let title_end = lowered_body[title_start..].find("</title>")? + title_start;
    let raw_title = body_text.get(title_start..title_end)?.trim();

    if raw_title.is_empty() {
        None
    } else {
        Some(raw_title.chars().take(256).collect())
    }
}
