// [apps/stage-worker/src/stages/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT EXECUTOR (V4.3 - BOUNDED PROBE POOL)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: HUELLA DE SERVICIOS POR PUERTO CON POOL ACOTADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED FAN-OUT: Un semáforo acota las sondas concurrentes
 *    (default 10); cada sonda respeta su timeout por puerto (60s).
 * 2. INPUT SYNAPSE: Los puertos abiertos provienen del artefacto de
 *    descubrimiento ya sellado en el núcleo, jamás de un re-escaneo.
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use vapter_domain_models::nmap::{derive_open_ports, NmapRunResults, OpenPortEntry};
use vapter_domain_models::{Protocol, StageModule, StagePhase};
use vapter_infra_gateway_client::FingerprintUploadRow;

pub struct FingerprintExecutor;

/// Veredicto de una sonda individual sobre un puerto.
struct ProbeVerdict {
    port: u16,
    protocol: Protocol,
    service_name: Option<String>,
    service_product: Option<String>,
    service_version: Option<String>,
    service_info: Option<String>,
    confidence_score: u8,
    raw_response: Option<String>,
}

#[async_trait]
impl StageExecutor for FingerprintExecutor {
    fn module(&self) -> StageModule {
        StageModule::Fingerprint
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        // Presupuesto de pared: pool completo de puertos en serie como
        // peor caso degenerado, acotado a una hora.
        settings.fingerprint_timeout_per_port.saturating_mul(60).min(Duration::from_secs(3600))
    }

    #[instrument(skip(self, context), fields(target = %context.request.target_host))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        // 1. INSUMOS: puertos abiertos del descubrimiento sellado.
        let scan = context.gateway.fetch_scan(&context.request.scan_id).await?;

        let discovery_results: NmapRunResults = match &scan.parsed_nmap_results {
            Some(discovery_artifact) => serde_json::from_value(discovery_artifact.clone())
                .map_err(|schema_fault| {
                    StageFailure::Permanent(format!("discovery artifact drift: {}", schema_fault))
                })?,
            None => {
                return Err(StageFailure::Permanent(
                    "discovery artifact absent; fingerprint stage has no input".into(),
                ))
            }
        };

        let open_ports_map = derive_open_ports(&discovery_results);
        let probe_targets: Vec<(OpenPortEntry, Protocol)> = open_ports_map
            .tcp
            .iter()
            .cloned()
            .map(|entry| (entry, Protocol::Tcp))
            .chain(open_ports_map.udp.iter().cloned().map(|entry| (entry, Protocol::Udp)))
            .collect();

        if probe_targets.is_empty() {
            info!("🔬 [FINGERPRINT]: No open ports for scan [{}]; sealing empty artifact.", context.request.scan_id);
            let empty_artifact = json!({ "total_ports": 0, "identified_services": 0, "fingerprints": [] });
            context
                .gateway
                .upload_parsed_results(&context.request.scan_id, StageModule::Fingerprint, &empty_artifact)
                .await?;
            return Ok(());
        }

        // 2. FAN-OUT ACOTADO DE SONDAS
        let probe_pool = Arc::new(Semaphore::new(context.settings.max_concurrent_fingerprints));
        let mut probe_handles = Vec::with_capacity(probe_targets.len());

        let total_probe_count = probe_targets.len();
        for (port_entry, protocol) in probe_targets {
            let pool_permit = Arc::clone(&probe_pool);
            let target_host = context.request.target_host.clone();
            let tool_path = context.settings.fingerprintx_path.clone();
            let per_port_timeout = context.settings.fingerprint_timeout_per_port;

            probe_handles.push(tokio::spawn(async move {
                let _permit = pool_permit
                    .acquire()
                    .await
                    .expect("FATAL: Probe pool semaphore closed.");
                probe_single_port(&tool_path, &target_host, port_entry, protocol, per_port_timeout).await
            }));
        }

        let mut probe_verdicts: Vec<ProbeVerdict> = Vec::new();
        for (completed_probes, probe_handle) in probe_handles.into_iter().enumerate() {
            if let Ok(Some(probe_verdict)) = probe_handle.await {
                probe_verdicts.push(probe_verdict);
            }

            let progress = (((completed_probes + 1) * 100) / total_probe_count) as u8;
            let _ = context
                .status_emitter
                .emit_progress(&context.request.scan_id, progress)
                .await;
        }

        // 3. CARGA MASIVA Y RESUMEN ESTRUCTURADO
        let _ = context
            .status_emitter
            .emit_phase(&context.request.scan_id, StagePhase::Parsing)
            .await;

        let upload_rows: Vec<FingerprintUploadRow> = probe_verdicts
            .iter()
            .map(|verdict| FingerprintUploadRow {
                scan_id: context.request.scan_id.clone(),
                target_id: context.request.target_id.clone(),
                port: verdict.port,
                protocol: verdict.protocol,
                service_name: verdict.service_name.clone(),
                service_product: verdict.service_product.clone(),
                service_version: verdict.service_version.clone(),
                service_info: verdict.service_info.clone(),
                fingerprint_method: "fingerprintx".into(),
                confidence_score: verdict.confidence_score,
                raw_response: verdict.raw_response.clone(),
                additional_info: None,
            })
            .collect();

        if !upload_rows.is_empty() {
            context.gateway.bulk_create_fingerprints(&upload_rows).await?;
        }

        let fingerprint_summaries: Vec<Value> = probe_verdicts
            .iter()
            .map(|verdict| {
                json!({
                    "port": verdict.port,
                    "protocol": verdict.protocol,
                    "service": verdict.service_name,
                    "product": verdict.service_product,
                    "version": verdict.service_version,
                    "confidence": verdict.confidence_score,
                })
            })
            .collect();

        let stage_artifact = json!({
            "total_ports": total_probe_count,
            "identified_services": fingerprint_summaries.len(),
            "fingerprints": fingerprint_summaries,
        });

        context
            .gateway
            .upload_parsed_results(&context.request.scan_id, StageModule::Fingerprint, &stage_artifact)
            .await?;

        info!(
            "📤 [FINGERPRINT]: {} fingerprints sealed for scan [{}].",
            probe_verdicts.len(),
            context.request.scan_id
        );
        Ok(())
    }
}

/// Sonda individual: invoca fingerprintx en modo JSON contra host:puerto.
async fn probe_single_port(
    tool_path: &std::path::Path,
    target_host: &str,
    port_entry: OpenPortEntry,
    protocol: Protocol,
    per_port_timeout: Duration,
) -> Option<ProbeVerdict> {
    let probe_target = format!("{}:{}", target_host, port_entry.port);

    let mut probe_command = Command::new(tool_path);
    probe_command.arg("--json").arg("-t").arg(&probe_target);
    if protocol == Protocol::Udp {
        probe_command.arg("--udp");
    }

    let probe_output = match timeout(per_port_timeout, probe_command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(spawn_fault)) => {
            warn!("⚠️ [FINGERPRINT]: Probe spawn failed on {}: {}", probe_target, spawn_fault);
            return fallback_verdict(port_entry, protocol);
        }
        Err(_elapsed) => {
            warn!("⏱️  [FINGERPRINT]: Probe timeout on {}.", probe_target);
            return fallback_verdict(port_entry, protocol);
        }
    };

    let stdout_text = String::from_utf8_lossy(&probe_output.stdout);
    let first_json_line = stdout_text.lines().find(|line| line.trim_start().starts_with('{'))?;

    let probe_json: Value = serde_json::from_str(first_json_line).ok()?;

    Some(ProbeVerdict {
        port: port_entry.port,
        protocol,
        service_name: text_field(&probe_json, "protocol").or(port_entry.service),
        service_product: text_field(&probe_json, "product").or(port_entry.product),
        service_version: text_field(&probe_json, "version").or(port_entry.version),
        service_info: text_field(&probe_json, "metadata"),
        confidence_score: 90,
        raw_response: Some(first_json_line.to_string()),
    })
}

/// Huella degradada: el veredicto del descubridor como única evidencia.
fn fallback_verdict(port_entry: OpenPortEntry, protocol: Protocol) -> Option<ProbeVerdict> {
    port_entry.service.as_ref()?;

    Some(ProbeVerdict {
        port: port_entry.port,
        protocol,
        service_name: port_entry.service,
        service_product: port_entry.product,
        service_version: port_entry.version,
        service_info: port_entry.extrainfo,
        confidence_score: 40,
        raw_response: None,
    })
}

fn text_field(json_object: &Value, field_name: &str) -> Option<String> {
    json_object
        .get(field_name)
        .and_then(|field_value| field_value.as_str())
        .map(str::to_string)
}
