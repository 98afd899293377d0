// [apps/stage-worker/src/stages/report.rs]
/*!
 * =================================================================
 * APARATO: REPORT ASSEMBLY EXECUTOR (V4.1 - NON-FATAL TAIL)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: ENSAMBLADO DEL ARTEFACTO FINAL DE EVALUACIÓN
 *
 * El fallo de esta etapa es no fatal para el escaneo: el reconciliador
 * sella 'Completed' y registra el error del reporte.
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument};
use vapter_domain_models::{StageModule, StagePhase};

pub struct ReportExecutor;

#[async_trait]
impl StageExecutor for ReportExecutor {
    fn module(&self) -> StageModule {
        StageModule::Report
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        settings.report_timeout
    }

    #[instrument(skip(self, context), fields(scan_id = %context.request.scan_id))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        let scan = context.gateway.fetch_scan(&context.request.scan_id).await?;
        let sealed_fingerprints = context
            .gateway
            .fetch_fingerprints_by_scan(&context.request.scan_id)
            .await
            .unwrap_or_default();

        let _ = context
            .status_emitter
            .emit_phase(&context.request.scan_id, StagePhase::Parsing)
            .await;

        let report_document = json!({
            "generated_at": Utc::now(),
            "scan": {
                "id": scan.id,
                "target_id": scan.target_id,
                "scan_type_id": scan.scan_type_id,
                "initiated_at": scan.initiated_at,
                "started_at": scan.started_at,
            },
            "discovery": scan.parsed_nmap_results,
            "fingerprint_summary": scan.parsed_fingerprint_results,
            "vuln_engine_summary": scan.parsed_vuln_engine_results,
            "web_summary": scan.parsed_web_results,
            "vuln_lookup_summary": scan.parsed_vuln_lookup_results,
            "fingerprints": sealed_fingerprints,
        });

        // Artefacto local del worker; solo la ruta viaja al núcleo.
        tokio::fs::create_dir_all(&context.settings.temp_results_dir)
            .await
            .map_err(|io_fault| StageFailure::Transient(format!("scratch dir fault: {}", io_fault)))?;

        let report_path = context
            .settings
            .temp_results_dir
            .join(format!("report_{}.json", context.request.scan_id));

        let serialized_report = serde_json::to_vec_pretty(&report_document)
            .map_err(|serialization_fault| StageFailure::Permanent(serialization_fault.to_string()))?;

        tokio::fs::write(&report_path, serialized_report)
            .await
            .map_err(|io_fault| StageFailure::Transient(format!("report write fault: {}", io_fault)))?;

        context
            .gateway
            .patch_report_path(&context.request.scan_id, &report_path.to_string_lossy())
            .await?;

        info!("📄 [REPORT]: Assembly sealed at [{}].", report_path.display());
        Ok(())
    }
}
