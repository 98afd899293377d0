// [apps/stage-worker/src/stages/vuln_lookup.rs]
/*!
 * =================================================================
 * APARATO: VULN LOOKUP EXECUTOR (V4.1 - SERVICE CORRELATION)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CORRELACIÓN DE HUELLAS CON TÉRMINOS DE BÚSQUEDA CVE
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument};
use vapter_domain_models::{StageModule, StagePhase};

pub struct VulnLookupExecutor;

#[async_trait]
impl StageExecutor for VulnLookupExecutor {
    fn module(&self) -> StageModule {
        StageModule::VulnLookup
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        settings.vuln_lookup_timeout
    }

    #[instrument(skip(self, context), fields(target = %context.request.target_host))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        // Insumo: huellas selladas por la etapa de fingerprint.
        let sealed_fingerprints = context
            .gateway
            .fetch_fingerprints_by_scan(&context.request.scan_id)
            .await?;

        let _ = context
            .status_emitter
            .emit_phase(&context.request.scan_id, StagePhase::Parsing)
            .await;

        let lookup_entries: Vec<Value> = sealed_fingerprints
            .iter()
            .filter(|fingerprint| fingerprint.service_name.is_some())
            .map(|fingerprint| {
                // Término de búsqueda CPE-like: producto + versión.
                let query_terms: Vec<&str> = [
                    fingerprint.service_product.as_deref(),
                    fingerprint.service_version.as_deref(),
                    fingerprint.service_name.as_deref(),
                ]
                .into_iter()
                .flatten()
                .collect();

                json!({
                    "port": fingerprint.port,
                    "protocol": fingerprint.protocol,
                    "service": fingerprint.service_name,
                    "product": fingerprint.service_product,
                    "version": fingerprint.service_version,
                    "confidence": fingerprint.confidence_score,
                    "lookup_query": query_terms.join(" "),
                })
            })
            .collect();

        let stage_artifact = json!({
            "total_fingerprints": sealed_fingerprints.len(),
            "lookup_candidates": lookup_entries.len(),
            "entries": lookup_entries,
        });

        context
            .gateway
            .upload_parsed_results(&context.request.scan_id, StageModule::VulnLookup, &stage_artifact)
            .await?;

        info!(
            "📤 [VULN_LOOKUP]: {} lookup candidates sealed for scan [{}].",
            stage_artifact["lookup_candidates"], context.request.scan_id
        );
        Ok(())
    }
}
