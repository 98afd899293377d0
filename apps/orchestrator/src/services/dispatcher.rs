// [apps/orchestrator/src/services/dispatcher.rs]
/*!
 * =================================================================
 * APARATO: STAGE DISPATCHER (V4.6 - RECIPE HONOURING)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: SELECCIÓN Y ENCOLADO DE LA SIGUIENTE ETAPA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CANONICAL ORDER: La lista de plugins restantes se computa sobre
 *    [fingerprint, vuln_engine, web, vuln_lookup], reteniendo los
 *    habilitados con artefacto vacío posteriores a la etapa sellada.
 * 2. REPORT PHASE: Agotados los plugins, la fase de reporte se despacha
 *    únicamente si la receta habilitó al menos un plugin; su fallo es
 *    no fatal.
 * 3. CRASH WINDOW: Publicar la orden y escribir el estado no es atómico;
 *    los workers toleran recibir una etapa cuyo escaneo ya figura en
 *    '<etapa> Running' o posterior.
 *
 * # Mathematical Proof (Recipe Honouring):
 * Las etapas ejecutadas de un escaneo son exactamente el subconjunto
 * ordenado de plugins habilitados, precedidas por el descubrimiento y
 * opcionalmente seguidas por el reporte: cada despacho exige posición
 * estrictamente posterior y artefacto vacío, de modo que ninguna etapa
 * se repite ni se ejecuta fuera de orden.
 * =================================================================
 */

use crate::services::OrchestrationError;
use crate::state::AppState;
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use vapter_domain_models::{
    pipeline::CANONICAL_PLUGIN_ORDER, Scan, ScanStatus, StageModule, StageRequest,
};
use vapter_infra_db::DbError;

/**
 * Arranque de un escaneo recién forjado (o reiniciado): CAS
 * 'Pending -> Queued', materialización del detalle y encolado del
 * descubrimiento.
 *
 * # Errors:
 * - `OrchestrationError::Ledger(DbError::StaleTransition)`: el escaneo
 *   no estaba en 'Pending' (arranque concurrente).
 * - `OrchestrationError::Broker`: encolado fallido; el escaneo queda
 *   sellado en 'Failed' antes de propagar.
 */
#[instrument(skip(app_state, scan), fields(scan_id = %scan.id))]
pub async fn start_scan(app_state: &AppState, scan: &Scan) -> Result<Scan, OrchestrationError> {
    app_state.scan_detail_repository.get_or_create(&scan.id).await?;
    app_state.scan_repository.mark_queued(&scan.id).await?;

    let target = app_state.target_repository.fetch(&scan.target_id).await?;

    let discovery_request = StageRequest {
        scan_id: scan.id.clone(),
        target_id: target.id.clone(),
        target_host: target.address.clone(),
        scan_type_id: Some(scan.scan_type_id.clone()),
        plugin: StageModule::Nmap,
        timestamp: Utc::now(),
    };

    let request_payload = serde_json::to_value(&discovery_request)
        .map_err(|serialization_fault| OrchestrationError::Artifact(serialization_fault.to_string()))?;

    let discovery_queue = app_state.queue_topology.request_queue_for(StageModule::Nmap).to_string();

    if let Err(publish_fault) = app_state
        .queue_publisher
        .publish_json(&discovery_queue, &request_payload)
        .await
    {
        error!("💀 [DISPATCHER]: Discovery enqueue collapsed for [{}]: {}", scan.id, publish_fault);
        app_state
            .scan_repository
            .mark_failed(&scan.id, "Failed to enqueue scan on message broker")
            .await?;
        return Err(publish_fault.into());
    }

    info!("🚀 [DISPATCHER]: Scan [{}] queued for discovery on [{}].", scan.id, discovery_queue);
    Ok(app_state.scan_repository.fetch(&scan.id).await?)
}

/**
 * Selección de la siguiente etapa tras un '<etapa> Completed'.
 *
 * El algoritmo del §despacho: cargar escaneo + receta, computar la
 * lista ordenada de plugins restantes, avanzar o sellar.
 */
#[instrument(skip(app_state))]
pub async fn dispatch_after_completion(
    app_state: &AppState,
    scan_identifier: &str,
    completed_module: StageModule,
) -> Result<(), OrchestrationError> {
    let scan = app_state.scan_repository.fetch(scan_identifier).await?;

    // Guardia de cancelación: un escaneo terminal jamás re-despacha.
    if scan.is_terminal() {
        warn!("🕸️  [DISPATCHER]: Scan [{}] already terminal; dispatch suppressed.", scan_identifier);
        return Ok(());
    }

    let scan_type = app_state.scan_type_repository.fetch(&scan.scan_type_id).await?;
    let completed_status = ScanStatus::completed_for(completed_module);

    let remaining_plugins: Vec<StageModule> = CANONICAL_PLUGIN_ORDER
        .iter()
        .copied()
        .filter(|plugin_module| {
            scan_type.is_plugin_enabled(*plugin_module)
                && scan.parsed_results_for(*plugin_module).is_none()
                && plugin_module.pipeline_position() > completed_module.pipeline_position()
        })
        .collect();

    if let Some(next_plugin) = remaining_plugins.first().copied() {
        return dispatch_plugin_stage(app_state, &scan, completed_status, next_plugin).await;
    }

    if scan_type.any_plugin_enabled() {
        return dispatch_report_stage(app_state, &scan, completed_status).await;
    }

    // Receta sin plugins (descubrimiento puro): sellado directo.
    match app_state.scan_repository.mark_completed(&scan.id, completed_status).await {
        Ok(()) => Ok(()),
        Err(DbError::StaleTransition) => {
            warn!("🕸️  [DISPATCHER]: Completion race lost for [{}]; no-op.", scan.id);
            Ok(())
        }
        Err(ledger_fault) => Err(ledger_fault.into()),
    }
}

async fn dispatch_plugin_stage(
    app_state: &AppState,
    scan: &Scan,
    expected_status: ScanStatus,
    next_plugin: StageModule,
) -> Result<(), OrchestrationError> {
    match app_state
        .scan_repository
        .compare_and_set_status(&scan.id, expected_status, ScanStatus::running_for(next_plugin))
        .await
    {
        Ok(()) => {}
        Err(DbError::StaleTransition) => {
            // Despacho duplicado: otro reconciliador ya avanzó la etapa.
            warn!("🕸️  [DISPATCHER]: Stage race lost for [{}]; no-op.", scan.id);
            return Ok(());
        }
        Err(ledger_fault) => return Err(ledger_fault.into()),
    }

    let target = app_state.target_repository.fetch(&scan.target_id).await?;

    let stage_request = StageRequest {
        scan_id: scan.id.clone(),
        target_id: target.id.clone(),
        target_host: target.address.clone(),
        scan_type_id: Some(scan.scan_type_id.clone()),
        plugin: next_plugin,
        timestamp: Utc::now(),
    };

    let request_payload = serde_json::to_value(&stage_request)
        .map_err(|serialization_fault| OrchestrationError::Artifact(serialization_fault.to_string()))?;

    let stage_queue = app_state.queue_topology.request_queue_for(next_plugin).to_string();

    if let Err(publish_fault) = app_state
        .queue_publisher
        .publish_json(&stage_queue, &request_payload)
        .await
    {
        error!("💀 [DISPATCHER]: {} enqueue collapsed for [{}]: {}", next_plugin, scan.id, publish_fault);
        app_state
            .scan_repository
            .mark_failed(&scan.id, &format!("Failed to start {} stage", next_plugin))
            .await?;
        return Err(publish_fault.into());
    }

    info!("➡️  [DISPATCHER]: Scan [{}] advanced to stage [{}].", scan.id, next_plugin);
    Ok(())
}

async fn dispatch_report_stage(
    app_state: &AppState,
    scan: &Scan,
    expected_status: ScanStatus,
) -> Result<(), OrchestrationError> {
    match app_state
        .scan_repository
        .compare_and_set_status(&scan.id, expected_status, ScanStatus::ReportGenerationRunning)
        .await
    {
        Ok(()) => {}
        Err(DbError::StaleTransition) => {
            warn!("🕸️  [DISPATCHER]: Report race lost for [{}]; no-op.", scan.id);
            return Ok(());
        }
        Err(ledger_fault) => return Err(ledger_fault.into()),
    }

    let target = app_state.target_repository.fetch(&scan.target_id).await?;

    let report_request = StageRequest {
        scan_id: scan.id.clone(),
        target_id: target.id.clone(),
        target_host: target.address.clone(),
        scan_type_id: Some(scan.scan_type_id.clone()),
        plugin: StageModule::Report,
        timestamp: Utc::now(),
    };

    let request_payload = serde_json::to_value(&report_request)
        .map_err(|serialization_fault| OrchestrationError::Artifact(serialization_fault.to_string()))?;

    let report_queue = app_state.queue_topology.request_queue_for(StageModule::Report).to_string();

    if let Err(publish_fault) = app_state
        .queue_publisher
        .publish_json(&report_queue, &request_payload)
        .await
    {
        // Fallo de reporte: no fatal. El escaneo completó sus etapas.
        warn!("⚠️ [DISPATCHER]: Report enqueue failed for [{}] ({}); sealing Completed.", scan.id, publish_fault);
        match app_state
            .scan_repository
            .mark_completed(&scan.id, ScanStatus::ReportGenerationRunning)
            .await
        {
            Ok(()) | Err(DbError::StaleTransition) => return Ok(()),
            Err(ledger_fault) => return Err(ledger_fault.into()),
        }
    }

    info!("📄 [DISPATCHER]: Scan [{}] advanced to report assembly.", scan.id);
    Ok(())
}
