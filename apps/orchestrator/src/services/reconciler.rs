// [apps/orchestrator/src/services/reconciler.rs]
/*!
 * =================================================================
 * APARATO: STATUS RECONCILER (V4.5 - IDEMPOTENT APPLY)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: APLICACIÓN DEL PLAN DE TRANSICIÓN CON DISCIPLINA ACK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IDEMPOTENT APPLY: Un CAS perdido o un escaneo terminal degradan a
 *    confirmación silenciosa; aplicar dos veces el mismo evento produce
 *    el mismo estado que aplicarlo una vez.
 * 2. ACK TAXONOMY: Escaneo inexistente o artefacto malformado descartan
 *    sin re-encolado; fallos de infraestructura re-encolan.
 * 3. ZERO SILENT SWALLOWS: Todo camino actualiza el estado del escaneo
 *    o registra el veredicto con su identificador.
 * =================================================================
 */

use crate::services::dispatcher;
use crate::services::state_machine::{plan_transition, FollowupAction, TransitionPlan};
use crate::state::AppState;
use tracing::{debug, error, info, instrument, warn};
use vapter_domain_models::{StatusEvent, StatusSignal};
use vapter_infra_db::DbError;

/// Veredicto de la reconciliación para la disciplina ack del consumidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Evento aplicado (o absorbido idempotentemente): confirmar.
    Applied,
    /// Evento permanentemente inaplicable: descartar sin re-encolado.
    Discarded,
    /// Avería transitoria de infraestructura: re-encolar.
    RetryLater,
}

/**
 * Reconcilia un evento de estado contra el Ledger.
 *
 * Secuencia: cargar escaneo -> planificar (máquina pura) -> aplicar
 * CAS -> ejecutar acciones de seguimiento (cronometría y despacho).
 */
#[instrument(skip(app_state, status_event), fields(scan_id = %status_event.scan_id, module = %status_event.module))]
pub async fn reconcile_status_event(
    app_state: &AppState,
    status_event: StatusEvent,
) -> ReconcileOutcome {
    let scan_identifier = status_event.scan_id.clone();

    let scan = match app_state.scan_repository.fetch(&scan_identifier).await {
        Ok(scan) => scan,
        Err(DbError::NotFound(_)) => {
            error!("🚫 [RECONCILER]: Scan [{}] not found; event discarded.", scan_identifier);
            return ReconcileOutcome::Discarded;
        }
        Err(ledger_fault) => {
            error!("⚠️ [RECONCILER]: Ledger fault loading [{}]: {}", scan_identifier, ledger_fault);
            return ReconcileOutcome::RetryLater;
        }
    };

    if let StatusSignal::StageRunning { progress: Some(progress), module } =
        status_event.clone().into_signal()
    {
        debug!("📶 [RECONCILER]: Scan [{}] {} progress {}%.", scan_identifier, module, progress);
    }

    let signal = status_event.into_signal();
    let transition_plan = plan_transition(scan.status, &signal);

    match transition_plan {
        TransitionPlan::Ignore { reason } => {
            info!("🕸️  [RECONCILER]: Signal absorbed for [{}]: {}.", scan_identifier, reason);
            ReconcileOutcome::Applied
        }

        TransitionPlan::SealFailure { error_message } => {
            match app_state.scan_repository.mark_failed(&scan_identifier, &error_message).await {
                Ok(_applied) => ReconcileOutcome::Applied,
                Err(ledger_fault) => {
                    error!("⚠️ [RECONCILER]: Failure seal collapsed for [{}]: {}", scan_identifier, ledger_fault);
                    ReconcileOutcome::RetryLater
                }
            }
        }

        TransitionPlan::SealCompletion { expected, report_error } => {
            if let Some(report_fault) = report_error {
                // Veredicto no fatal: el reporte colapsó pero las etapas
                // del escaneo están completas.
                error!("📄 [RECONCILER]: Report failure for [{}] (non-fatal): {}", scan_identifier, report_fault);
            }

            match app_state.scan_repository.mark_completed(&scan_identifier, expected).await {
                Ok(()) => ReconcileOutcome::Applied,
                Err(DbError::StaleTransition) => {
                    info!("🕸️  [RECONCILER]: Completion race lost for [{}]; no-op.", scan_identifier);
                    ReconcileOutcome::Applied
                }
                Err(ledger_fault) => {
                    error!("⚠️ [RECONCILER]: Completion seal collapsed for [{}]: {}", scan_identifier, ledger_fault);
                    ReconcileOutcome::RetryLater
                }
            }
        }

        TransitionPlan::Advance { expected, next, followups } => {
            match app_state
                .scan_repository
                .compare_and_set_status(&scan_identifier, expected, next)
                .await
            {
                Ok(()) => {}
                Err(DbError::StaleTransition) => {
                    // Carrera perdida: otro escritor avanzó primero. El
                    // evento ya no es aplicable y se confirma en silencio.
                    info!("🕸️  [RECONCILER]: CAS lost for [{}] ({} -> {}); no-op.", scan_identifier, expected, next);
                    return ReconcileOutcome::Applied;
                }
                Err(ledger_fault) => {
                    error!("⚠️ [RECONCILER]: CAS collapsed for [{}]: {}", scan_identifier, ledger_fault);
                    return ReconcileOutcome::RetryLater;
                }
            }

            for followup_action in followups {
                match followup_action {
                    FollowupAction::StampStageStarted(stage_module) => {
                        if let Err(ledger_fault) = app_state
                            .scan_detail_repository
                            .stamp_stage_started(&scan_identifier, stage_module)
                            .await
                        {
                            warn!("⚠️ [RECONCILER]: Start stamp failed for [{}]: {}", scan_identifier, ledger_fault);
                        }
                    }
                    FollowupAction::StampStageCompleted(stage_module) => {
                        if let Err(ledger_fault) = app_state
                            .scan_detail_repository
                            .stamp_stage_completed(&scan_identifier, stage_module)
                            .await
                        {
                            warn!("⚠️ [RECONCILER]: Completion stamp failed for [{}]: {}", scan_identifier, ledger_fault);
                        }
                    }
                    FollowupAction::DispatchAfterCompletion(stage_module) => {
                        if let Err(orchestration_fault) =
                            dispatcher::dispatch_after_completion(app_state, &scan_identifier, stage_module)
                                .await
                        {
                            // El despacho fallido ya selló el escaneo en
                            // 'Failed'; el evento en sí queda aplicado.
                            error!("💀 [RECONCILER]: Dispatch collapsed for [{}]: {}", scan_identifier, orchestration_fault);
                        }
                    }
                }
            }

            ReconcileOutcome::Applied
        }
    }
}
