// [apps/orchestrator/src/services/state_machine.rs]
/*!
 * =================================================================
 * APARATO: SCAN STATE MACHINE (V4.5 - TABLE DRIVEN)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: PLANIFICACIÓN PURA DE TRANSICIONES DE ESTADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LITERAL TABLE: La máquina es una tabla literal
 *    (módulo, fase) -> estado objetivo; no hay ramificación por módulo
 *    dispersa en el código.
 * 2. PURE PLANNING: Este aparato no toca el Ledger; produce un plan que
 *    el reconciliador aplica vía compare-and-set.
 * 3. ABSORBING TERMINALS: Todo plan sobre un escaneo terminal degrada a
 *    'Ignore'; el reporte fallido tras completar etapas sella
 *    'Completed' (fallo no fatal).
 *
 * # Mathematical Proof (No Regression):
 * Para toda señal s y estado c no terminal, el plan emitido satisface
 * rank(objetivo) > rank(c) o es 'Ignore'. Combinado con el predicado
 * CAS del repositorio, ninguna intercalación de señales duplicadas o
 * desordenadas puede reducir el rango persistido.
 * =================================================================
 */

use vapter_domain_models::{ScanStatus, StageModule, StagePhase, StatusSignal};

/// Tabla literal de transición: (módulo, fase) -> estado objetivo.
/// La finalización del reporte sella el escaneo completo.
pub const TRANSITION_TABLE: &[(StageModule, StagePhase, ScanStatus)] = &[
    (StageModule::Nmap, StagePhase::Running, ScanStatus::NmapScanRunning),
    (StageModule::Nmap, StagePhase::Completed, ScanStatus::NmapScanCompleted),
    (StageModule::Fingerprint, StagePhase::Running, ScanStatus::FingerScanRunning),
    (StageModule::Fingerprint, StagePhase::Completed, ScanStatus::FingerScanCompleted),
    (StageModule::VulnEngine, StagePhase::Running, ScanStatus::VulnEngineRunning),
    (StageModule::VulnEngine, StagePhase::Completed, ScanStatus::VulnEngineCompleted),
    (StageModule::Web, StagePhase::Running, ScanStatus::WebScanRunning),
    (StageModule::Web, StagePhase::Completed, ScanStatus::WebScanCompleted),
    (StageModule::VulnLookup, StagePhase::Running, ScanStatus::VulnLookupRunning),
    (StageModule::VulnLookup, StagePhase::Completed, ScanStatus::VulnLookupCompleted),
    (StageModule::Report, StagePhase::Running, ScanStatus::ReportGenerationRunning),
    (StageModule::Report, StagePhase::Completed, ScanStatus::Completed),
];

/// Acciones de seguimiento que el reconciliador ejecuta tras el CAS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowupAction {
    /// Sellar el arranque de etapa en la cronometría del detalle.
    StampStageStarted(StageModule),
    /// Sellar la finalización de etapa en la cronometría del detalle.
    StampStageCompleted(StageModule),
    /// Invocar al despachador para seleccionar la siguiente etapa.
    DispatchAfterCompletion(StageModule),
}

/// Plan de transición emitido por la máquina pura.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Avance CAS 'expected -> next' con acciones de seguimiento.
    Advance {
        expected: ScanStatus,
        next: ScanStatus,
        followups: Vec<FollowupAction>,
    },
    /// Transición terminal a 'Failed' con mensaje de error.
    SealFailure { error_message: String },
    /// Sellado a 'Completed' (finalización del reporte, o su fallo
    /// no fatal tras el camino de etapas completadas).
    SealCompletion {
        expected: ScanStatus,
        report_error: Option<String>,
    },
    /// Señal absorbida sin efecto (idempotencia / anti-regresión).
    Ignore { reason: &'static str },
}

/// Estado objetivo tabulado para una pareja (módulo, fase).
fn tabulated_target(stage_module: StageModule, stage_phase: StagePhase) -> Option<ScanStatus> {
    TRANSITION_TABLE
        .iter()
        .find(|(module, phase, _)| *module == stage_module && *phase == stage_phase)
        .map(|(_, _, target)| *target)
}

/**
 * Planifica la transición para una señal sobre el estado actual.
 * Función pura: toda decisión de concurrencia queda en el predicado
 * CAS que el reconciliador aplica después.
 */
pub fn plan_transition(current_status: ScanStatus, signal: &StatusSignal) -> TransitionPlan {
    // Los estados terminales absorben toda señal tardía.
    if current_status.is_terminal() {
        return TransitionPlan::Ignore { reason: "terminal state absorbs late signal" };
    }

    match signal {
        StatusSignal::StageReceived { .. } | StatusSignal::StageParsing { .. } => {
            TransitionPlan::Ignore { reason: "informational phase" }
        }

        StatusSignal::StageRunning { module, .. } => {
            let Some(target_status) = tabulated_target(*module, StagePhase::Running) else {
                return TransitionPlan::Ignore { reason: "untabulated transition" };
            };

            if target_status == current_status {
                return TransitionPlan::Ignore { reason: "already in target state" };
            }
            if target_status.rank() < current_status.rank() {
                return TransitionPlan::Ignore { reason: "stale running signal" };
            }

            TransitionPlan::Advance {
                expected: current_status,
                next: target_status,
                followups: vec![FollowupAction::StampStageStarted(*module)],
            }
        }

        StatusSignal::StageCompleted { module, .. } => {
            if *module == StageModule::Report {
                return TransitionPlan::SealCompletion {
                    expected: current_status,
                    report_error: None,
                };
            }

            let Some(target_status) = tabulated_target(*module, StagePhase::Completed) else {
                return TransitionPlan::Ignore { reason: "untabulated transition" };
            };

            if target_status.rank() <= current_status.rank() {
                return TransitionPlan::Ignore { reason: "duplicate or stale completion" };
            }

            TransitionPlan::Advance {
                expected: current_status,
                next: target_status,
                followups: vec![
                    FollowupAction::StampStageCompleted(*module),
                    FollowupAction::DispatchAfterCompletion(*module),
                ],
            }
        }

        StatusSignal::StageFailed { module, error_details } => {
            if *module == StageModule::Report {
                // Un reporte fallido jamás derriba un escaneo que llegó
                // a la fase de reporte por el camino de etapas completas.
                if current_status == ScanStatus::ReportGenerationRunning {
                    return TransitionPlan::SealCompletion {
                        expected: current_status,
                        report_error: Some(error_details.clone()),
                    };
                }
                return TransitionPlan::Ignore { reason: "report failure outside report phase" };
            }

            TransitionPlan::SealFailure { error_message: error_details.clone() }
        }
    }
}
