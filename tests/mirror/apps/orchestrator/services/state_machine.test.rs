// [tests/mirror/apps/orchestrator/services/state_machine.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA MÁQUINA DE ESTADOS (V4.3 - PURE CORE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE MONOTONICIDAD Y ABSORCIÓN TERMINAL
 *
 * # Mathematical Proof (Plan Soundness):
 * Para todo estado c y señal s: el plan es 'Ignore' o satisface
 * rank(objetivo) > rank(c); los terminales solo emiten 'Ignore'.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_domain_models::{ScanStatus, StageModule, StatusSignal};
    use vapter_orchestrator::services::state_machine::{
        plan_transition, TransitionPlan, TRANSITION_TABLE,
    };

    const EVERY_STATUS: [ScanStatus; 15] = [
        ScanStatus::Pending,
        ScanStatus::Queued,
        ScanStatus::NmapScanRunning,
        ScanStatus::NmapScanCompleted,
        ScanStatus::FingerScanRunning,
        ScanStatus::FingerScanCompleted,
        ScanStatus::VulnEngineRunning,
        ScanStatus::VulnEngineCompleted,
        ScanStatus::WebScanRunning,
        ScanStatus::WebScanCompleted,
        ScanStatus::VulnLookupRunning,
        ScanStatus::VulnLookupCompleted,
        ScanStatus::ReportGenerationRunning,
        ScanStatus::Completed,
        ScanStatus::Failed,
    ];

    const EVERY_MODULE: [StageModule; 6] = [
        StageModule::Nmap,
        StageModule::Fingerprint,
        StageModule::VulnEngine,
        StageModule::Web,
        StageModule::VulnLookup,
        StageModule::Report,
    ];

    #[test]
    fn certify_table_is_complete() {
        // Seis módulos, dos fases tabuladas por módulo.
        assert_eq!(TRANSITION_TABLE.len(), 12, "TABLE_FAULT: transition table drifted");
    }

    /**
     * CERTIFICACIÓN: Ningún plan reduce el rango persistible.
     */
    #[test]
    fn certify_no_plan_regresses_rank() {
        println!("\n🧪 [PROVING_GROUNDS]: Sweeping the full (status x signal) lattice...");

        for current_status in EVERY_STATUS {
            for stage_module in EVERY_MODULE {
                let probe_signals = [
                    StatusSignal::StageReceived { module: stage_module },
                    StatusSignal::StageRunning { module: stage_module, progress: Some(50) },
                    StatusSignal::StageParsing { module: stage_module },
                    StatusSignal::StageCompleted { module: stage_module, message: None },
                    StatusSignal::StageFailed {
                        module: stage_module,
                        error_details: "probe".into(),
                    },
                ];

                for signal in probe_signals {
                    let plan = plan_transition(current_status, &signal);

                    if current_status.is_terminal() {
                        assert!(
                            matches!(plan, TransitionPlan::Ignore { .. }),
                            "ABSORPTION_BREACH: terminal {} emitted {:?} for {:?}",
                            current_status, plan, signal
                        );
                        continue;
                    }

                    if let TransitionPlan::Advance { expected, next, .. } = &plan {
                        assert_eq!(*expected, current_status, "PLAN_FAULT: CAS anchor drift");
                        assert!(
                            next.rank() > current_status.rank(),
                            "MONOTONICITY_BREACH: {} -> {} planned for {:?}",
                            current_status, next, signal
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn certify_duplicate_completion_ignored() {
        // Estado ya en 'Finger Scan Completed': el duplicado se absorbe.
        let duplicate_plan = plan_transition(
            ScanStatus::FingerScanCompleted,
            &StatusSignal::StageCompleted { module: StageModule::Fingerprint, message: None },
        );
        assert!(matches!(duplicate_plan, TransitionPlan::Ignore { .. }));

        // Estado ya avanzado más allá: también absorbido.
        let stale_plan = plan_transition(
            ScanStatus::VulnEngineRunning,
            &StatusSignal::StageCompleted { module: StageModule::Fingerprint, message: None },
        );
        assert!(matches!(stale_plan, TransitionPlan::Ignore { .. }));
    }

    #[test]
    fn certify_late_running_never_regresses() {
        let late_running_plan = plan_transition(
            ScanStatus::VulnEngineCompleted,
            &StatusSignal::StageRunning { module: StageModule::Fingerprint, progress: None },
        );
        assert!(matches!(late_running_plan, TransitionPlan::Ignore { .. }));
    }

    #[test]
    fn certify_stage_failure_seals_failed() {
        let failure_plan = plan_transition(
            ScanStatus::NmapScanRunning,
            &StatusSignal::StageFailed { module: StageModule::Nmap, error_details: "timeout".into() },
        );
        assert!(matches!(failure_plan, TransitionPlan::SealFailure { ref error_message } if error_message == "timeout"));
    }

    /**
     * CERTIFICACIÓN: El reporte fallido tras etapas completas sella
     * 'Completed' (fallo no fatal) y jamás deriva en 'Failed'.
     */
    #[test]
    fn certify_report_failure_non_fatal() {
        let report_failure_plan = plan_transition(
            ScanStatus::ReportGenerationRunning,
            &StatusSignal::StageFailed { module: StageModule::Report, error_details: "renderer down".into() },
        );
        assert!(matches!(
            report_failure_plan,
            TransitionPlan::SealCompletion { expected: ScanStatus::ReportGenerationRunning, report_error: Some(_) }
        ));

        // Fuera de la fase de reporte, un fallo de reporte es ruido.
        let misplaced_report_failure = plan_transition(
            ScanStatus::FingerScanRunning,
            &StatusSignal::StageFailed { module: StageModule::Report, error_details: "noise".into() },
        );
        assert!(matches!(misplaced_report_failure, TransitionPlan::Ignore { .. }));
    }

    #[test]
    fn certify_informational_phases_inert() {
        for phase_signal in [
            StatusSignal::StageReceived { module: StageModule::Web },
            StatusSignal::StageParsing { module: StageModule::Web },
        ] {
            let plan = plan_transition(ScanStatus::WebScanRunning, &phase_signal);
            assert!(matches!(plan, TransitionPlan::Ignore { .. }));
        }
    }
}
