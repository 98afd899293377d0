// [tests/mirror/apps/orchestrator/services/reconciler.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL RECONCILIADOR (V4.4 - IDEMPOTENT APPLY)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: FALLOS DE ETAPA, DUPLICADOS, CANCELACIÓN Y ORDEN
 *
 * # Mathematical Proof (Ordering Under Duplication):
 * Para toda secuencia finita de señales de una etapa, cualquier
 * permutación con duplicados que preserve el primer 'completed'
 * produce el mismo estado final persistido.
 * =================================================================
 */

use serde_json::json;
use std::sync::Arc;
use vapter_domain_models::scan::USER_CANCELLED_MESSAGE;
use vapter_domain_models::{Scan, ScanStatus, StageModule, StagePhase, StatusEvent};
use vapter_infra_broker::fakes::CapturingQueuePublisher;
use vapter_infra_broker::{QueuePublisher, QueueTopology};
use vapter_infra_db::repositories::customer::NewCustomer;
use vapter_infra_db::repositories::scan_type::NewScanType;
use vapter_infra_db::repositories::target::NewTarget;
use vapter_infra_db::LedgerClient;
use vapter_orchestrator::services::dispatcher;
use vapter_orchestrator::services::reconciler::{reconcile_status_event, ReconcileOutcome};
use vapter_orchestrator::state::AppState;

async fn ignite_proving_grounds(memory_anchor: &str) -> (AppState, Arc<CapturingQueuePublisher>) {
    let database_client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_anchor),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let capturing_publisher = Arc::new(CapturingQueuePublisher::new());
    let application_state = AppState::new(
        database_client,
        capturing_publisher.clone() as Arc<dyn QueuePublisher>,
        QueueTopology::default(),
    );
    (application_state, capturing_publisher)
}

/// Forja y arranca un escaneo con receta [fingerprint, vuln_engine].
async fn provision_started_scan(application_state: &AppState) -> Scan {
    let customer = application_state
        .customer_repository
        .create(NewCustomer {
            name: "Reconciler Grounds".into(),
            company_name: None,
            email: "reconciler@example.com".into(),
            phone: None,
            contact_person: None,
            address: None,
            notes: None,
        })
        .await
        .expect("GENESIS_FAULT: customer");

    let target = application_state
        .target_repository
        .create(NewTarget {
            customer_id: customer.id,
            name: "perimeter-beta".into(),
            address: "198.51.100.7".into(),
            description: None,
        })
        .await
        .expect("GENESIS_FAULT: target");

    let scan_type = application_state
        .scan_type_repository
        .create(NewScanType {
            name: "finger-engine".into(),
            only_discovery: false,
            consider_alive: true,
            be_quiet: false,
            port_list_id: None,
            plugin_fingerprint: true,
            plugin_vuln_engine: true,
            plugin_web: false,
            plugin_vuln_lookup: false,
            description: None,
        })
        .await
        .expect("GENESIS_FAULT: scan type");

    let forged_scan = application_state
        .scan_repository
        .create(&target.id, &scan_type.id)
        .await
        .expect("GENESIS_FAULT: scan");

    dispatcher::start_scan(application_state, &forged_scan)
        .await
        .expect("DISPATCH_FAULT: ignition")
}

fn event(scan: &Scan, module: StageModule, phase: StagePhase) -> StatusEvent {
    StatusEvent::new(&scan.id, module, phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * ESCENARIO: Fallo del descubridor. El escaneo sella 'Failed' con
     * el detalle forense, cronometría terminal y cero órdenes de
     * fingerprint.
     */
    #[tokio::test]
    async fn certify_stage_failure_halts_pipeline() {
        println!("\n💀 [INICIO]: Escenario de fallo de descubrimiento...");

        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_reconcile_failure_v44").await;
        let started_scan = provision_started_scan(&application_state).await;

        let failure_event = event(&started_scan, StageModule::Nmap, StagePhase::Failed)
            .with_error_details("timeout");
        assert_eq!(
            reconcile_status_event(&application_state, failure_event).await,
            ReconcileOutcome::Applied
        );

        let sealed_scan = application_state.scan_repository.fetch(&started_scan.id).await.unwrap();
        assert_eq!(sealed_scan.status, ScanStatus::Failed);
        assert!(sealed_scan.error_message.as_deref().unwrap_or_default().contains("timeout"));
        assert!(sealed_scan.completed_at.is_some(), "INVARIANT_BREACH: Failed requires completed_at");

        assert!(
            capturing_publisher.messages_for("fingerprint_scan_requests").is_empty(),
            "HALT_BREACH: fingerprint order published after failure"
        );
    }

    /**
     * ESCENARIO: 'completed' duplicado de fingerprint. Exactamente una
     * transición, exactamente una orden de vuln_engine, sin excepción.
     */
    #[tokio::test]
    async fn certify_duplicate_completed_applied_once() {
        println!("\n🧬 [INICIO]: Escenario de 'completed' duplicado...");

        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_reconcile_duplicate_v44").await;
        let started_scan = provision_started_scan(&application_state).await;

        // Marcha hasta 'Finger Scan Running' con artefactos sellados.
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Nmap, StagePhase::Running)).await;
        application_state
            .scan_repository
            .set_parsed_results(&started_scan.id, StageModule::Nmap, &json!({"hosts": []}))
            .await
            .unwrap();
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Nmap, StagePhase::Completed)).await;
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Fingerprint, StagePhase::Running)).await;
        application_state
            .scan_repository
            .set_parsed_results(&started_scan.id, StageModule::Fingerprint, &json!({"fingerprints": []}))
            .await
            .unwrap();

        // Entrega duplicada del mismo veredicto terminal de etapa.
        let first_outcome = reconcile_status_event(
            &application_state,
            event(&started_scan, StageModule::Fingerprint, StagePhase::Completed),
        )
        .await;
        let second_outcome = reconcile_status_event(
            &application_state,
            event(&started_scan, StageModule::Fingerprint, StagePhase::Completed),
        )
        .await;

        // Ambas entregas se confirman; solo la primera tuvo efecto.
        assert_eq!(first_outcome, ReconcileOutcome::Applied);
        assert_eq!(second_outcome, ReconcileOutcome::Applied);

        let current_scan = application_state.scan_repository.fetch(&started_scan.id).await.unwrap();
        assert_eq!(current_scan.status, ScanStatus::VulnEngineRunning);

        assert_eq!(
            capturing_publisher.messages_for("vuln_engine_scan_requests").len(),
            1,
            "IDEMPOTENCE_BREACH: duplicate completion dispatched twice"
        );
    }

    /**
     * ESCENARIO: Cancelación en pleno vuelo. El 'completed' tardío del
     * worker se aplica como no-op sobre el terminal.
     */
    #[tokio::test]
    async fn certify_cancel_absorbs_late_completion() {
        println!("\n🛑 [INICIO]: Escenario de cancelación consultiva...");

        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_reconcile_cancel_v44").await;
        let started_scan = provision_started_scan(&application_state).await;

        // Marcha hasta 'Finger Scan Running'.
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Nmap, StagePhase::Running)).await;
        application_state
            .scan_repository
            .set_parsed_results(&started_scan.id, StageModule::Nmap, &json!({"hosts": []}))
            .await
            .unwrap();
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Nmap, StagePhase::Completed)).await;
        reconcile_status_event(&application_state, event(&started_scan, StageModule::Fingerprint, StagePhase::Running)).await;

        // Mando de usuario: cancelación inmediata.
        application_state
            .scan_repository
            .mark_failed(&started_scan.id, USER_CANCELLED_MESSAGE)
            .await
            .unwrap();

        let cancelled_scan = application_state.scan_repository.fetch(&started_scan.id).await.unwrap();
        assert_eq!(cancelled_scan.status, ScanStatus::Failed);
        assert_eq!(cancelled_scan.error_message.as_deref(), Some(USER_CANCELLED_MESSAGE));

        // Señal tardía del worker en vuelo: absorbida sin efecto.
        let late_outcome = reconcile_status_event(
            &application_state,
            event(&started_scan, StageModule::Fingerprint, StagePhase::Completed),
        )
        .await;
        assert_eq!(late_outcome, ReconcileOutcome::Applied);

        let final_scan = application_state.scan_repository.fetch(&started_scan.id).await.unwrap();
        assert_eq!(final_scan.status, ScanStatus::Failed);
        assert_eq!(final_scan.error_message.as_deref(), Some(USER_CANCELLED_MESSAGE));
        assert!(
            capturing_publisher.messages_for("vuln_engine_scan_requests").is_empty(),
            "CANCEL_BREACH: dispatch after terminal state"
        );
    }

    /**
     * ESCENARIO: Permutación con duplicados que preserva el primer
     * 'completed': el estado final es idéntico al del orden canónico.
     */
    #[tokio::test]
    async fn certify_ordering_under_duplication() {
        let (application_state, _capturing_publisher) =
            ignite_proving_grounds("mem_reconcile_ordering_v44").await;
        let started_scan = provision_started_scan(&application_state).await;

        application_state
            .scan_repository
            .set_parsed_results(&started_scan.id, StageModule::Nmap, &json!({"hosts": []}))
            .await
            .unwrap();

        // Permutación adversa: running duplicado, completed, running
        // tardío, received fuera de lugar, completed duplicado.
        let adverse_sequence = [
            event(&started_scan, StageModule::Nmap, StagePhase::Running),
            event(&started_scan, StageModule::Nmap, StagePhase::Running),
            event(&started_scan, StageModule::Nmap, StagePhase::Completed),
            event(&started_scan, StageModule::Nmap, StagePhase::Running),
            event(&started_scan, StageModule::Nmap, StagePhase::Received),
            event(&started_scan, StageModule::Nmap, StagePhase::Completed),
        ];

        for adverse_event in adverse_sequence {
            let outcome = reconcile_status_event(&application_state, adverse_event).await;
            assert_eq!(outcome, ReconcileOutcome::Applied, "ORDERING_FAULT: event rejected");
        }

        // El primer 'completed' dictó el avance: Finger Scan Running.
        let final_scan = application_state.scan_repository.fetch(&started_scan.id).await.unwrap();
        assert_eq!(final_scan.status, ScanStatus::FingerScanRunning);
    }

    /// Escaneo inexistente: descarte sin re-encolado.
    #[tokio::test]
    async fn certify_unknown_scan_discarded() {
        let (application_state, _capturing_publisher) =
            ignite_proving_grounds("mem_reconcile_unknown_v44").await;

        let ghost_event = StatusEvent::new("ghost-scan", StageModule::Nmap, StagePhase::Completed);
        assert_eq!(
            reconcile_status_event(&application_state, ghost_event).await,
            ReconcileOutcome::Discarded
        );
    }
}
