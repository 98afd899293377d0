// [tests/mirror/apps/orchestrator/services/dispatcher.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL DESPACHADOR (V4.3 - RECIPE HONOURING)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: ESCENARIOS DE DESCUBRIMIENTO PURO Y RECETA PLENA
 * =================================================================
 */

use serde_json::json;
use std::sync::Arc;
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

/// Forja el estado maestro con doble de captura e infraestructura RAM.
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

async fn provision_scan(application_state: &AppState, recipe: NewScanType) -> Scan {
    let customer = application_state
        .customer_repository
        .create(NewCustomer {
            name: "Proving Grounds".into(),
            company_name: None,
            email: "grounds@example.com".into(),
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
            name: "perimeter-alpha".into(),
            address: "192.0.2.10".into(),
            description: None,
        })
        .await
        .expect("GENESIS_FAULT: target");

    let scan_type = application_state
        .scan_type_repository
        .create(recipe)
        .await
        .expect("GENESIS_FAULT: scan type");

    application_state
        .scan_repository
        .create(&target.id, &scan_type.id)
        .await
        .expect("GENESIS_FAULT: scan")
}

fn recipe(name: &str, only_discovery: bool, plugins: [bool; 4]) -> NewScanType {
    NewScanType {
        name: name.into(),
        only_discovery,
        consider_alive: false,
        be_quiet: false,
        port_list_id: None,
        plugin_fingerprint: plugins[0],
        plugin_vuln_engine: plugins[1],
        plugin_web: plugins[2],
        plugin_vuln_lookup: plugins[3],
        description: None,
    }
}

async fn apply_event(application_state: &AppState, event: StatusEvent) {
    let outcome = reconcile_status_event(application_state, event).await;
    assert_eq!(outcome, ReconcileOutcome::Applied, "RECONCILE_FAULT: event not applied");
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * ESCENARIO: Camino feliz de descubrimiento puro.
     * Traza esperada: Pending -> Queued -> Nmap Running -> Nmap
     * Completed -> Completed, sin órdenes en colas de plugins.
     */
    #[tokio::test]
    async fn certify_discovery_only_happy_path() {
        println!("\n🛰️  [INICIO]: Escenario de descubrimiento puro...");

        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_dispatch_discovery_v43").await;
        let forged_scan =
            provision_scan(&application_state, recipe("discovery-only", true, [false; 4])).await;
        assert_eq!(forged_scan.status, ScanStatus::Pending);

        // 1. ARRANQUE: Pending -> Queued + orden de descubrimiento.
        dispatcher::start_scan(&application_state, &forged_scan)
            .await
            .expect("DISPATCH_FAULT: ignition");

        let queued_scan = application_state.scan_repository.fetch(&forged_scan.id).await.unwrap();
        assert_eq!(queued_scan.status, ScanStatus::Queued);
        assert!(queued_scan.started_at.is_some());

        let discovery_orders = capturing_publisher.messages_for("nmap_scan_requests");
        assert_eq!(discovery_orders.len(), 1);
        assert_eq!(discovery_orders[0]["scan_id"], json!(forged_scan.id));
        assert_eq!(discovery_orders[0]["plugin"], json!("nmap"));
        assert_eq!(discovery_orders[0]["target_host"], json!("192.0.2.10"));

        // 2. SEÑALES DEL WORKER: running y completed.
        apply_event(
            &application_state,
            StatusEvent::new(&forged_scan.id, StageModule::Nmap, StagePhase::Running),
        )
        .await;
        assert_eq!(
            application_state.scan_repository.fetch(&forged_scan.id).await.unwrap().status,
            ScanStatus::NmapScanRunning
        );

        apply_event(
            &application_state,
            StatusEvent::new(&forged_scan.id, StageModule::Nmap, StagePhase::Completed),
        )
        .await;

        // 3. VEREDICTO: sellado directo, sin plugins ni reporte.
        let sealed_scan = application_state.scan_repository.fetch(&forged_scan.id).await.unwrap();
        assert_eq!(sealed_scan.status, ScanStatus::Completed);
        assert!(sealed_scan.completed_at.is_some());

        for plugin_queue in [
            "fingerprint_scan_requests",
            "vuln_engine_scan_requests",
            "web_scan_requests",
            "vuln_lookup_requests",
            "report_requests",
        ] {
            assert!(
                capturing_publisher.messages_for(plugin_queue).is_empty(),
                "RECIPE_BREACH: unexpected order on [{}]",
                plugin_queue
            );
        }
    }

    /**
     * ESCENARIO: Receta plena. Cada cola de etapa recibe exactamente
     * una orden para el escaneo y la traza termina en 'Completed'.
     */
    #[tokio::test]
    async fn certify_full_recipe_pipeline() {
        println!("\n🛰️  [INICIO]: Escenario de receta plena...");

        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_dispatch_full_v43").await;
        let forged_scan =
            provision_scan(&application_state, recipe("full-stack", false, [true; 4])).await;

        dispatcher::start_scan(&application_state, &forged_scan)
            .await
            .expect("DISPATCH_FAULT: ignition");

        // Marcha completa del pipeline: cada etapa sella su artefacto
        // ANTES de su 'completed', honrando el contrato del worker.
        let pipeline_walk: [(StageModule, &str); 5] = [
            (StageModule::Nmap, "nmap_scan_requests"),
            (StageModule::Fingerprint, "fingerprint_scan_requests"),
            (StageModule::VulnEngine, "vuln_engine_scan_requests"),
            (StageModule::Web, "web_scan_requests"),
            (StageModule::VulnLookup, "vuln_lookup_requests"),
        ];

        for (stage_module, _queue_name) in pipeline_walk {
            apply_event(
                &application_state,
                StatusEvent::new(&forged_scan.id, stage_module, StagePhase::Running),
            )
            .await;

            application_state
                .scan_repository
                .set_parsed_results(&forged_scan.id, stage_module, &json!({"sealed": true}))
                .await
                .expect("ARTIFACT_FAULT");

            apply_event(
                &application_state,
                StatusEvent::new(&forged_scan.id, stage_module, StagePhase::Completed),
            )
            .await;
        }

        // Fase de reporte: running + completed del ensamblador.
        assert_eq!(
            application_state.scan_repository.fetch(&forged_scan.id).await.unwrap().status,
            ScanStatus::ReportGenerationRunning
        );
        apply_event(
            &application_state,
            StatusEvent::new(&forged_scan.id, StageModule::Report, StagePhase::Completed),
        )
        .await;

        let sealed_scan = application_state.scan_repository.fetch(&forged_scan.id).await.unwrap();
        assert_eq!(sealed_scan.status, ScanStatus::Completed);
        assert!(sealed_scan.completed_at.is_some());

        // Cada cola de etapa recibió exactamente UNA orden del escaneo.
        for queue_name in [
            "nmap_scan_requests",
            "fingerprint_scan_requests",
            "vuln_engine_scan_requests",
            "web_scan_requests",
            "vuln_lookup_requests",
            "report_requests",
        ] {
            let stage_orders = capturing_publisher.messages_for(queue_name);
            assert_eq!(stage_orders.len(), 1, "RECIPE_BREACH: [{}] order count drift", queue_name);
            assert_eq!(stage_orders[0]["scan_id"], json!(forged_scan.id));
        }
    }

    /**
     * ESCENARIO: Receta parcial [fingerprint, vuln_lookup]: las etapas
     * deshabilitadas jamás reciben órdenes y el orden canónico se honra.
     */
    #[tokio::test]
    async fn certify_partial_recipe_skips_disabled_stages() {
        let (application_state, capturing_publisher) =
            ignite_proving_grounds("mem_dispatch_partial_v43").await;
        let forged_scan = provision_scan(
            &application_state,
            recipe("finger-lookup", false, [true, false, false, true]),
        )
        .await;

        dispatcher::start_scan(&application_state, &forged_scan).await.expect("DISPATCH_FAULT");

        for stage_module in [StageModule::Nmap, StageModule::Fingerprint, StageModule::VulnLookup] {
            apply_event(
                &application_state,
                StatusEvent::new(&forged_scan.id, stage_module, StagePhase::Running),
            )
            .await;
            application_state
                .scan_repository
                .set_parsed_results(&forged_scan.id, stage_module, &json!({"sealed": true}))
                .await
                .expect("ARTIFACT_FAULT");
            apply_event(
                &application_state,
                StatusEvent::new(&forged_scan.id, stage_module, StagePhase::Completed),
            )
            .await;
        }

        assert!(capturing_publisher.messages_for("vuln_engine_scan_requests").is_empty());
        assert!(capturing_publisher.messages_for("web_scan_requests").is_empty());
        assert_eq!(capturing_publisher.messages_for("fingerprint_scan_requests").len(), 1);
        assert_eq!(capturing_publisher.messages_for("vuln_lookup_requests").len(), 1);
        assert_eq!(capturing_publisher.messages_for("report_requests").len(), 1);
    }
}
