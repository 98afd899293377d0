// [tests/mirror/apps/orchestrator/services/scan_restart.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE REINICIO DE ESCANEOS (V4.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: PURGA DE ARTEFACTOS Y RE-ENCOLADO DEL DESCUBRIMIENTO
 * =================================================================
 */

use serde_json::json;
use std::sync::Arc;
use vapter_domain_models::{ScanStatus, StageModule};
use vapter_infra_broker::fakes::CapturingQueuePublisher;
use vapter_infra_broker::{QueuePublisher, QueueTopology};
use vapter_infra_db::repositories::customer::NewCustomer;
use vapter_infra_db::repositories::scan_type::NewScanType;
use vapter_infra_db::repositories::target::NewTarget;
use vapter_infra_db::LedgerClient;
use vapter_orchestrator::services::dispatcher;
use vapter_orchestrator::state::AppState;

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * ESCENARIO: Tras un escaneo 'Failed', el reinicio purga todo
     * artefacto y cronometría, borra el detalle, regresa a 'Pending'
     * y re-encola la primera etapa.
     */
    #[tokio::test]
    async fn certify_restart_protocol() {
        println!("\n♻️  [INICIO]: Escenario de reinicio post-fallo...");

        let database_client = LedgerClient::connect("file:mem_restart_v42?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let capturing_publisher = Arc::new(CapturingQueuePublisher::new());
        let application_state = AppState::new(
            database_client,
            capturing_publisher.clone() as Arc<dyn QueuePublisher>,
            QueueTopology::default(),
        );

        // 1. GÉNESIS Y PRIMER VUELO
        let customer = application_state
            .customer_repository
            .create(NewCustomer {
                name: "Restart Grounds".into(),
                company_name: None,
                email: "restart@example.com".into(),
                phone: None,
                contact_person: None,
                address: None,
                notes: None,
            })
            .await
            .unwrap();
        let target = application_state
            .target_repository
            .create(NewTarget {
                customer_id: customer.id,
                name: "perimeter-gamma".into(),
                address: "203.0.113.5".into(),
                description: None,
            })
            .await
            .unwrap();
        let scan_type = application_state
            .scan_type_repository
            .create(NewScanType {
                name: "finger-only".into(),
                only_discovery: false,
                consider_alive: false,
                be_quiet: false,
                port_list_id: None,
                plugin_fingerprint: true,
                plugin_vuln_engine: false,
                plugin_web: false,
                plugin_vuln_lookup: false,
                description: None,
            })
            .await
            .unwrap();

        let forged_scan = application_state.scan_repository.create(&target.id, &scan_type.id).await.unwrap();
        dispatcher::start_scan(&application_state, &forged_scan).await.unwrap();

        // Vuelo fallido con artefactos y detalle sellados.
        application_state
            .scan_repository
            .set_parsed_results(&forged_scan.id, StageModule::Nmap, &json!({"hosts": []}))
            .await
            .unwrap();
        application_state
            .scan_detail_repository
            .set_derived_artifacts(&forged_scan.id, &json!({"tcp": [], "udp": []}), None)
            .await
            .unwrap();
        application_state.scan_repository.mark_failed(&forged_scan.id, "tool crashed").await.unwrap();

        // 2. PROTOCOLO DE REINICIO (secuencia del perímetro)
        let purged_scan = application_state.scan_repository.clear_for_restart(&forged_scan.id).await.unwrap();
        application_state.scan_detail_repository.delete_for_scan(&forged_scan.id).await.unwrap();
        dispatcher::start_scan(&application_state, &purged_scan).await.unwrap();

        // 3. VEREDICTO: estado, purga y re-encolado.
        let restarted_scan = application_state.scan_repository.fetch(&forged_scan.id).await.unwrap();
        assert_eq!(restarted_scan.status, ScanStatus::Queued);
        assert!(restarted_scan.parsed_nmap_results.is_none(), "PURGE_BREACH: artifact survived restart");
        assert!(restarted_scan.completed_at.is_none());
        assert!(restarted_scan.error_message.is_none());
        assert!(restarted_scan.report_path.is_none());

        // El detalle fue re-materializado virgen por el arranque.
        let fresh_detail = application_state
            .scan_detail_repository
            .fetch_by_scan(&forged_scan.id)
            .await
            .unwrap()
            .expect("DETAIL_FAULT: detail absent after restart");
        assert!(fresh_detail.open_ports.is_none(), "PURGE_BREACH: derived ports survived restart");
        assert!(fresh_detail.nmap_started_at.is_none());

        // Dos órdenes de descubrimiento: vuelo original + reinicio.
        assert_eq!(capturing_publisher.messages_for("nmap_scan_requests").len(), 2);
    }
}
