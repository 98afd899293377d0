// [tests/mirror/libs/infra/db_libsql/scan_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CICLO DE VIDA DE ESCANEOS (V4.2 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE CAS, CONFLICTOS Y REINICIO
 *
 * # Mathematical Proof (CAS Serialization):
 * El test certifica que el Ledger actúa como un semáforo atómico: de
 * dos avances concurrentes condicionados al mismo estado esperado, a
 * lo sumo uno observa éxito; el perdedor recibe el veredicto de
 * obsolescencia sin tocar la fila.
 * =================================================================
 */

use libsql::params;
use std::time::{Duration, Instant};
use serde_json::json;
use reqwest::blocking::Client;
use vapter_domain_models::ScanStatus;
use vapter_infra_db::repositories::customer::NewCustomer;
use vapter_infra_db::repositories::target::NewTarget;
use vapter_infra_db::repositories::scan_type::NewScanType;
use vapter_infra_db::repositories::{
    CustomerRepository, ScanRepository, ScanTypeRepository, TargetRepository,
};
use vapter_infra_db::{DbError, LedgerClient};

// --- MOTOR DE REPORTE SOBERANO ---

/**
 * Transmite el veredicto técnico de la auditoría de persistencia al HUB.
 */
fn dispatch_persistence_integrity_report(
    final_verdict_label: &str,
    database_latency_milliseconds: f64,
    technical_forensic_log: String,
    total_anomalies_detected: u32,
) {
    let control_plane_url = std::env::var("ORCHESTRATOR_URL")
        .unwrap_or_else(|_| "http://localhost:8000".into());

    let payload_artifact = json!({
        "testName": "SCAN_LIFECYCLE_CAS_V4_2",
        "stratum": "L3_INFRA",
        "verdict": final_verdict_label,
        "metrics": {
            "latency_ms": database_latency_milliseconds,
            "error_rate": total_anomalies_detected as f64
        },
        "forensicLog": technical_forensic_log,
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    let network_client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("INFRA_FAULT: Reporting engine failed to initialize.");

    let _ = network_client
        .post(format!("{}/api/orchestrator/qa/report", control_plane_url))
        .json(&payload_artifact)
        .send();
}

async fn provision_scan(
    database_client: &LedgerClient,
) -> (String, String) {
    let customer = CustomerRepository::new(database_client.clone())
        .create(NewCustomer {
            name: "Auditoría Zenith".into(),
            company_name: None,
            email: "audit@example.com".into(),
            phone: None,
            contact_person: None,
            address: None,
            notes: None,
        })
        .await
        .expect("GENESIS_FAULT: customer");

    let target = TargetRepository::new(database_client.clone())
        .create(NewTarget {
            customer_id: customer.id,
            name: "perimeter-alpha".into(),
            address: "192.0.2.10".into(),
            description: None,
        })
        .await
        .expect("GENESIS_FAULT: target");

    let scan_type = ScanTypeRepository::new(database_client.clone())
        .create(NewScanType {
            name: "full-audit".into(),
            only_discovery: false,
            consider_alive: true,
            be_quiet: false,
            port_list_id: None,
            plugin_fingerprint: true,
            plugin_vuln_engine: false,
            plugin_web: false,
            plugin_vuln_lookup: false,
            description: None,
        })
        .await
        .expect("GENESIS_FAULT: scan type");

    (target.id, scan_type.id)
}

// --- SUITE DE AUDITORÍA DE PERSISTENCIA ---

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * Ejecuta la validación de integridad del ciclo:
     * [Pending -> Queued -> Running -> Completed] con CAS.
     */
    #[tokio::test]
    async fn certify_scan_lifecycle_cas_integrity() {
        println!("\n🗄️  [INICIO]: Iniciando Auditoría del Ciclo de Vida de Escaneos V4.2...");
        let suite_execution_start = Instant::now();
        let mut technical_forensic_log = String::new();
        let mut accumulated_anomalies_count = 0u32;

        // 1. SETUP: Infraestructura volátil (RAM con caché compartido)
        let database_client = LedgerClient::connect("file:mem_scan_lifecycle_v42?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let scan_repository = ScanRepository::new(database_client.clone());
        let (target_identifier, scan_type_identifier) = provision_scan(&database_client).await;

        // 2. FASE DE GÉNESIS Y CONFLICTO DE ESCANEO ACTIVO
        println!("   🧪 Fase 1: Forja y exclusión de escaneo concurrente...");
        let forged_scan = scan_repository
            .create(&target_identifier, &scan_type_identifier)
            .await
            .expect("GENESIS_FAULT: scan");
        assert_eq!(forged_scan.status, ScanStatus::Pending);

        let concurrent_attempt = scan_repository.create(&target_identifier, &scan_type_identifier).await;
        if matches!(concurrent_attempt, Err(DbError::ActiveScanConflict)) {
            technical_forensic_log.push_str("✅ CONFLICT: Escaneo concurrente bloqueado.\n");
        } else {
            accumulated_anomalies_count += 1;
            technical_forensic_log.push_str("❌ CONFLICT: Doble escaneo activo admitido.\n");
        }

        // 3. FASE DE AVANCE CAS (Queued -> Running)
        println!("   🧪 Fase 2: Validando compare-and-set del avance...");
        let database_io_start = Instant::now();
        scan_repository.mark_queued(&forged_scan.id).await.expect("CAS_FAULT: Pending->Queued");
        scan_repository
            .compare_and_set_status(&forged_scan.id, ScanStatus::Queued, ScanStatus::NmapScanRunning)
            .await
            .expect("CAS_FAULT: Queued->Running");
        let database_io_latency_ms = database_io_start.elapsed().as_secs_f64() * 1000.0;

        // El perdedor de la carrera recibe obsolescencia sin efecto.
        let stale_attempt = scan_repository
            .compare_and_set_status(&forged_scan.id, ScanStatus::Queued, ScanStatus::NmapScanRunning)
            .await;
        if matches!(stale_attempt, Err(DbError::StaleTransition)) {
            technical_forensic_log.push_str("✅ CAS: Avance duplicado rechazado como obsoleto.\n");
        } else {
            accumulated_anomalies_count += 1;
            technical_forensic_log.push_str("❌ CAS: Avance duplicado admitido (lost update).\n");
        }

        // 4. FASE TERMINAL: fallo sella cronometría y mensaje
        println!("   🧪 Fase 3: Validando sellado terminal y absorción...");
        let failure_applied = scan_repository
            .mark_failed(&forged_scan.id, "tool timeout")
            .await
            .expect("SEAL_FAULT");
        assert!(failure_applied, "SEAL_FAULT: terminal seal rejected");

        let sealed_scan = scan_repository.fetch(&forged_scan.id).await.expect("FETCH_FAULT");
        assert_eq!(sealed_scan.status, ScanStatus::Failed);
        assert!(sealed_scan.completed_at.is_some(), "INVARIANT_BREACH: Failed requires completed_at");
        assert_eq!(sealed_scan.error_message.as_deref(), Some("tool timeout"));

        // Señal tardía sobre terminal: absorbida sin efecto.
        let late_failure = scan_repository.mark_failed(&forged_scan.id, "late duplicate").await.expect("SEAL_FAULT");
        if !late_failure {
            technical_forensic_log.push_str("✅ ABSORPTION: Señal tardía descartada sobre terminal.\n");
        } else {
            accumulated_anomalies_count += 1;
            technical_forensic_log.push_str("❌ ABSORPTION: Terminal regresado por señal tardía.\n");
        }

        // 5. FASE DE REINICIO: purga de artefactos y regreso a Pending
        println!("   🧪 Fase 4: Validando protocolo de reinicio...");
        let database_connection = database_client.get_connection().expect("POOL_FAULT");
        database_connection
            .execute(
                "UPDATE scan SET parsed_nmap_results = '{\"hosts\":[]}', report_path = '/tmp/r.json' WHERE id = ?1",
                params![sealed_scan.id.clone()],
            )
            .await
            .expect("FIXTURE_FAULT");

        let restarted_scan = scan_repository.clear_for_restart(&sealed_scan.id).await.expect("RESTART_FAULT");
        assert_eq!(restarted_scan.status, ScanStatus::Pending);
        assert!(restarted_scan.parsed_nmap_results.is_none());
        assert!(restarted_scan.started_at.is_none());
        assert!(restarted_scan.completed_at.is_none());
        assert!(restarted_scan.error_message.is_none());
        assert!(restarted_scan.report_path.is_none());

        // El reinicio desde no-terminal es un conflicto.
        let illegal_restart = scan_repository.clear_for_restart(&restarted_scan.id).await;
        if matches!(illegal_restart, Err(DbError::StaleTransition)) {
            technical_forensic_log.push_str("✅ RESTART: Reinicio desde no-terminal rechazado.\n");
        } else {
            accumulated_anomalies_count += 1;
            technical_forensic_log.push_str("❌ RESTART: Reinicio ilegal admitido.\n");
        }

        // 6. SENTENCIA Y REPORTE AL DASHBOARD
        let final_verdict_label = if accumulated_anomalies_count == 0 { "GOLD_MASTER" } else { "DEGRADED" };
        technical_forensic_log.push_str(&format!("\nVEREDICTO_FINAL: {}\n", final_verdict_label));

        // El cliente bloqueante vive en su propio hilo: jamás dentro
        // del reactor de Tokio.
        let verdict_snapshot = final_verdict_label.to_string();
        let reporting_thread = std::thread::spawn(move || {
            dispatch_persistence_integrity_report(
                &verdict_snapshot,
                database_io_latency_ms,
                technical_forensic_log,
                accumulated_anomalies_count,
            );
        });
        let _ = reporting_thread.join();

        println!("\n🏁 [INFORME]: Auditoría finalizada en {:?}. Veredicto: {}", suite_execution_start.elapsed(), final_verdict_label);
        assert_eq!(accumulated_anomalies_count, 0, "La integridad del Ledger de Evaluación ha sido comprometida.");
    }
}
