// [libs/domain/models-rs/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V4.2 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE CONTRATOS DE CABLE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CLOSED VARIANT ENFORCEMENT: Un módulo o estado desconocido en la
 *    cola de estados debe colapsar el parseo, jamás degradar a texto libre.
 * 2. BACKWARD COMPAT: Los alias históricos 'error' y 'started' del cable
 *    se aceptan en la ingesta y se canonicalizan al deserializar.
 * 3. LATTICE PARITY: Las quince etiquetas de estado persisten y
 *    re-parsean bit-perfectas con rango estrictamente creciente.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_domain_models::pipeline::{StageModule, StagePhase, StageRequest, StatusEvent};
    use vapter_domain_models::scan::ScanStatus;
    use chrono::Utc;
    use uuid::Uuid;

    /**
     * CERTIFICACIÓN: Roundtrip del contrato de orden de etapa.
     */
    #[test]
    fn certify_stage_request_roundtrip() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating StageRequest wire parity...");

        let request_instance = StageRequest {
            scan_id: Uuid::new_v4().to_string(),
            target_id: Uuid::new_v4().to_string(),
            target_host: "192.0.2.10".into(),
            scan_type_id: Some(Uuid::new_v4().to_string()),
            plugin: StageModule::Fingerprint,
            timestamp: Utc::now(),
        };

        let serialized_json = serde_json::to_string(&request_instance)
            .expect("CRITICAL_FAULT: Serialization strata collapsed.");

        // El discriminador del módulo viaja en snake_case canónico.
        assert!(serialized_json.contains("\"plugin\":\"fingerprint\""));

        let recovered_request: StageRequest = serde_json::from_str(&serialized_json)
            .expect("CRITICAL_FAULT: Deserialization failed. Schema drift detected.");

        assert_eq!(recovered_request.plugin, StageModule::Fingerprint);
        assert_eq!(recovered_request.target_host, "192.0.2.10");
        assert!(recovered_request.validate().is_ok());
    }

    /**
     * CERTIFICACIÓN: Los alias históricos del cable se canonicalizan.
     */
    #[test]
    fn certify_legacy_status_aliases_accepted() {
        let legacy_error_payload = r#"{
            "scan_id": "SCN-77", "module": "nmap", "status": "error",
            "timestamp": "2026-01-10T10:00:00Z",
            "error_details": "tool timeout"
        }"#;

        let recovered_event: StatusEvent = serde_json::from_str(legacy_error_payload)
            .expect("COMPAT_FAULT: 'error' alias rejected on ingest.");
        assert_eq!(recovered_event.status, StagePhase::Failed);

        let legacy_started_payload = r#"{
            "scan_id": "SCN-77", "module": "vuln_engine", "status": "started",
            "timestamp": "2026-01-10T10:00:00Z"
        }"#;

        let recovered_event: StatusEvent = serde_json::from_str(legacy_started_payload)
            .expect("COMPAT_FAULT: 'started' alias rejected on ingest.");
        assert_eq!(recovered_event.status, StagePhase::Running);
        assert_eq!(recovered_event.module, StageModule::VulnEngine);
    }

    /**
     * CERTIFICACIÓN: Un tag desconocido colapsa el parseo (variantes cerradas).
     */
    #[test]
    fn certify_unknown_tags_rejected() {
        let unknown_module_payload = r#"{
            "scan_id": "SCN-1", "module": "enum", "status": "completed",
            "timestamp": "2026-01-10T10:00:00Z"
        }"#;
        assert!(serde_json::from_str::<StatusEvent>(unknown_module_payload).is_err(),
            "INTEGRITY_COLLAPSE: Retired 'enum' stage accepted on the wire.");

        let unknown_status_payload = r#"{
            "scan_id": "SCN-1", "module": "web", "status": "paused",
            "timestamp": "2026-01-10T10:00:00Z"
        }"#;
        assert!(serde_json::from_str::<StatusEvent>(unknown_status_payload).is_err(),
            "INTEGRITY_COLLAPSE: Unknown worker phase accepted on the wire.");
    }

    /**
     * CERTIFICACIÓN: Paridad de etiquetas y monotonicidad del rango.
     */
    #[test]
    fn certify_status_lattice_parity() {
        let full_status_lattice = [
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

        let mut previous_rank: Option<u8> = None;
        for status_instance in full_status_lattice {
            // Paridad textual: persistencia -> parseo -> persistencia.
            let recovered_status = ScanStatus::parse(status_instance.as_str())
                .expect("LATTICE_FAULT: Canonical label failed to re-parse.");
            assert_eq!(recovered_status, status_instance);

            // Paridad serde: la etiqueta JSON es la forma textual exacta.
            let json_label = serde_json::to_string(&status_instance).unwrap();
            assert_eq!(json_label, format!("\"{}\"", status_instance.as_str()));

            // Rango estrictamente creciente a lo largo de la retícula.
            if let Some(preceding_rank) = previous_rank {
                assert!(status_instance.rank() > preceding_rank,
                    "LATTICE_FAULT: Rank regression at {}", status_instance);
            }
            previous_rank = Some(status_instance.rank());
        }

        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(!ScanStatus::ReportGenerationRunning.is_terminal());
        assert!(ScanStatus::parse("Enum Scan Running").is_none(),
            "LATTICE_FAULT: Retired status label resurrected.");
    }
}
