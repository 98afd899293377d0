// [tests/mirror/apps/stage_worker/runtime_contract.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CONTRATO DEL RUNTIME (V4.3 - ACK LAW)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: DISCIPLINA ACK, VEREDICTOS Y TIMEOUT DURO
 *
 * # Mathematical Proof (Ack Discipline):
 * ack <=> carga durable + veredicto terminal publicado; malformación
 * y fallo permanente descartan; avería transitoria re-encola.
 * =================================================================
 */

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vapter_domain_models::{StageModule, StageRequest};
use vapter_infra_broker::fakes::CapturingQueuePublisher;
use vapter_infra_broker::AckDisposition;
use vapter_infra_gateway_client::GatewayClient;
use vapter_stage_worker::config::{VulnEngineSettings, WorkerSettings};
use vapter_stage_worker::runtime::{StatusEmitter, WorkerRuntime};
use vapter_stage_worker::stages::{StageContext, StageExecutor, StageFailure};

/// Ejecutor doble con veredicto programable.
struct ScriptedExecutor {
    scripted_verdict: fn() -> Result<(), StageFailure>,
    execution_delay: Duration,
    hard_timeout: Duration,
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    fn module(&self) -> StageModule {
        StageModule::Web
    }

    fn hard_timeout(&self, _settings: &WorkerSettings) -> Duration {
        self.hard_timeout
    }

    async fn execute(&self, _context: StageContext<'_>) -> Result<(), StageFailure> {
        tokio::time::sleep(self.execution_delay).await;
        (self.scripted_verdict)()
    }
}

fn proving_settings() -> WorkerSettings {
    WorkerSettings {
        broker_url: "amqp://proving-grounds".into(),
        api_gateway_url: "http://127.0.0.1:1".into(),
        api_timeout: Duration::from_secs(1),
        max_retries: 1,
        retry_delay: Duration::from_millis(10),
        temp_results_dir: PathBuf::from("/tmp/vapter_proving"),
        keep_raw_output: false,
        nmap_timeout: Duration::from_secs(5),
        fingerprint_timeout_per_port: Duration::from_secs(1),
        web_scan_timeout: Duration::from_secs(5),
        vuln_lookup_timeout: Duration::from_secs(5),
        report_timeout: Duration::from_secs(5),
        max_concurrent_fingerprints: 2,
        fingerprintx_path: PathBuf::from("/usr/local/bin/fingerprintx"),
        nmap_path: PathBuf::from("nmap"),
        vuln_engine: VulnEngineSettings {
            username: "proving".into(),
            password: "grounds".into(),
            socket_path: PathBuf::from("/tmp/none.sock"),
            scan_config_id: "cfg".into(),
            scanner_id: "scn".into(),
            port_list_id: "pl".into(),
            polling_interval: Duration::from_secs(1),
            max_scan_time: Duration::from_secs(5),
            report_format: "XML".into(),
        },
    }
}

fn ignite_runtime(
    scripted_verdict: fn() -> Result<(), StageFailure>,
    execution_delay: Duration,
    hard_timeout: Duration,
) -> (WorkerRuntime, Arc<CapturingQueuePublisher>) {
    let capturing_publisher = Arc::new(CapturingQueuePublisher::new());
    let settings = proving_settings();

    let gateway_client = GatewayClient::new(
        settings.api_gateway_url.clone(),
        settings.api_timeout,
        settings.max_retries,
        settings.retry_delay,
    );
    let status_emitter = StatusEmitter::new(
        capturing_publisher.clone(),
        "scan_status_updates".into(),
        StageModule::Web,
    );

    let worker_runtime = WorkerRuntime::new(
        settings,
        gateway_client,
        status_emitter,
        Box::new(ScriptedExecutor { scripted_verdict, execution_delay, hard_timeout }),
    );

    (worker_runtime, capturing_publisher)
}

fn stage_request(plugin: StageModule) -> StageRequest {
    StageRequest {
        scan_id: "SCN-PROVING-1".into(),
        target_id: "TGT-PROVING-1".into(),
        target_host: "192.0.2.99".into(),
        scan_type_id: None,
        plugin,
        timestamp: Utc::now(),
    }
}

fn emitted_statuses(capturing_publisher: &CapturingQueuePublisher) -> Vec<String> {
    capturing_publisher
        .messages_for("scan_status_updates")
        .iter()
        .map(|event| event["status"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Camino feliz. received -> running -> completed y
     * confirmación de la entrega.
     */
    #[tokio::test]
    async fn certify_happy_path_ack() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating happy-path ack law...");

        let (worker_runtime, capturing_publisher) =
            ignite_runtime(|| Ok(()), Duration::from_millis(5), Duration::from_secs(5));

        let disposition = worker_runtime.process_stage_request(stage_request(StageModule::Web)).await;

        assert_eq!(disposition, AckDisposition::Ack);
        assert_eq!(
            emitted_statuses(&capturing_publisher),
            vec!["received", "running", "completed"],
            "CONTRACT_BREACH: status emission order drifted"
        );
    }

    /**
     * CERTIFICACIÓN: Fallo permanente. Veredicto 'failed' con detalle
     * forense y descarte sin re-encolado.
     */
    #[tokio::test]
    async fn certify_permanent_failure_discards() {
        let (worker_runtime, capturing_publisher) = ignite_runtime(
            || Err(StageFailure::Permanent("tool exited 1".into())),
            Duration::from_millis(5),
            Duration::from_secs(5),
        );

        let disposition = worker_runtime.process_stage_request(stage_request(StageModule::Web)).await;

        assert_eq!(disposition, AckDisposition::NackDiscard);

        let status_events = capturing_publisher.messages_for("scan_status_updates");
        let terminal_event = status_events.last().expect("CONTRACT_BREACH: no terminal verdict");
        assert_eq!(terminal_event["status"], "failed");
        assert!(terminal_event["error_details"].as_str().unwrap().contains("tool exited 1"));
    }

    /**
     * CERTIFICACIÓN: Avería transitoria. Re-encolado SIN veredicto
     * terminal (la re-entrega re-ejecutará la etapa).
     */
    #[tokio::test]
    async fn certify_transient_failure_requeues() {
        let (worker_runtime, capturing_publisher) = ignite_runtime(
            || Err(StageFailure::Transient("broker hiccup".into())),
            Duration::from_millis(5),
            Duration::from_secs(5),
        );

        let disposition = worker_runtime.process_stage_request(stage_request(StageModule::Web)).await;

        assert_eq!(disposition, AckDisposition::NackRequeue);
        assert_eq!(
            emitted_statuses(&capturing_publisher),
            vec!["received", "running"],
            "CONTRACT_BREACH: terminal verdict emitted on transient fault"
        );
    }

    /**
     * CERTIFICACIÓN: Timeout duro de pared. Veredicto 'failed' con la
     * firma de timeout y descarte.
     */
    #[tokio::test]
    async fn certify_hard_timeout_seals_failed() {
        let (worker_runtime, capturing_publisher) = ignite_runtime(
            || Ok(()),
            Duration::from_secs(30),
            Duration::from_millis(50),
        );

        let disposition = worker_runtime.process_stage_request(stage_request(StageModule::Web)).await;

        assert_eq!(disposition, AckDisposition::NackDiscard);
        let status_events = capturing_publisher.messages_for("scan_status_updates");
        let terminal_event = status_events.last().expect("CONTRACT_BREACH: no terminal verdict");
        assert_eq!(terminal_event["status"], "failed");
        assert!(terminal_event["error_details"].as_str().unwrap().contains("timeout"));
    }

    /// Orden mal ruteada (plugin ajeno): descarte sin veredicto.
    #[tokio::test]
    async fn certify_misrouted_request_discarded() {
        let (worker_runtime, capturing_publisher) =
            ignite_runtime(|| Ok(()), Duration::from_millis(5), Duration::from_secs(5));

        let disposition = worker_runtime
            .process_stage_request(stage_request(StageModule::Fingerprint))
            .await;

        assert_eq!(disposition, AckDisposition::NackDiscard);
        assert!(emitted_statuses(&capturing_publisher).is_empty());
    }

    /// Contrato violado (target_host vacío): 'failed' + descarte.
    #[tokio::test]
    async fn certify_malformed_request_discarded() {
        let (worker_runtime, capturing_publisher) =
            ignite_runtime(|| Ok(()), Duration::from_millis(5), Duration::from_secs(5));

        let mut malformed_request = stage_request(StageModule::Web);
        malformed_request.target_host = "".into();

        let disposition = worker_runtime.process_stage_request(malformed_request).await;

        assert_eq!(disposition, AckDisposition::NackDiscard);
        let statuses = emitted_statuses(&capturing_publisher);
        assert_eq!(statuses, vec!["failed"]);
    }
}
