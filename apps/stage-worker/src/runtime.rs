// [apps/stage-worker/src/runtime.rs]
/*!
 * =================================================================
 * APARATO: STAGE WORKER RUNTIME (V4.5 - SKELETON SOBERANO)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: BUCLE DE TRABAJO, VEREDICTOS Y DISCIPLINA ACK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SKELETON ÚNICO: Todo worker de etapa embebe este esqueleto:
 *    validar -> running -> herramienta bajo timeout -> parsear ->
 *    cargar -> completed -> ack.
 * 2. DUAL UPLINK: El enlace de consumo puede quedar ocupado mientras la
 *    herramienta corre; el enlace de publicación emite progreso y
 *    veredictos en paralelo (los latidos AMQP viven en su reactor).
 * 3. ACK DISCIPLINE: La entrega se confirma únicamente tras carga
 *    durable + veredicto terminal publicado; malformación descarta,
 *    avería transitoria re-encola.
 *
 * # Mathematical Proof (At-Least-Once Safety):
 * Toda re-entrega producto de un 'NackRequeue' re-ejecuta una etapa
 * cuyos efectos (PATCH idempotente + CAS del reconciliador) son
 * absorbentes; la semántica observable equivale a exactamente-una
 * aplicación.
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use vapter_domain_models::{StageModule, StagePhase, StageRequest, StatusEvent};
use vapter_infra_broker::{AckDisposition, BrokerError, DeliveryHandler, QueuePublisher};

/// Emisor de veredictos hacia la cola multiplexada de estados.
pub struct StatusEmitter {
    queue_publisher: Arc<dyn QueuePublisher>,
    status_queue_name: String,
    stage_module: StageModule,
}

impl StatusEmitter {
    pub fn new(
        queue_publisher: Arc<dyn QueuePublisher>,
        status_queue_name: String,
        stage_module: StageModule,
    ) -> Self {
        Self { queue_publisher, status_queue_name, stage_module }
    }

    /// Emite una fase simple del ciclo de etapa.
    pub async fn emit_phase(&self, scan_identifier: &str, phase: StagePhase) -> Result<(), BrokerError> {
        self.emit(StatusEvent::new(scan_identifier, self.stage_module, phase)).await
    }

    /// Emite un 'running' con progreso porcentual [0,100].
    pub async fn emit_progress(&self, scan_identifier: &str, progress: u8) -> Result<(), BrokerError> {
        self.emit(
            StatusEvent::new(scan_identifier, self.stage_module, StagePhase::Running)
                .with_progress(progress),
        )
        .await
    }

    /// Emite el veredicto terminal de fallo con su detalle forense.
    pub async fn emit_failed(&self, scan_identifier: &str, error_details: &str) -> Result<(), BrokerError> {
        self.emit(
            StatusEvent::new(scan_identifier, self.stage_module, StagePhase::Failed)
                .with_error_details(error_details),
        )
        .await
    }

    async fn emit(&self, status_event: StatusEvent) -> Result<(), BrokerError> {
        let event_payload = serde_json::to_value(&status_event)?;
        self.queue_publisher
            .publish_json(&self.status_queue_name, &event_payload)
            .await
    }
}

/// Esqueleto soberano del worker: un ejecutor, una cola, un contrato.
pub struct WorkerRuntime {
    settings: WorkerSettings,
    gateway: vapter_infra_gateway_client::GatewayClient,
    status_emitter: StatusEmitter,
    stage_executor: Box<dyn StageExecutor>,
}

impl WorkerRuntime {
    pub fn new(
        settings: WorkerSettings,
        gateway: vapter_infra_gateway_client::GatewayClient,
        status_emitter: StatusEmitter,
        stage_executor: Box<dyn StageExecutor>,
    ) -> Self {
        Self { settings, gateway, status_emitter, stage_executor }
    }

    /**
     * Procesa una orden de etapa ya parseada y dicta el destino de la
     * entrega. Núcleo puro del bucle, auditable sin broker vivo.
     */
    #[instrument(skip(self, stage_request), fields(scan_id = %stage_request.scan_id, module = %stage_request.plugin))]
    pub async fn process_stage_request(&self, stage_request: StageRequest) -> AckDisposition {
        // 1. VALIDACIÓN DEL CONTRATO
        if let Err(missing_fields) = stage_request.validate() {
            error!("🚫 [RUNTIME]: Malformed stage request (missing {:?}); discarding.", missing_fields);
            if !stage_request.scan_id.trim().is_empty() {
                let _ = self
                    .status_emitter
                    .emit_failed(&stage_request.scan_id, "malformed stage request")
                    .await;
            }
            return AckDisposition::NackDiscard;
        }

        if stage_request.plugin != self.stage_executor.module() {
            error!(
                "🚫 [RUNTIME]: Misrouted request for [{}] on a [{}] worker; discarding.",
                stage_request.plugin,
                self.stage_executor.module()
            );
            return AckDisposition::NackDiscard;
        }

        let scan_identifier = stage_request.scan_id.clone();

        // 2. ANUNCIO DE RECEPCIÓN Y ARRANQUE
        let _ = self.status_emitter.emit_phase(&scan_identifier, StagePhase::Received).await;
        if let Err(broker_fault) = self
            .status_emitter
            .emit_phase(&scan_identifier, StagePhase::Running)
            .await
        {
            // Sin arteria de estados no hay contrato: re-encolar.
            warn!("⚠️ [RUNTIME]: Unable to announce running ({}); requeueing.", broker_fault);
            return AckDisposition::NackRequeue;
        }

        // 3. EJECUCIÓN BAJO TIMEOUT DURO DE PARED
        let stage_context = StageContext {
            request: &stage_request,
            gateway: &self.gateway,
            settings: &self.settings,
            status_emitter: &self.status_emitter,
        };

        let hard_timeout = self.stage_executor.hard_timeout(&self.settings);
        let execution_verdict = timeout(hard_timeout, self.stage_executor.execute(stage_context)).await;

        // 4. VEREDICTO TERMINAL Y DESTINO DE LA ENTREGA
        match execution_verdict {
            Ok(Ok(())) => {
                if let Err(broker_fault) = self
                    .status_emitter
                    .emit_phase(&scan_identifier, StagePhase::Completed)
                    .await
                {
                    // El veredicto terminal es precondición del ack.
                    warn!("⚠️ [RUNTIME]: Completed verdict unpublishable ({}); requeueing.", broker_fault);
                    return AckDisposition::NackRequeue;
                }
                info!("✅ [RUNTIME]: Stage sealed for scan [{}].", scan_identifier);
                AckDisposition::Ack
            }

            Ok(Err(StageFailure::Permanent(failure_detail))) => {
                error!("💀 [RUNTIME]: Permanent stage failure for [{}]: {}", scan_identifier, failure_detail);
                let _ = self.status_emitter.emit_failed(&scan_identifier, &failure_detail).await;
                AckDisposition::NackDiscard
            }

            Ok(Err(StageFailure::Transient(failure_detail))) => {
                warn!("🔁 [RUNTIME]: Transient stage failure for [{}]: {}; requeueing.", scan_identifier, failure_detail);
                AckDisposition::NackRequeue
            }

            Err(_elapsed) => {
                let timeout_detail = format!(
                    "stage timeout exceeded ({}s wall clock)",
                    hard_timeout.as_secs()
                );
                error!("⏱️  [RUNTIME]: {} for scan [{}].", timeout_detail, scan_identifier);
                let _ = self.status_emitter.emit_failed(&scan_identifier, &timeout_detail).await;
                AckDisposition::NackDiscard
            }
        }
    }
}

#[async_trait]
impl DeliveryHandler for WorkerRuntime {
    async fn handle_delivery(&self, delivery_body: &[u8]) -> AckDisposition {
        let stage_request: StageRequest = match serde_json::from_slice(delivery_body) {
            Ok(parsed_request) => parsed_request,
            Err(parse_fault) => {
                error!("🚫 [RUNTIME]: Unparseable stage request discarded: {}", parse_fault);
                return AckDisposition::NackDiscard;
            }
        };

        self.process_stage_request(stage_request).await
    }
}
