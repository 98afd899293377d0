// [apps/orchestrator/src/services/status_consumer.rs]
/*!
 * =================================================================
 * APARATO: STATUS UPDATE CONSUMER (V4.3 - SINGLE ENTRY POINT)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DRENAJE DE LA COLA DE ESTADOS HACIA EL RECONCILIADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SHARED ENTRY POINT: El manejador sirve tanto a la tarea embebida
 *    del kernel como al binario 'consume-scan-status' en primer plano.
 * 2. CLOSED PARSING: JSON ilegible o tags desconocidos descartan la
 *    entrega sin re-encolado (malformación permanente).
 * =================================================================
 */

use crate::services::reconciler::{reconcile_status_event, ReconcileOutcome};
use crate::state::AppState;
use async_trait::async_trait;
use tracing::{error, info, instrument};
use vapter_domain_models::StatusEvent;
use vapter_infra_broker::{AckDisposition, DeliveryHandler};

/// Manejador soberano de la cola 'scan_status_updates'.
pub struct StatusUpdateHandler {
    application_state: AppState,
}

impl StatusUpdateHandler {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }
}

#[async_trait]
impl DeliveryHandler for StatusUpdateHandler {
    #[instrument(skip(self, delivery_body))]
    async fn handle_delivery(&self, delivery_body: &[u8]) -> AckDisposition {
        let status_event: StatusEvent = match serde_json::from_slice(delivery_body) {
            Ok(parsed_event) => parsed_event,
            Err(parse_fault) => {
                error!("🚫 [STATUS_CONSUMER]: Malformed status message discarded: {}", parse_fault);
                return AckDisposition::NackDiscard;
            }
        };

        info!(
            "📨 [STATUS_CONSUMER]: Event scan=[{}] module=[{}] status=[{:?}]",
            status_event.scan_id, status_event.module, status_event.status
        );

        match reconcile_status_event(&self.application_state, status_event).await {
            ReconcileOutcome::Applied => AckDisposition::Ack,
            ReconcileOutcome::Discarded => AckDisposition::NackDiscard,
            ReconcileOutcome::RetryLater => AckDisposition::NackRequeue,
        }
    }
}
