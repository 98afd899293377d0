// [libs/infra/broker/src/publisher.rs]
/*!
 * =================================================================
 * APARATO: QUEUE PUBLISHER (V4.3 - PERSISTENT DELIVERY)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PUBLICACIÓN JSON PERSISTENTE CON REINTENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRAIT SEAM: 'QueuePublisher' es la costura de inyección que permite
 *    al despachador operar contra un doble de captura en los tests.
 * 2. DELIVERY MODE 2: Todo mensaje es persistente, con expiración de 1
 *    hora y content-type JSON.
 * 3. BOUNDED INSISTENCE: Tres intentos con retroceso 2^n segundos antes
 *    de declarar el agotamiento.
 * =================================================================
 */

use crate::connection::BrokerLink;
use crate::errors::BrokerError;
use crate::queues::MESSAGE_TTL_MILLISECONDS;
use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::BasicProperties;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PUBLISH_MAX_ATTEMPTS: u32 = 3;

/// Costura de publicación del plano de control.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publica un payload JSON en la cola nombrada (entrega persistente).
    async fn publish_json(&self, queue_name: &str, payload: &Value) -> Result<(), BrokerError>;
}

/// Publicador real sobre el enlace lapin.
pub struct LapinQueuePublisher {
    broker_link: BrokerLink,
}

impl LapinQueuePublisher {
    pub fn new(broker_link: BrokerLink) -> Self {
        Self { broker_link }
    }

    pub fn link(&self) -> &BrokerLink {
        &self.broker_link
    }
}

#[async_trait]
impl QueuePublisher for LapinQueuePublisher {
    #[instrument(skip(self, payload))]
    async fn publish_json(&self, queue_name: &str, payload: &Value) -> Result<(), BrokerError> {
        let serialized_payload = serde_json::to_vec(payload)?;

        let message_properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into())
            .with_expiration(MESSAGE_TTL_MILLISECONDS.to_string().into());

        let mut attempt_number: u32 = 0;
        loop {
            attempt_number += 1;

            let publish_outcome = self
                .broker_link
                .channel()
                .basic_publish(
                    "",
                    queue_name,
                    BasicPublishOptions::default(),
                    &serialized_payload,
                    message_properties.clone(),
                )
                .await;

            match publish_outcome {
                Ok(confirmation) => match confirmation.await {
                    Ok(_) => {
                        debug!("📤 [PUBLISHER]: Message delivered to [{}].", queue_name);
                        return Ok(());
                    }
                    Err(confirmation_fault) => {
                        warn!("⚠️ [PUBLISHER]: Confirmation lost on [{}]: {}", queue_name, confirmation_fault);
                    }
                },
                Err(publish_fault) => {
                    warn!(
                        "⚠️ [PUBLISHER]: Publish attempt {}/{} on [{}] failed: {}",
                        attempt_number, PUBLISH_MAX_ATTEMPTS, queue_name, publish_fault
                    );
                }
            }

            if attempt_number >= PUBLISH_MAX_ATTEMPTS {
                return Err(BrokerError::PublishExhausted(queue_name.into()));
            }
            tokio::time::sleep(Duration::from_secs(2u64.pow(attempt_number - 1))).await;
        }
    }
}
