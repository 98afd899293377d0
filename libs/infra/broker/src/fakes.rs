// [libs/infra/broker/src/fakes.rs]
/*!
 * =================================================================
 * APARATO: PUBLISHER TEST DOUBLES (V4.0 - PROVING GROUNDS)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3-MIRROR)
 * RESPONSABILIDAD: DOBLE DE CAPTURA PARA AUDITAR EL DESPACHO SIN BROKER
 * =================================================================
 */

use crate::errors::BrokerError;
use crate::publisher::QueuePublisher;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Publicador de captura: retiene (cola, payload) en orden de emisión.
#[derive(Default)]
pub struct CapturingQueuePublisher {
    captured_messages: Mutex<Vec<(String, Value)>>,
    /// Si está armado, toda publicación colapsa (simulación de avería).
    pub fail_all_publishes: std::sync::atomic::AtomicBool,
}

impl CapturingQueuePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantánea de los mensajes capturados hasta el momento.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.captured_messages.lock().expect("PROVING_GROUNDS: capture lock poisoned").clone()
    }

    /// Mensajes publicados en una cola específica.
    pub fn messages_for(&self, queue_name: &str) -> Vec<Value> {
        self.snapshot()
            .into_iter()
            .filter(|(captured_queue, _)| captured_queue == queue_name)
            .map(|(_, payload)| payload)
            .collect()
    }
}

#[async_trait]
impl QueuePublisher for CapturingQueuePublisher {
    async fn publish_json(&self, queue_name: &str, payload: &Value) -> Result<(), BrokerError> {
        if self.fail_all_publishes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(BrokerError::PublishExhausted(queue_name.into()));
        }

        self.captured_messages
            .lock()
            .expect("PROVING_GROUNDS: capture lock poisoned")
            .push((queue_name.to_string(), payload.clone()));
        Ok(())
    }
}
