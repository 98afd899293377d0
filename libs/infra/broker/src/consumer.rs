// [libs/infra/broker/src/consumer.rs]
/*!
 * =================================================================
 * APARATO: QUEUE CONSUMER LOOP (V4.4 - ACK DISCIPLINE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONSUMO PREFETCH=1 CON ACK MANUAL Y RECONEXIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MANUAL ACK: El mensaje se confirma únicamente tras el veredicto del
 *    manejador; los fallos permanentes descartan sin re-encolado y los
 *    transitorios re-encolan.
 * 2. PHOENIX LOOP: La pérdida del enlace dispara reconexión con
 *    retroceso exponencial y re-declaración de la cola.
 * 3. GRACEFUL SHUTDOWN: Un canal 'watch' detiene el consumo, permite
 *    terminar la reconciliación en vuelo y cierra conexiones.
 * =================================================================
 */

use crate::connection::BrokerLink;
use crate::errors::BrokerError;
use crate::queues::reconnect_delay;
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Veredicto del manejador sobre una entrega consumida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDisposition {
    /// Procesamiento exitoso: confirmar la entrega.
    Ack,
    /// Fallo transitorio (infraestructura): re-encolar para reintento.
    NackRequeue,
    /// Fallo permanente (malformación, error no recuperable): descartar.
    NackDiscard,
}

/// Manejador de entregas del plano de control.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Procesa el cuerpo crudo de una entrega y dicta su destino.
    async fn handle_delivery(&self, delivery_body: &[u8]) -> AckDisposition;
}

/// Bucle de consumo soberano sobre una cola nombrada.
pub struct QueueConsumer {
    broker_url: String,
    queue_name: String,
    consumer_tag: String,
    prefetch_count: u16,
}

impl QueueConsumer {
    pub fn new(broker_url: String, queue_name: String, consumer_tag: String) -> Self {
        Self { broker_url, queue_name, consumer_tag, prefetch_count: 1 }
    }

    pub fn with_prefetch(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = prefetch_count.max(1);
        self
    }

    /**
     * Ejecuta el bucle de consumo hasta la señal de apagado.
     *
     * Cada caída del enlace reinicia la secuencia: reconexión acotada,
     * re-declaración de la cola y re-suscripción del consumidor.
     *
     * # Errors:
     * - `BrokerError::ConnectionError` al agotar el presupuesto de
     *   reconexión; el proceso decide su destino.
     */
    #[instrument(skip(self, delivery_handler, shutdown_signal), fields(queue = %self.queue_name))]
    pub async fn run(
        &self,
        delivery_handler: &dyn DeliveryHandler,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> Result<(), BrokerError> {
        let mut reconnect_attempt: u32 = 0;

        loop {
            if *shutdown_signal.borrow() {
                info!("🛑 [CONSUMER]: Shutdown requested before uplink. Exiting.");
                return Ok(());
            }

            let broker_link = match BrokerLink::connect(&self.broker_url, "consumer").await {
                Ok(link) => {
                    reconnect_attempt = 0;
                    link
                }
                Err(connection_fault) => return Err(connection_fault),
            };

            broker_link.declare_queue(&self.queue_name).await?;

            if self.prefetch_count != 1 {
                broker_link
                    .channel()
                    .basic_qos(self.prefetch_count, Default::default())
                    .await?;
            }

            let mut delivery_stream = broker_link
                .channel()
                .basic_consume(
                    &self.queue_name,
                    &self.consumer_tag,
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;

            info!("👂 [CONSUMER]: Listening on [{}] (prefetch={}).", self.queue_name, self.prefetch_count);

            let session_outcome = loop {
                tokio::select! {
                    shutdown_changed = shutdown_signal.changed() => {
                        if shutdown_changed.is_err() || *shutdown_signal.borrow() {
                            info!("🛑 [CONSUMER]: Shutdown signal received. Draining stopped.");
                            break SessionOutcome::Shutdown;
                        }
                    }
                    next_delivery = delivery_stream.next() => {
                        match next_delivery {
                            Some(Ok(delivery)) => {
                                let disposition = delivery_handler.handle_delivery(&delivery.data).await;
                                let settle_outcome = match disposition {
                                    AckDisposition::Ack => {
                                        delivery.ack(BasicAckOptions::default()).await
                                    }
                                    AckDisposition::NackRequeue => {
                                        delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await
                                    }
                                    AckDisposition::NackDiscard => {
                                        delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await
                                    }
                                };

                                if let Err(settle_fault) = settle_outcome {
                                    warn!("⚠️ [CONSUMER]: Settlement failed ({}). Recycling uplink.", settle_fault);
                                    break SessionOutcome::LinkLost;
                                }
                            }
                            Some(Err(stream_fault)) => {
                                warn!("⚠️ [CONSUMER]: Delivery stream fault: {}. Recycling uplink.", stream_fault);
                                break SessionOutcome::LinkLost;
                            }
                            None => {
                                warn!("⚠️ [CONSUMER]: Delivery stream closed by broker. Recycling uplink.");
                                break SessionOutcome::LinkLost;
                            }
                        }
                    }
                }
            };

            match session_outcome {
                SessionOutcome::Shutdown => {
                    let _ = broker_link.close().await;
                    return Ok(());
                }
                SessionOutcome::LinkLost => {
                    let _ = broker_link.close().await;
                    reconnect_attempt += 1;
                    let retry_delay = reconnect_delay(reconnect_attempt);
                    error!("🔁 [CONSUMER]: Uplink recycled. Backoff {:?} before retry.", retry_delay);
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
}

enum SessionOutcome {
    Shutdown,
    LinkLost,
}
