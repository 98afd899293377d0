// [libs/infra/broker/src/connection.rs]
/*!
 * =================================================================
 * APARATO: BROKER CONNECTION LINK (V4.2 - PHOENIX RECONNECT)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENLACE AMQP CON RETROCESO EXPONENCIAL Y TOPOLOGÍA
 *
 * # Mathematical Proof (Bounded Reconnect):
 * El retroceso d(n) = min(5 * 2^n, 300) segundos con n <= 10 acota el
 * tiempo total de insistencia; superado el presupuesto, el fallo se
 * propaga al shell del proceso para su terminación ordenada.
 * =================================================================
 */

use crate::errors::BrokerError;
use crate::queues::{
    durable_queue_arguments, ensure_heartbeat, reconnect_delay, QueueTopology,
    MAX_CONNECTION_ATTEMPTS,
};
use lapin::options::{BasicQosOptions, QueueDeclareOptions};
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{error, info, instrument, warn};

/// Enlace soberano al broker: una conexión física y su canal primario.
///
/// Disciplina de conexiones: cada proceso abre un enlace de consumo y
/// un enlace de publicación SEPARADOS; el canal de consumo puede quedar
/// bloqueado mientras una herramienta corre, y el de publicación debe
/// permanecer disponible para emitir progreso.
pub struct BrokerLink {
    amqp_connection: Connection,
    primary_channel: Channel,
}

impl BrokerLink {
    /**
     * Establece el enlace con insistencia acotada y QoS prefetch=1.
     *
     * # Errors:
     * - `BrokerError::ConnectionError` al agotar los intentos.
     */
    #[instrument(skip(broker_url), fields(role = role_label))]
    pub async fn connect(broker_url: &str, role_label: &'static str) -> Result<Self, BrokerError> {
        let hardened_url = ensure_heartbeat(broker_url);
        let mut attempt_number: u32 = 0;

        loop {
            attempt_number += 1;
            info!(
                "🔌 [BROKER]: Attempting AMQP uplink ({}/{}) as [{}]...",
                attempt_number, MAX_CONNECTION_ATTEMPTS, role_label
            );

            match Connection::connect(&hardened_url, ConnectionProperties::default()).await {
                Ok(amqp_connection) => {
                    let primary_channel = amqp_connection.create_channel().await?;

                    // Un worker procesa una etapa a la vez.
                    primary_channel
                        .basic_qos(1, BasicQosOptions::default())
                        .await?;

                    info!("📡 [BROKER]: AMQP uplink established as [{}].", role_label);
                    return Ok(Self { amqp_connection, primary_channel });
                }
                Err(connection_fault) => {
                    if attempt_number >= MAX_CONNECTION_ATTEMPTS {
                        error!("💀 [BROKER]: Uplink budget exhausted: {}", connection_fault);
                        return Err(BrokerError::ConnectionError(connection_fault.to_string()));
                    }

                    let retry_delay = reconnect_delay(attempt_number - 1);
                    warn!(
                        "⚠️ [BROKER]: Uplink failed ({}). Retrying in {:?}...",
                        connection_fault, retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.primary_channel
    }

    pub fn is_connected(&self) -> bool {
        self.amqp_connection.status().connected()
    }

    /// Declara una cola durable con los argumentos del plano de control.
    pub async fn declare_queue(&self, queue_name: &str) -> Result<(), BrokerError> {
        self.primary_channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() },
                durable_queue_arguments(),
            )
            .await?;
        Ok(())
    }

    /// Declara la topología completa (idempotente tras cada reconexión).
    pub async fn declare_topology(&self, topology: &QueueTopology) -> Result<(), BrokerError> {
        for queue_name in topology.all_queues() {
            self.declare_queue(queue_name).await?;
        }
        info!("🗺️  [BROKER]: Queue topology levelized (7 queues).");
        Ok(())
    }

    /// Cierre ordenado del canal y la conexión física.
    pub async fn close(self) -> Result<(), BrokerError> {
        let _ = self.primary_channel.close(200, "bye").await;
        self.amqp_connection
            .close(200, "bye")
            .await
            .map_err(BrokerError::from)?;
        info!("👋 [BROKER]: AMQP uplink closed gracefully.");
        Ok(())
    }
}
