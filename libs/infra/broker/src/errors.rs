// [libs/infra/broker/src/errors.rs]
/*!
 * =================================================================
 * APARATO: BROKER ERROR CATALOG (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE MENSAJERÍA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// Enlace físico con el broker severado o nunca establecido.
    #[error("[L3_BROKER_NET_FAULT]: AMQP_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo del protocolo AMQP (canal, declaración, publicación).
    #[error("[L3_BROKER_PROTO_FAULT]: AMQP_OPERATION_REJECTED -> {0}")]
    ProtocolError(#[from] lapin::Error),

    /// Agotamiento del presupuesto de reintentos de publicación.
    #[error("[L3_BROKER_FAULT]: PUBLISH_RETRIES_EXHAUSTED -> queue {0}")]
    PublishExhausted(String),

    /// Payload imposible de serializar hacia el cable.
    #[error("[L3_BROKER_FAULT]: PAYLOAD_SERIALIZATION_COLLAPSE -> {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuración de entorno ausente o malformada.
    #[error("[L3_BROKER_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),
}
