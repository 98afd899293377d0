// [libs/infra/gateway-client/src/errors.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY CLIENT ERROR CATALOG (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE UPLINK
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Fallo físico de red o timeout del cliente HTTP.
    #[error("[L3_UPLINK_NET_FAULT]: GATEWAY_UNREACHABLE -> {0}")]
    NetworkFault(#[from] reqwest::Error),

    /// El núcleo rechazó la operación con un código no exitoso.
    #[error("[L3_UPLINK_FAULT]: SERVER_REJECTION -> HTTP_{status} {body}")]
    ServerRejection { status: u16, body: String },

    /// El recurso consultado no existe en el plano de control.
    #[error("[L3_UPLINK_FAULT]: RESOURCE_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Presupuesto de reintentos agotado contra fallos 5xx/transporte.
    #[error("[L3_UPLINK_FAULT]: RETRIES_EXHAUSTED -> {0}")]
    RetriesExhausted(String),

    /// Cuerpo de respuesta imposible de deserializar al dominio.
    #[error("[L3_UPLINK_FAULT]: RESPONSE_SCHEMA_DRIFT -> {0}")]
    SchemaDrift(#[from] serde_json::Error),
}
