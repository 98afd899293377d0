// [libs/infra/gateway-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY CLIENT ROOT (V4.0 - UPLINK SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DEL TÚNEL WORKER -> NÚCLEO
 * =================================================================
 */

pub mod client;
pub mod errors;

pub use client::{
    FingerprintUploadRow, GatewayClient, VulnEngineProgressPayload, VulnEngineResultsPayload,
};
pub use errors::ClientError;
