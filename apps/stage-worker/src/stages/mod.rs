// [apps/stage-worker/src/stages/mod.rs]
/*!
 * =================================================================
 * APARATO: STAGE EXECUTOR REGISTRY (V4.1 - CLOSED STAGE SET)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CONTRATO DE EJECUTORES Y TAXONOMÍA DE FALLOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CLOSED SET: Seis ejecutores, uno por etapa del pipeline; el
 *    conjunto es cerrado y el selector '--stage' es un enum.
 * 2. FAILURE TAXONOMY: 'Permanent' sella el escaneo en Failed y
 *    descarta la entrega; 'Transient' re-encola sin emitir veredicto.
 * =================================================================
 */

pub mod fingerprint;
pub mod nmap;
pub mod report;
pub mod vuln_engine;
pub mod vuln_lookup;
pub mod web;

use crate::config::WorkerSettings;
use crate::runtime::StatusEmitter;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use vapter_domain_models::{StageModule, StageRequest};
use vapter_infra_gateway_client::{ClientError, GatewayClient};

/// Fallo de etapa con destino de entrega implícito.
#[derive(Error, Debug)]
pub enum StageFailure {
    /// Herramienta colapsada, salida imparseable o rechazo 4xx del
    /// núcleo: el escaneo se sella en Failed y la entrega se descarta.
    #[error("[L1_STAGE_FAULT]: PERMANENT -> {0}")]
    Permanent(String),

    /// Avería de infraestructura (broker, red, 5xx agotado antes de
    /// empezar): la entrega se re-encola sin veredicto terminal.
    #[error("[L1_STAGE_FAULT]: TRANSIENT -> {0}")]
    Transient(String),
}

impl From<ClientError> for StageFailure {
    fn from(uplink_fault: ClientError) -> Self {
        match uplink_fault {
            // El presupuesto de reintentos del túnel ya fue consumido.
            ClientError::RetriesExhausted(path) => {
                StageFailure::Permanent(format!("gateway retries exhausted on {}", path))
            }
            ClientError::NotFound(path) => {
                StageFailure::Permanent(format!("gateway resource missing: {}", path))
            }
            ClientError::ServerRejection { status, body } => {
                StageFailure::Permanent(format!("gateway rejection HTTP_{}: {}", status, body))
            }
            ClientError::SchemaDrift(drift) => {
                StageFailure::Permanent(format!("gateway schema drift: {}", drift))
            }
            ClientError::NetworkFault(transport) => {
                StageFailure::Transient(format!("gateway transport fault: {}", transport))
            }
        }
    }
}

/// Contexto inyectado a cada ejecución de etapa.
pub struct StageContext<'a> {
    pub request: &'a StageRequest,
    pub gateway: &'a GatewayClient,
    pub settings: &'a WorkerSettings,
    pub status_emitter: &'a StatusEmitter,
}

/// Contrato soberano de un ejecutor de etapa.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Etapa del pipeline que este ejecutor sirve.
    fn module(&self) -> StageModule;

    /// Timeout duro de pared para una invocación completa.
    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration;

    /**
     * Ejecuta la etapa: insumos -> herramienta -> parseo -> carga.
     * El runtime envuelve la llamada en el timeout duro y emite los
     * veredictos terminales ('completed'/'failed') según el resultado.
     */
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure>;
}
