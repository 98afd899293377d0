// [apps/orchestrator/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATION SERVICES REGISTRY (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE SERVICIOS Y FALLOS DE ORQUESTACIÓN
 * =================================================================
 */

pub mod dispatcher;
pub mod nmap_ingestion;
pub mod reconciler;
pub mod state_machine;
pub mod status_consumer;
pub mod vuln_report;

use thiserror::Error;
use vapter_infra_broker::BrokerError;
use vapter_infra_db::DbError;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// Fallo del Ledger de Evaluación durante la orquestación.
    #[error("[L4_ORCH_FAULT]: LEDGER -> {0}")]
    Ledger(#[from] DbError),

    /// Fallo de la arteria de mensajería durante el despacho.
    #[error("[L4_ORCH_FAULT]: BROKER -> {0}")]
    Broker(#[from] BrokerError),

    /// Artefacto de dominio malformado en la ingesta.
    #[error("[L4_ORCH_FAULT]: ARTIFACT -> {0}")]
    Artifact(String),
}
