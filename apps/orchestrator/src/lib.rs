// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V4.0 - COMMAND CENTER)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-APP)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE MÓDULOS DEL CENTRO DE MANDO
 * =================================================================
 */

pub mod handlers;
pub mod kernel;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::AppState;
}
