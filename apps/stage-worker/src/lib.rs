// [apps/stage-worker/src/lib.rs]
/*!
 * =================================================================
 * APARATO: STAGE WORKER LIBRARY ROOT (V4.0 - EL SOLDADO)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE CONFIG, RUNTIME Y EJECUTORES
 * =================================================================
 */

pub mod config;
pub mod runtime;
pub mod stages;
