// [libs/infra/db-libsql/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ADAPTER ROOT (V4.0 - LEDGER DE EVALUACIÓN)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DEL CLIENTE Y REPOSITORIOS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::LedgerClient;
pub use errors::DbError;
