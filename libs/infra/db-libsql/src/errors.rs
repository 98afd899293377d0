// [libs/infra/db-libsql/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V4.3 - CONTROL PLANE)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONFLICT AWARENESS: Distingue el conflicto de escaneo activo y el
 *    duplicado de objetivo para su mapeo directo al código 409.
 * 2. CAS SEMANTICS: 'StaleTransition' señala una carrera perdida de
 *    compare-and-set; el llamador decide entre ignorar o recargar.
 * 3. PANOPTICON COMPLIANCE: Mensajes con prefijos de estrato para su
 *    renderizado cromático en el Dashboard.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (Variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE CONTROL DE ESCANEOS ---

    /// La fila solicitada no existe en las tablas vivas.
    #[error("[L3_SCAN_FAULT]: IDENTIFIER_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Compare-and-set perdido: otro escritor avanzó el estado primero.
    #[error("[L3_SCAN_FAULT]: STALE_STATUS_TRANSITION")]
    StaleTransition,

    /// El objetivo ya posee un escaneo en estado no terminal.
    #[error("[L3_SCAN_FAULT]: ACTIVE_SCAN_CONFLICT")]
    ActiveScanConflict,

    // --- ESTRATO DE GOBERNANZA DE INVENTARIO ---

    /// Ya existe un objetivo vivo con la misma (customer, address).
    #[error("[L3_INVENTORY_FAULT]: TARGET_DUPLICATE")]
    DuplicateTarget,

    /// Colisión de nombre único (scan-type o port-list).
    #[error("[L3_INVENTORY_FAULT]: NAME_ALREADY_TAKEN -> {0}")]
    DuplicateName(String),
}
