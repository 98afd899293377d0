// [libs/infra/db-libsql/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V4.1 - ACCESS MATRIX)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE REPOSITORIOS Y UTILIDADES DE FILA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE AGGREGATE PER FILE: Cada agregado del dominio posee un único
 *    repositorio de autoridad con su catálogo SQL local.
 * 2. LISTING DISCIPLINE: Paginación 'page/page_size', búsqueda y
 *    ordenamiento con lista blanca de columnas (anti-inyección).
 * 3. ROW MAPPING: Transformación tolerante SQLite -> Dominio con fallos
 *    semánticos 'DbError::MappingError'.
 * =================================================================
 */

pub mod customer;
pub mod fingerprint;
pub mod port_list;
pub mod scan;
pub mod scan_detail;
pub mod scan_type;
pub mod target;
pub mod vuln_engine;

pub use customer::CustomerRepository;
pub use fingerprint::FingerprintRepository;
pub use port_list::PortListRepository;
pub use scan::ScanRepository;
pub use scan_detail::ScanDetailRepository;
pub use scan_type::ScanTypeRepository;
pub use target::TargetRepository;
pub use vuln_engine::VulnEngineResultRepository;

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Tope duro de página para proteger al Ledger de ráfagas abusivas.
const MAX_PAGE_SIZE: u64 = 200;
const DEFAULT_PAGE_SIZE: u64 = 50;

/// Parámetros de listado normalizados del perímetro HTTP.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub ordering: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    /// Resuelve (limit, offset) con página mínima 1 y tope de tamaño.
    pub fn limit_offset(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page_size, (page - 1) * page_size)
    }

    /// Construye la cláusula ORDER BY contra una lista blanca de columnas.
    /// El prefijo '-' solicita orden descendente.
    pub fn order_clause(&self, allowed_columns: &[&str], default_clause: &str) -> String {
        let Some(requested_ordering) = self.ordering.as_deref() else {
            return format!("ORDER BY {}", default_clause);
        };

        let (column_candidate, direction) = match requested_ordering.strip_prefix('-') {
            Some(descending_column) => (descending_column, "DESC"),
            None => (requested_ordering, "ASC"),
        };

        if allowed_columns.contains(&column_candidate) {
            format!("ORDER BY {} {}", column_candidate, direction)
        } else {
            // Columna fuera de la lista blanca: orden por defecto.
            format!("ORDER BY {}", default_clause)
        }
    }
}

/// Página materializada de un listado filtrado.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

// --- UTILIDADES DE MAPEO DE FILAS (SQLite -> Dominio) ---

pub(crate) fn required_text(data_row: &libsql::Row, column_index: i32) -> Result<String, DbError> {
    data_row
        .get::<String>(column_index)
        .map_err(|e| DbError::MappingError(format!("column {}: {}", column_index, e)))
}

pub(crate) fn optional_text(data_row: &libsql::Row, column_index: i32) -> Result<Option<String>, DbError> {
    data_row
        .get::<Option<String>>(column_index)
        .map_err(|e| DbError::MappingError(format!("column {}: {}", column_index, e)))
}

pub(crate) fn required_integer(data_row: &libsql::Row, column_index: i32) -> Result<i64, DbError> {
    data_row
        .get::<i64>(column_index)
        .map_err(|e| DbError::MappingError(format!("column {}: {}", column_index, e)))
}

pub(crate) fn flag(data_row: &libsql::Row, column_index: i32) -> Result<bool, DbError> {
    Ok(required_integer(data_row, column_index)? != 0)
}

pub(crate) fn required_timestamp(
    data_row: &libsql::Row,
    column_index: i32,
) -> Result<DateTime<Utc>, DbError> {
    let timestamp_text = required_text(data_row, column_index)?;
    parse_timestamp(&timestamp_text)
}

pub(crate) fn optional_timestamp(
    data_row: &libsql::Row,
    column_index: i32,
) -> Result<Option<DateTime<Utc>>, DbError> {
    match optional_text(data_row, column_index)? {
        Some(timestamp_text) => Ok(Some(parse_timestamp(&timestamp_text)?)),
        None => Ok(None),
    }
}

pub(crate) fn optional_json(
    data_row: &libsql::Row,
    column_index: i32,
) -> Result<Option<Value>, DbError> {
    match optional_text(data_row, column_index)? {
        Some(json_text) => serde_json::from_str(&json_text)
            .map(Some)
            .map_err(|e| DbError::MappingError(format!("json column {}: {}", column_index, e))),
        None => Ok(None),
    }
}

pub(crate) fn parse_timestamp(timestamp_text: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp_text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("timestamp '{}': {}", timestamp_text, e)))
}

pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn json_text(value: &Value) -> String {
    value.to_string()
}
