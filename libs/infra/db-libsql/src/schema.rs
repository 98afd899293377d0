// [libs/infra/db-libsql/src/schema.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE DATABASE SCHEMA (V4.2 - ASSESSMENT STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. OWNERSHIP CASCADE: Customer -> Target -> Scan -> (Detail,
 *    Fingerprints, VulnEngineResult) con borrado en cascada.
 * 2. SOFT DELETE: 'deleted_at' uniforme; las consultas por defecto
 *    filtran filas ocultas sin romper la historia referencial.
 * 3. PARTIAL UNIQUENESS: Unicidad de (customer, address) únicamente
 *    entre objetivos vivos mediante índice parcial.
 * 4. PERFORMANCE: Índices de aceleración para el reconciliador y las
 *    consultas de huellas por puerto.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 */
const CONTROL_PLANE_TABLES: &[(&str, &str)] = &[
    ("TABLE_CUSTOMER", r#"
        CREATE TABLE IF NOT EXISTS customer (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            company_name TEXT,
            email TEXT NOT NULL,
            phone TEXT,
            contact_person TEXT,
            address TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_PORT_LIST", r#"
        CREATE TABLE IF NOT EXISTS port_list (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            tcp_ports TEXT,
            udp_ports TEXT,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_SCAN_TYPE", r#"
        CREATE TABLE IF NOT EXISTS scan_type (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            only_discovery INTEGER NOT NULL DEFAULT 0,
            consider_alive INTEGER NOT NULL DEFAULT 0,
            be_quiet INTEGER NOT NULL DEFAULT 0,
            port_list_id TEXT REFERENCES port_list(id) ON DELETE SET NULL,
            plugin_fingerprint INTEGER NOT NULL DEFAULT 0,
            plugin_vuln_engine INTEGER NOT NULL DEFAULT 0,
            plugin_web INTEGER NOT NULL DEFAULT 0,
            plugin_vuln_lookup INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_TARGET", r#"
        CREATE TABLE IF NOT EXISTS target (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customer(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_SCAN", r#"
        CREATE TABLE IF NOT EXISTS scan (
            id TEXT PRIMARY KEY,
            target_id TEXT NOT NULL REFERENCES target(id) ON DELETE CASCADE,
            scan_type_id TEXT NOT NULL REFERENCES scan_type(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'Pending',
            initiated_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            parsed_nmap_results TEXT,
            parsed_fingerprint_results TEXT,
            parsed_vuln_engine_results TEXT,
            parsed_web_results TEXT,
            parsed_vuln_lookup_results TEXT,
            error_message TEXT,
            report_path TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_SCAN_DETAIL", r#"
        CREATE TABLE IF NOT EXISTS scan_detail (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL UNIQUE REFERENCES scan(id) ON DELETE CASCADE,
            open_ports TEXT,
            os_guess TEXT,
            nmap_started_at TEXT,
            nmap_completed_at TEXT,
            fingerprint_started_at TEXT,
            fingerprint_completed_at TEXT,
            vuln_engine_started_at TEXT,
            vuln_engine_completed_at TEXT,
            web_started_at TEXT,
            web_completed_at TEXT,
            vuln_lookup_started_at TEXT,
            vuln_lookup_completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_FINGERPRINT_DETAIL", r#"
        CREATE TABLE IF NOT EXISTS fingerprint_detail (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL REFERENCES scan(id) ON DELETE CASCADE,
            target_id TEXT NOT NULL REFERENCES target(id) ON DELETE CASCADE,
            port INTEGER NOT NULL,
            protocol TEXT NOT NULL DEFAULT 'tcp',
            service_name TEXT,
            service_product TEXT,
            service_version TEXT,
            service_info TEXT,
            fingerprint_method TEXT NOT NULL,
            confidence_score INTEGER NOT NULL DEFAULT 0,
            raw_response TEXT,
            additional_info TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
    "#),
    ("TABLE_VULN_ENGINE_RESULT", r#"
        CREATE TABLE IF NOT EXISTS vuln_engine_result (
            id TEXT PRIMARY KEY,
            scan_id TEXT NOT NULL UNIQUE REFERENCES scan(id) ON DELETE CASCADE,
            target_id TEXT NOT NULL REFERENCES target(id) ON DELETE CASCADE,
            external_task_id TEXT,
            external_report_id TEXT,
            external_target_id TEXT,
            external_status TEXT NOT NULL DEFAULT 'Requested',
            progress INTEGER NOT NULL DEFAULT 0,
            report_format TEXT NOT NULL DEFAULT 'XML',
            full_report TEXT,
            vulnerability_count TEXT,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: ACELERACIÓN (Índices de Despacho y Consulta)
 */
const ACCELERATION_INDICES: &[(&str, &str)] = &[
    ("IDX_TARGET_LIVE_UNIQUENESS",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_target_customer_address \
         ON target(customer_id, address) WHERE deleted_at IS NULL;"),
    ("IDX_TARGET_CUSTOMER",
        "CREATE INDEX IF NOT EXISTS idx_target_customer ON target(customer_id);"),
    ("IDX_SCAN_TARGET_STATUS",
        "CREATE INDEX IF NOT EXISTS idx_scan_target_status ON scan(target_id, status);"),
    ("IDX_SCAN_INITIATED",
        "CREATE INDEX IF NOT EXISTS idx_scan_initiated ON scan(initiated_at);"),
    ("IDX_FINGERPRINT_SCAN_PORT",
        "CREATE INDEX IF NOT EXISTS idx_fingerprint_scan_port ON fingerprint_detail(scan_id, port);"),
    ("IDX_FINGERPRINT_TARGET_PORT",
        "CREATE INDEX IF NOT EXISTS idx_fingerprint_target_port ON fingerprint_detail(target_id, port);"),
];

/**
 * Aplica el esquema completo del plano de control de forma idempotente.
 *
 * # Errors:
 * Propaga el primer fallo estructural con el nombre del aparato SQL.
 */
#[instrument(skip(database_connection))]
pub async fn apply_control_plane_schema(database_connection: &Connection) -> Result<()> {
    for (table_label, table_sql) in CONTROL_PLANE_TABLES {
        debug!("🧱 [SCHEMA]: Solidifying {}", table_label);
        database_connection
            .execute(*table_sql, ())
            .await
            .with_context(|| format!("SCHEMA_FAULT at {}", table_label))?;
    }

    for (index_label, index_sql) in ACCELERATION_INDICES {
        database_connection
            .execute(*index_sql, ())
            .await
            .with_context(|| format!("INDEX_FAULT at {}", index_label))?;
    }

    info!("🗄️  [SCHEMA]: Control plane strata levelized ({} tables, {} indices).",
        CONTROL_PLANE_TABLES.len(), ACCELERATION_INDICES.len());

    Ok(())
}
