// [libs/infra/db-libsql/src/repositories/scan.rs]
/*!
 * =================================================================
 * APARATO: SCAN REPOSITORY (V4.5 - CAS LATTICE GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE ESCANEOS Y TRANSICIONES ATÓMICAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPARE-AND-SET: Toda escritura que avanza 'status' está condicionada
 *    al estado esperado; una carrera perdida retorna 'StaleTransition'
 *    sin tocar la fila.
 * 2. SINGLE ACTIVE SCAN: La creación verifica dentro de una transacción
 *    que el objetivo no posea escaneos no terminales.
 * 3. RESTART HYGIENE: El reinicio limpia artefactos, cronometría y
 *    mensaje de error en una única secuencia atómica.
 *
 * # Mathematical Proof (Lost Update Exclusion):
 * Sea W el conjunto de escritores concurrentes sobre un escaneo. El
 * predicado 'WHERE status = expected' serializa los avances: a lo sumo
 * un escritor observa rows_affected = 1; el resto recibe el veredicto
 * de obsolescencia y no puede regresar el estado.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{
    json_text, now_text, optional_json, optional_text, optional_timestamp, required_text,
    required_timestamp, ListQuery, Paged,
};
use chrono::{DateTime, Utc};
use libsql::params;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use vapter_domain_models::{Scan, ScanStatus, StageModule};

const SELECT_COLUMNS: &str =
    "id, target_id, scan_type_id, status, initiated_at, started_at, completed_at, \
     parsed_nmap_results, parsed_fingerprint_results, parsed_vuln_engine_results, \
     parsed_web_results, parsed_vuln_lookup_results, error_message, report_path, \
     created_at, updated_at, deleted_at";

const ORDERABLE_COLUMNS: &[&str] = &["initiated_at", "completed_at", "status"];

/// Filtros de listado del perímetro HTTP (campos + rangos temporales).
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    pub status: Option<String>,
    pub target_id: Option<String>,
    pub customer_id: Option<String>,
    pub initiated_after: Option<DateTime<Utc>>,
    pub initiated_before: Option<DateTime<Utc>>,
    pub completed_after: Option<DateTime<Utc>>,
    pub completed_before: Option<DateTime<Utc>>,
}

/// Distribución agregada de estados para los endpoints de estadísticas.
#[derive(Debug, Clone)]
pub struct ScanStatistics {
    pub total_scans: u64,
    pub status_distribution: Vec<(String, u64)>,
    pub recent_scans: Vec<Scan>,
}

pub struct ScanRepository {
    database_client: LedgerClient,
}

impl ScanRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /**
     * Forja un escaneo nuevo en 'Pending' bajo exclusión de concurrencia.
     *
     * # Errors:
     * - `DbError::ActiveScanConflict`: el objetivo ya tiene un escaneo
     *   en estado no terminal (mapea a 409).
     * - `DbError::TransactionError`: colapso de la secuencia atómica.
     */
    #[instrument(skip(self))]
    pub async fn create(&self, target_identifier: &str, scan_type_identifier: &str) -> Result<Scan, DbError> {
        let connection = self.database_client.get_connection()?;

        let database_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut active_scan_result = database_transaction
            .query(
                "SELECT COUNT(*) FROM scan WHERE target_id = ?1 AND deleted_at IS NULL \
                 AND status NOT IN ('Completed', 'Failed')",
                params![target_identifier],
            )
            .await?;

        let active_scan_count = active_scan_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);

        if active_scan_count > 0 {
            warn!("⛔ [SCAN_CONFLICT]: Target [{}] already owns a live scan.", target_identifier);
            return Err(DbError::ActiveScanConflict);
        }

        let scan_identifier = Uuid::new_v4().to_string();
        let genesis_timestamp = now_text();

        database_transaction
            .execute(
                "INSERT INTO scan (id, target_id, scan_type_id, status, initiated_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 'Pending', ?4, ?4, ?4)",
                params![
                    scan_identifier.clone(),
                    target_identifier,
                    scan_type_identifier,
                    genesis_timestamp
                ],
            )
            .await?;

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!("🛰️  [SCAN]: Scan [{}] forged in Pending strata.", scan_identifier);
        self.fetch(&scan_identifier).await
    }

    pub async fn fetch(&self, scan_identifier: &str) -> Result<Scan, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM scan WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![scan_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_scan_row(&data_row),
            None => Err(DbError::NotFound(scan_identifier.into())),
        }
    }

    /**
     * Avance atómico de estado condicionado al estado esperado.
     *
     * # Errors:
     * - `DbError::StaleTransition`: otro escritor avanzó primero; la fila
     *   no fue modificada y el llamador NO debe reintentar a ciegas.
     */
    #[instrument(skip(self))]
    pub async fn compare_and_set_status(
        &self,
        scan_identifier: &str,
        expected_status: ScanStatus,
        next_status: ScanStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET status = ?3, updated_at = ?4 \
                 WHERE id = ?1 AND status = ?2 AND deleted_at IS NULL",
                params![
                    scan_identifier,
                    expected_status.as_str(),
                    next_status.as_str(),
                    now_text()
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::StaleTransition);
        }

        info!("🔄 [SCAN_SHIFT]: [{}] {} -> {}", scan_identifier, expected_status, next_status);
        Ok(())
    }

    /// CAS 'Pending -> Queued' sellando el instante de arranque.
    pub async fn mark_queued(&self, scan_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET status = 'Queued', started_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND status = 'Pending' AND deleted_at IS NULL",
                params![scan_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::StaleTransition);
        }
        Ok(())
    }

    /**
     * Transición terminal a 'Failed' desde cualquier estado no terminal.
     * Sella 'completed_at' y el mensaje de error (invariante de fallo).
     * Retorna false si el escaneo ya era terminal (señal tardía).
     */
    #[instrument(skip(self, error_message))]
    pub async fn mark_failed(
        &self,
        scan_identifier: &str,
        error_message: &str,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET status = 'Failed', error_message = ?2, completed_at = ?3, updated_at = ?3 \
                 WHERE id = ?1 AND status NOT IN ('Completed', 'Failed') AND deleted_at IS NULL",
                params![scan_identifier, error_message, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            warn!("🕸️  [SCAN_SHIFT]: Late failure for terminal scan [{}] discarded.", scan_identifier);
            return Ok(false);
        }

        info!("💀 [SCAN_FAILED]: [{}] -> Failed ({})", scan_identifier, error_message);
        Ok(true)
    }

    /// CAS hacia 'Completed' sellando 'completed_at'.
    pub async fn mark_completed(
        &self,
        scan_identifier: &str,
        expected_status: ScanStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET status = 'Completed', completed_at = ?3, updated_at = ?3 \
                 WHERE id = ?1 AND status = ?2 AND deleted_at IS NULL",
                params![scan_identifier, expected_status.as_str(), now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::StaleTransition);
        }
        info!("🏁 [SCAN_SEALED]: [{}] -> Completed", scan_identifier);
        Ok(())
    }

    /// Persiste el artefacto estructurado de una etapa (objeto o NULL).
    #[instrument(skip(self, stage_artifact))]
    pub async fn set_parsed_results(
        &self,
        scan_identifier: &str,
        stage_module: StageModule,
        stage_artifact: &Value,
    ) -> Result<(), DbError> {
        // El contrato exige objeto estructurado; un booleano centinela es
        // una malformación del worker.
        if stage_artifact.is_boolean() {
            return Err(DbError::MappingError(
                "parsed results must be an object, not a boolean flag".into(),
            ));
        }

        let column_name = stage_module.parsed_results_field();
        if stage_module == StageModule::Report {
            return Err(DbError::MappingError("report stage has no parsed results".into()));
        }

        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                &format!(
                    "UPDATE scan SET {} = ?2, updated_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
                    column_name
                ),
                params![scan_identifier, json_text(stage_artifact), now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(scan_identifier.into()));
        }
        Ok(())
    }

    pub async fn set_report_path(&self, scan_identifier: &str, report_path: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET report_path = ?2, updated_at = ?3 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![scan_identifier, report_path, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(scan_identifier.into()));
        }
        Ok(())
    }

    /**
     * Reinicio desde estado terminal: limpia artefactos, cronometría,
     * mensaje de error y ruta de reporte; regresa a 'Pending'.
     *
     * # Errors:
     * - `DbError::StaleTransition`: el escaneo no estaba en estado terminal.
     */
    #[instrument(skip(self))]
    pub async fn clear_for_restart(&self, scan_identifier: &str) -> Result<Scan, DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET status = 'Pending', started_at = NULL, completed_at = NULL, \
                 parsed_nmap_results = NULL, parsed_fingerprint_results = NULL, \
                 parsed_vuln_engine_results = NULL, parsed_web_results = NULL, \
                 parsed_vuln_lookup_results = NULL, error_message = NULL, report_path = NULL, \
                 updated_at = ?2 \
                 WHERE id = ?1 AND status IN ('Completed', 'Failed') AND deleted_at IS NULL",
                params![scan_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::StaleTransition);
        }

        info!("♻️  [SCAN_RESTART]: [{}] artifacts purged, back to Pending.", scan_identifier);
        self.fetch(scan_identifier).await
    }

    pub async fn soft_delete(&self, scan_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![scan_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(scan_identifier.into()));
        }
        Ok(())
    }

    /// Listado filtrado con rangos temporales '*_after'/'*_before'.
    pub async fn list(
        &self,
        list_query: &ListQuery,
        filters: &ScanFilters,
    ) -> Result<Paged<Scan>, DbError> {
        let connection = self.database_client.get_connection()?;
        let (limit, offset) = list_query.limit_offset();
        let order_clause = list_query.order_clause(ORDERABLE_COLUMNS, "initiated_at DESC");

        let where_clause = "deleted_at IS NULL \
             AND status = COALESCE(?1, status) \
             AND target_id = COALESCE(?2, target_id) \
             AND target_id IN (SELECT id FROM target WHERE customer_id = COALESCE(?3, customer_id)) \
             AND initiated_at >= COALESCE(?4, initiated_at) \
             AND initiated_at <= COALESCE(?5, initiated_at) \
             AND COALESCE(completed_at, '') >= COALESCE(?6, COALESCE(completed_at, '')) \
             AND COALESCE(completed_at, '9999') <= COALESCE(?7, COALESCE(completed_at, '9999'))";

        let build_filter_params = || {
            params![
                filters.status.clone(),
                filters.target_id.clone(),
                filters.customer_id.clone(),
                filters.initiated_after.map(|t| t.to_rfc3339()),
                filters.initiated_before.map(|t| t.to_rfc3339()),
                filters.completed_after.map(|t| t.to_rfc3339()),
                filters.completed_before.map(|t| t.to_rfc3339())
            ]
        };

        let mut total_result = connection
            .query(
                &format!("SELECT COUNT(*) FROM scan WHERE {}", where_clause),
                build_filter_params(),
            )
            .await?;
        let total = total_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0) as u64)
            .unwrap_or(0);

        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM scan WHERE {} {} LIMIT {} OFFSET {}",
                    SELECT_COLUMNS, where_clause, order_clause, limit, offset
                ),
                build_filter_params(),
            )
            .await?;

        let mut scans = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            scans.push(map_scan_row(&data_row)?);
        }

        Ok(Paged {
            items: scans,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    /// Estadísticas agregadas, opcionalmente restringidas a un cliente.
    pub async fn statistics(&self, customer_filter: Option<&str>) -> Result<ScanStatistics, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut distribution_result = connection
            .query(
                "SELECT status, COUNT(*) FROM scan WHERE deleted_at IS NULL \
                 AND target_id IN (SELECT id FROM target WHERE customer_id = COALESCE(?1, customer_id)) \
                 GROUP BY status",
                params![customer_filter],
            )
            .await?;

        let mut status_distribution = Vec::new();
        let mut total_scans = 0u64;
        while let Some(data_row) = distribution_result.next().await? {
            let status_label = required_text(&data_row, 0)?;
            let status_count = data_row.get::<i64>(1).unwrap_or(0) as u64;
            total_scans += status_count;
            status_distribution.push((status_label, status_count));
        }

        let mut recent_result = connection
            .query(
                &format!(
                    "SELECT {} FROM scan WHERE deleted_at IS NULL \
                     AND target_id IN (SELECT id FROM target WHERE customer_id = COALESCE(?1, customer_id)) \
                     ORDER BY initiated_at DESC LIMIT 10",
                    SELECT_COLUMNS
                ),
                params![customer_filter],
            )
            .await?;

        let mut recent_scans = Vec::new();
        while let Some(data_row) = recent_result.next().await? {
            recent_scans.push(map_scan_row(&data_row)?);
        }

        Ok(ScanStatistics { total_scans, status_distribution, recent_scans })
    }
}

fn map_scan_row(data_row: &libsql::Row) -> Result<Scan, DbError> {
    let status_label = required_text(data_row, 3)?;
    let status = ScanStatus::parse(&status_label)
        .ok_or_else(|| DbError::MappingError(format!("unknown scan status '{}'", status_label)))?;

    Ok(Scan {
        id: required_text(data_row, 0)?,
        target_id: required_text(data_row, 1)?,
        scan_type_id: required_text(data_row, 2)?,
        status,
        initiated_at: required_timestamp(data_row, 4)?,
        started_at: optional_timestamp(data_row, 5)?,
        completed_at: optional_timestamp(data_row, 6)?,
        parsed_nmap_results: optional_json(data_row, 7)?,
        parsed_fingerprint_results: optional_json(data_row, 8)?,
        parsed_vuln_engine_results: optional_json(data_row, 9)?,
        parsed_web_results: optional_json(data_row, 10)?,
        parsed_vuln_lookup_results: optional_json(data_row, 11)?,
        error_message: optional_text(data_row, 12)?,
        report_path: optional_text(data_row, 13)?,
        created_at: required_timestamp(data_row, 14)?,
        updated_at: required_timestamp(data_row, 15)?,
        deleted_at: optional_timestamp(data_row, 16)?,
    })
}
