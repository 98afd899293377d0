// [libs/infra/db-libsql/src/repositories/vuln_engine.rs]
/*!
 * =================================================================
 * APARATO: VULN ENGINE RESULT REPOSITORY (V4.2 - UPSERT DISCIPLINE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PROGRESO Y REPORTE DEL MOTOR EXTERNO (1:1 CON SCAN)
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{
    now_text, optional_text, optional_timestamp, required_integer, required_text,
    required_timestamp,
};
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;
use vapter_domain_models::{ReportFormat, VulnEngineResult, VulnerabilityCount};

const SELECT_COLUMNS: &str =
    "id, scan_id, target_id, external_task_id, external_report_id, external_target_id, \
     external_status, progress, report_format, full_report, vulnerability_count, \
     started_at, completed_at, created_at, updated_at";

/// Reporte final entrante del worker del motor externo.
#[derive(Debug, Clone)]
pub struct VulnEngineReportUpload {
    pub scan_id: String,
    pub target_id: String,
    pub external_task_id: Option<String>,
    pub external_report_id: Option<String>,
    pub external_target_id: Option<String>,
    pub report_format: ReportFormat,
    pub full_report: String,
    pub vulnerability_count: VulnerabilityCount,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct VulnEngineResultRepository {
    database_client: LedgerClient,
}

impl VulnEngineResultRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Upsert de progreso periódico (fila creada en el primer latido).
    #[instrument(skip(self))]
    pub async fn upsert_progress(
        &self,
        scan_identifier: &str,
        target_identifier: &str,
        external_task_id: Option<&str>,
        external_status: &str,
        progress: u8,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let bounded_progress = progress.min(100) as i64;

        connection
            .execute(
                "INSERT INTO vuln_engine_result \
                 (id, scan_id, target_id, external_task_id, external_status, progress, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
                 ON CONFLICT(scan_id) DO UPDATE SET \
                   external_task_id = COALESCE(excluded.external_task_id, external_task_id), \
                   external_status = excluded.external_status, \
                   progress = excluded.progress, \
                   updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    scan_identifier,
                    target_identifier,
                    external_task_id,
                    external_status,
                    bounded_progress,
                    now_text()
                ],
            )
            .await?;

        Ok(())
    }

    /// Sella el reporte final y los identificadores del motor.
    #[instrument(skip(self, report_upload), fields(scan_id = %report_upload.scan_id))]
    pub async fn store_report(
        &self,
        report_upload: VulnEngineReportUpload,
    ) -> Result<VulnEngineResult, DbError> {
        let connection = self.database_client.get_connection()?;
        let vulnerability_count_json = serde_json::to_string(&report_upload.vulnerability_count)
            .map_err(|e| DbError::MappingError(e.to_string()))?;

        connection
            .execute(
                "INSERT INTO vuln_engine_result \
                 (id, scan_id, target_id, external_task_id, external_report_id, external_target_id, \
                  external_status, progress, report_format, full_report, vulnerability_count, \
                  started_at, completed_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'Done', 100, ?7, ?8, ?9, ?10, ?11, ?12, ?12) \
                 ON CONFLICT(scan_id) DO UPDATE SET \
                   external_task_id = COALESCE(excluded.external_task_id, external_task_id), \
                   external_report_id = excluded.external_report_id, \
                   external_target_id = excluded.external_target_id, \
                   external_status = 'Done', \
                   progress = 100, \
                   report_format = excluded.report_format, \
                   full_report = excluded.full_report, \
                   vulnerability_count = excluded.vulnerability_count, \
                   started_at = COALESCE(excluded.started_at, started_at), \
                   completed_at = excluded.completed_at, \
                   updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    report_upload.scan_id.clone(),
                    report_upload.target_id,
                    report_upload.external_task_id,
                    report_upload.external_report_id,
                    report_upload.external_target_id,
                    report_upload.report_format.as_str(),
                    report_upload.full_report,
                    vulnerability_count_json,
                    report_upload.started_at.map(|t| t.to_rfc3339()),
                    report_upload.completed_at.map(|t| t.to_rfc3339()),
                    now_text()
                ],
            )
            .await?;

        info!("🧪 [VULN_ENGINE]: Report sealed for scan [{}].", report_upload.scan_id);
        self.fetch_by_scan(&report_upload.scan_id)
            .await?
            .ok_or_else(|| DbError::NotFound(report_upload.scan_id))
    }

    pub async fn fetch_by_scan(
        &self,
        scan_identifier: &str,
    ) -> Result<Option<VulnEngineResult>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {} FROM vuln_engine_result WHERE scan_id = ?1", SELECT_COLUMNS),
                params![scan_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_result_row(&data_row)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch(&self, result_identifier: &str) -> Result<VulnEngineResult, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {} FROM vuln_engine_result WHERE id = ?1", SELECT_COLUMNS),
                params![result_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_result_row(&data_row),
            None => Err(DbError::NotFound(result_identifier.into())),
        }
    }

    pub async fn list(&self) -> Result<Vec<VulnEngineResult>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM vuln_engine_result ORDER BY created_at DESC",
                    SELECT_COLUMNS
                ),
                (),
            )
            .await?;

        let mut results = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            results.push(map_result_row(&data_row)?);
        }
        Ok(results)
    }
}

fn map_result_row(data_row: &libsql::Row) -> Result<VulnEngineResult, DbError> {
    let report_format = match optional_text(data_row, 8)?.as_deref() {
        Some("JSON") => ReportFormat::Json,
        _ => ReportFormat::Xml,
    };

    let vulnerability_count = match optional_text(data_row, 10)? {
        Some(count_json) => serde_json::from_str(&count_json)
            .map_err(|e| DbError::MappingError(format!("vulnerability_count: {}", e)))?,
        None => VulnerabilityCount::default(),
    };

    Ok(VulnEngineResult {
        id: required_text(data_row, 0)?,
        scan_id: required_text(data_row, 1)?,
        target_id: required_text(data_row, 2)?,
        external_task_id: optional_text(data_row, 3)?,
        external_report_id: optional_text(data_row, 4)?,
        external_target_id: optional_text(data_row, 5)?,
        external_status: required_text(data_row, 6)?,
        progress: required_integer(data_row, 7)? as u8,
        report_format,
        full_report: optional_text(data_row, 9)?,
        vulnerability_count,
        started_at: optional_timestamp(data_row, 11)?,
        completed_at: optional_timestamp(data_row, 12)?,
        created_at: required_timestamp(data_row, 13)?,
        updated_at: required_timestamp(data_row, 14)?,
    })
}
