// [libs/infra/db-libsql/src/repositories/scan_detail.rs]
/*!
 * =================================================================
 * APARATO: SCAN DETAIL REPOSITORY (V4.2 - CHRONOMETRY VAULT)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ARTEFACTOS DERIVADOS Y CRONOMETRÍA POR ETAPA
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{json_text, now_text, optional_json, optional_timestamp, required_text};
use libsql::params;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;
use vapter_domain_models::{ScanDetail, StageModule};

const SELECT_COLUMNS: &str =
    "id, scan_id, open_ports, os_guess, \
     nmap_started_at, nmap_completed_at, \
     fingerprint_started_at, fingerprint_completed_at, \
     vuln_engine_started_at, vuln_engine_completed_at, \
     web_started_at, web_completed_at, \
     vuln_lookup_started_at, vuln_lookup_completed_at";

/// Pareja de columnas de cronometría asociada a una etapa.
/// El reporte no posee cronometría propia en el detalle.
fn stage_timing_columns(stage_module: StageModule) -> Option<(&'static str, &'static str)> {
    match stage_module {
        StageModule::Nmap => Some(("nmap_started_at", "nmap_completed_at")),
        StageModule::Fingerprint => Some(("fingerprint_started_at", "fingerprint_completed_at")),
        StageModule::VulnEngine => Some(("vuln_engine_started_at", "vuln_engine_completed_at")),
        StageModule::Web => Some(("web_started_at", "web_completed_at")),
        StageModule::VulnLookup => Some(("vuln_lookup_started_at", "vuln_lookup_completed_at")),
        StageModule::Report => None,
    }
}

pub struct ScanDetailRepository {
    database_client: LedgerClient,
}

impl ScanDetailRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Materializa el registro 1:1 si aún no existe (idempotente).
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, scan_identifier: &str) -> Result<ScanDetail, DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT INTO scan_detail (id, scan_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3) \
                 ON CONFLICT(scan_id) DO NOTHING",
                params![Uuid::new_v4().to_string(), scan_identifier, now_text()],
            )
            .await?;

        self.fetch_by_scan(scan_identifier)
            .await?
            .ok_or_else(|| DbError::NotFound(scan_identifier.into()))
    }

    pub async fn fetch_by_scan(&self, scan_identifier: &str) -> Result<Option<ScanDetail>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {} FROM scan_detail WHERE scan_id = ?1", SELECT_COLUMNS),
                params![scan_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_scan_detail_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Persiste los artefactos derivados del descubrimiento.
    #[instrument(skip(self, open_ports_artifact, os_guess_artifact))]
    pub async fn set_derived_artifacts(
        &self,
        scan_identifier: &str,
        open_ports_artifact: &Value,
        os_guess_artifact: Option<&Value>,
    ) -> Result<(), DbError> {
        self.get_or_create(scan_identifier).await?;

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE scan_detail SET open_ports = ?2, os_guess = ?3, updated_at = ?4 \
                 WHERE scan_id = ?1",
                params![
                    scan_identifier,
                    json_text(open_ports_artifact),
                    os_guess_artifact.map(json_text),
                    now_text()
                ],
            )
            .await?;

        info!("🧩 [SCAN_DETAIL]: Derived artifacts sealed for [{}].", scan_identifier);
        Ok(())
    }

    /// Sella el arranque de una etapa si aún no fue sellado.
    pub async fn stamp_stage_started(
        &self,
        scan_identifier: &str,
        stage_module: StageModule,
    ) -> Result<(), DbError> {
        let Some((started_column, _)) = stage_timing_columns(stage_module) else {
            return Ok(());
        };

        self.get_or_create(scan_identifier).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                &format!(
                    "UPDATE scan_detail SET {0} = COALESCE({0}, ?2), updated_at = ?2 \
                     WHERE scan_id = ?1",
                    started_column
                ),
                params![scan_identifier, now_text()],
            )
            .await?;
        Ok(())
    }

    /// Sella la finalización de una etapa.
    pub async fn stamp_stage_completed(
        &self,
        scan_identifier: &str,
        stage_module: StageModule,
    ) -> Result<(), DbError> {
        let Some((_, completed_column)) = stage_timing_columns(stage_module) else {
            return Ok(());
        };

        self.get_or_create(scan_identifier).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                &format!(
                    "UPDATE scan_detail SET {} = ?2, updated_at = ?2 WHERE scan_id = ?1",
                    completed_column
                ),
                params![scan_identifier, now_text()],
            )
            .await?;
        Ok(())
    }

    /// Borrado físico del detalle (protocolo de reinicio de escaneo).
    #[instrument(skip(self))]
    pub async fn delete_for_scan(&self, scan_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute("DELETE FROM scan_detail WHERE scan_id = ?1", params![scan_identifier])
            .await?;
        Ok(())
    }

    pub async fn fetch(&self, detail_identifier: &str) -> Result<ScanDetail, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {} FROM scan_detail WHERE id = ?1", SELECT_COLUMNS),
                params![detail_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_scan_detail_row(&data_row),
            None => Err(DbError::NotFound(detail_identifier.into())),
        }
    }

    pub async fn delete_by_id(&self, detail_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute("DELETE FROM scan_detail WHERE id = ?1", params![detail_identifier])
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(detail_identifier.into()));
        }
        Ok(())
    }

    /// Listado plano, opcionalmente filtrado por escaneo.
    pub async fn list(&self, scan_filter: Option<&str>) -> Result<Vec<ScanDetail>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM scan_detail \
                     WHERE scan_id = COALESCE(?1, scan_id) ORDER BY created_at DESC",
                    SELECT_COLUMNS
                ),
                params![scan_filter],
            )
            .await?;

        let mut details = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            details.push(map_scan_detail_row(&data_row)?);
        }
        Ok(details)
    }
}

fn map_scan_detail_row(data_row: &libsql::Row) -> Result<ScanDetail, DbError> {
    Ok(ScanDetail {
        id: required_text(data_row, 0)?,
        scan_id: required_text(data_row, 1)?,
        open_ports: optional_json(data_row, 2)?,
        os_guess: optional_json(data_row, 3)?,
        nmap_started_at: optional_timestamp(data_row, 4)?,
        nmap_completed_at: optional_timestamp(data_row, 5)?,
        fingerprint_started_at: optional_timestamp(data_row, 6)?,
        fingerprint_completed_at: optional_timestamp(data_row, 7)?,
        vuln_engine_started_at: optional_timestamp(data_row, 8)?,
        vuln_engine_completed_at: optional_timestamp(data_row, 9)?,
        web_started_at: optional_timestamp(data_row, 10)?,
        web_completed_at: optional_timestamp(data_row, 11)?,
        vuln_lookup_started_at: optional_timestamp(data_row, 12)?,
        vuln_lookup_completed_at: optional_timestamp(data_row, 13)?,
    })
}
