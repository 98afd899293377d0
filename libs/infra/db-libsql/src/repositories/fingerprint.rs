// [libs/infra/db-libsql/src/repositories/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT REPOSITORY (V4.1 - BULK INGESTION)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: HUELLAS POR PUERTO/SERVICIO Y AGREGADOS DE SERVICIO
 *
 * # Mathematical Proof (Batch Atomicity):
 * La ingesta masiva ocurre dentro de una única transacción: o bien las
 * N huellas del worker quedan selladas, o ninguna; un fallo parcial no
 * deja residuo observable para 'by_scan'.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{
    json_text, now_text, optional_json, optional_text, required_integer, required_text,
    required_timestamp, ListQuery, Paged,
};
use libsql::params;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;
use vapter_domain_models::{FingerprintDetail, Protocol};

const SELECT_COLUMNS: &str =
    "id, scan_id, target_id, port, protocol, service_name, service_product, \
     service_version, service_info, fingerprint_method, confidence_score, \
     raw_response, additional_info, created_at, updated_at";

const ORDERABLE_COLUMNS: &[&str] = &["port", "service_name", "confidence_score", "created_at"];

/// Huella entrante desde el worker (sin identidad ni cronometría).
#[derive(Debug, Clone)]
pub struct NewFingerprintDetail {
    pub scan_id: String,
    pub target_id: String,
    pub port: u16,
    pub protocol: Protocol,
    pub service_name: Option<String>,
    pub service_product: Option<String>,
    pub service_version: Option<String>,
    pub service_info: Option<String>,
    pub fingerprint_method: String,
    pub confidence_score: u8,
    pub raw_response: Option<String>,
    pub additional_info: Option<Value>,
}

/// Resumen agregado de servicios detectados.
#[derive(Debug, Clone)]
pub struct ServiceSummaryRow {
    pub service_name: Option<String>,
    pub service_version: Option<String>,
    pub count: u64,
}

pub struct FingerprintRepository {
    database_client: LedgerClient,
}

impl FingerprintRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /**
     * Ingesta masiva transaccional de huellas de un escaneo.
     *
     * # Errors:
     * - `DbError::MappingError` si alguna huella viola rangos de puerto
     *   o confianza; la transacción completa se anula.
     */
    #[instrument(skip(self, incoming_fingerprints), fields(batch_size = incoming_fingerprints.len()))]
    pub async fn bulk_create(
        &self,
        incoming_fingerprints: Vec<NewFingerprintDetail>,
    ) -> Result<Vec<FingerprintDetail>, DbError> {
        let connection = self.database_client.get_connection()?;
        let database_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut sealed_identifiers = Vec::with_capacity(incoming_fingerprints.len());

        for incoming_fingerprint in &incoming_fingerprints {
            if incoming_fingerprint.port == 0 {
                return Err(DbError::MappingError("port 0 is outside [1,65535]".into()));
            }
            if incoming_fingerprint.confidence_score > 100 {
                return Err(DbError::MappingError(format!(
                    "confidence {} outside [0,100]",
                    incoming_fingerprint.confidence_score
                )));
            }

            let fingerprint_identifier = Uuid::new_v4().to_string();
            database_transaction
                .execute(
                    "INSERT INTO fingerprint_detail \
                     (id, scan_id, target_id, port, protocol, service_name, service_product, \
                      service_version, service_info, fingerprint_method, confidence_score, \
                      raw_response, additional_info, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                    params![
                        fingerprint_identifier.clone(),
                        incoming_fingerprint.scan_id.clone(),
                        incoming_fingerprint.target_id.clone(),
                        incoming_fingerprint.port as i64,
                        incoming_fingerprint.protocol.as_str(),
                        incoming_fingerprint.service_name.clone(),
                        incoming_fingerprint.service_product.clone(),
                        incoming_fingerprint.service_version.clone(),
                        incoming_fingerprint.service_info.clone(),
                        incoming_fingerprint.fingerprint_method.clone(),
                        incoming_fingerprint.confidence_score as i64,
                        incoming_fingerprint.raw_response.clone(),
                        incoming_fingerprint.additional_info.as_ref().map(json_text),
                        now_text()
                    ],
                )
                .await?;

            sealed_identifiers.push(fingerprint_identifier);
        }

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!("🔬 [FINGERPRINT]: Batch of {} fingerprints sealed.", sealed_identifiers.len());

        let mut sealed_fingerprints = Vec::with_capacity(sealed_identifiers.len());
        for fingerprint_identifier in sealed_identifiers {
            sealed_fingerprints.push(self.fetch(&fingerprint_identifier).await?);
        }
        Ok(sealed_fingerprints)
    }

    pub async fn fetch(&self, fingerprint_identifier: &str) -> Result<FingerprintDetail, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM fingerprint_detail WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![fingerprint_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_fingerprint_row(&data_row),
            None => Err(DbError::NotFound(fingerprint_identifier.into())),
        }
    }

    pub async fn list_by_scan(&self, scan_identifier: &str) -> Result<Vec<FingerprintDetail>, DbError> {
        self.list_filtered("scan_id", scan_identifier).await
    }

    pub async fn list_by_target(&self, target_identifier: &str) -> Result<Vec<FingerprintDetail>, DbError> {
        self.list_filtered("target_id", target_identifier).await
    }

    pub async fn list(&self, list_query: &ListQuery) -> Result<Paged<FingerprintDetail>, DbError> {
        let connection = self.database_client.get_connection()?;
        let (limit, offset) = list_query.limit_offset();
        let order_clause = list_query.order_clause(ORDERABLE_COLUMNS, "port ASC");
        let search_pattern = list_query
            .search
            .as_deref()
            .map(|term| format!("%{}%", term))
            .unwrap_or_else(|| "%".into());

        let mut total_result = connection
            .query(
                "SELECT COUNT(*) FROM fingerprint_detail WHERE deleted_at IS NULL \
                 AND (COALESCE(service_name,'') LIKE ?1 OR COALESCE(service_product,'') LIKE ?1 \
                      OR COALESCE(service_version,'') LIKE ?1)",
                params![search_pattern.clone()],
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
                    "SELECT {} FROM fingerprint_detail WHERE deleted_at IS NULL \
                     AND (COALESCE(service_name,'') LIKE ?1 OR COALESCE(service_product,'') LIKE ?1 \
                          OR COALESCE(service_version,'') LIKE ?1) \
                     {} LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS, order_clause
                ),
                params![search_pattern, limit as i64, offset as i64],
            )
            .await?;

        let mut fingerprints = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            fingerprints.push(map_fingerprint_row(&data_row)?);
        }

        Ok(Paged {
            items: fingerprints,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    /// Agregado de servicios únicos con conteo descendente.
    pub async fn service_summary(&self) -> Result<(u64, Vec<ServiceSummaryRow>), DbError> {
        let connection = self.database_client.get_connection()?;

        let mut total_result = connection
            .query("SELECT COUNT(*) FROM fingerprint_detail WHERE deleted_at IS NULL", ())
            .await?;
        let total_fingerprints = total_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0) as u64)
            .unwrap_or(0);

        let mut summary_result = connection
            .query(
                "SELECT service_name, service_version, COUNT(*) AS service_count \
                 FROM fingerprint_detail WHERE deleted_at IS NULL \
                 GROUP BY service_name, service_version ORDER BY service_count DESC",
                (),
            )
            .await?;

        let mut summary_rows = Vec::new();
        while let Some(data_row) = summary_result.next().await? {
            summary_rows.push(ServiceSummaryRow {
                service_name: optional_text(&data_row, 0)?,
                service_version: optional_text(&data_row, 1)?,
                count: data_row.get::<i64>(2).unwrap_or(0) as u64,
            });
        }

        Ok((total_fingerprints, summary_rows))
    }

    pub async fn soft_delete(&self, fingerprint_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE fingerprint_detail SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![fingerprint_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(fingerprint_identifier.into()));
        }
        Ok(())
    }

    async fn list_filtered(
        &self,
        filter_column: &str,
        filter_value: &str,
    ) -> Result<Vec<FingerprintDetail>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM fingerprint_detail \
                     WHERE {} = ?1 AND deleted_at IS NULL ORDER BY port ASC",
                    SELECT_COLUMNS, filter_column
                ),
                params![filter_value],
            )
            .await?;

        let mut fingerprints = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            fingerprints.push(map_fingerprint_row(&data_row)?);
        }
        Ok(fingerprints)
    }
}

fn map_fingerprint_row(data_row: &libsql::Row) -> Result<FingerprintDetail, DbError> {
    let protocol_label = required_text(data_row, 4)?;
    let protocol = match protocol_label.as_str() {
        "udp" => Protocol::Udp,
        _ => Protocol::Tcp,
    };

    Ok(FingerprintDetail {
        id: required_text(data_row, 0)?,
        scan_id: required_text(data_row, 1)?,
        target_id: required_text(data_row, 2)?,
        port: required_integer(data_row, 3)? as u16,
        protocol,
        service_name: optional_text(data_row, 5)?,
        service_product: optional_text(data_row, 6)?,
        service_version: optional_text(data_row, 7)?,
        service_info: optional_text(data_row, 8)?,
        fingerprint_method: required_text(data_row, 9)?,
        confidence_score: required_integer(data_row, 10)? as u8,
        raw_response: optional_text(data_row, 11)?,
        additional_info: optional_json(data_row, 12)?,
        created_at: required_timestamp(data_row, 13)?,
        updated_at: required_timestamp(data_row, 14)?,
    })
}
