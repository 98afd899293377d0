// [libs/infra/db-libsql/src/repositories/scan_type.rs]
/*!
 * =================================================================
 * APARATO: SCAN TYPE REPOSITORY (V4.1 - RECIPE AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CATÁLOGO DE RECETAS DE PIPELINE CON NOMBRE ÚNICO
 *
 * # Mathematical Proof (Recipe Integrity):
 * La invariante 'only_discovery => sin plugins' se verifica en cada
 * escritura; ninguna receta persistida puede ordenar simultáneamente
 * descubrimiento puro y etapas post-descubrimiento.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{
    flag, now_text, optional_text, optional_timestamp, required_text, required_timestamp,
    ListQuery, Paged,
};
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;
use vapter_domain_models::ScanType;

const SELECT_COLUMNS: &str =
    "id, name, only_discovery, consider_alive, be_quiet, port_list_id, \
     plugin_fingerprint, plugin_vuln_engine, plugin_web, plugin_vuln_lookup, \
     description, created_at, updated_at, deleted_at";

const ORDERABLE_COLUMNS: &[&str] = &["name", "created_at"];

#[derive(Debug, Clone)]
pub struct NewScanType {
    pub name: String,
    pub only_discovery: bool,
    pub consider_alive: bool,
    pub be_quiet: bool,
    pub port_list_id: Option<String>,
    pub plugin_fingerprint: bool,
    pub plugin_vuln_engine: bool,
    pub plugin_web: bool,
    pub plugin_vuln_lookup: bool,
    pub description: Option<String>,
}

pub struct ScanTypeRepository {
    database_client: LedgerClient,
}

impl ScanTypeRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, new_scan_type))]
    pub async fn create(&self, new_scan_type: NewScanType) -> Result<ScanType, DbError> {
        if new_scan_type.only_discovery
            && (new_scan_type.plugin_fingerprint
                || new_scan_type.plugin_vuln_engine
                || new_scan_type.plugin_web
                || new_scan_type.plugin_vuln_lookup)
        {
            return Err(DbError::MappingError(
                "only_discovery excludes post-discovery plugins".into(),
            ));
        }

        let connection = self.database_client.get_connection()?;
        self.guard_unique_name(&connection, &new_scan_type.name, None).await?;

        let scan_type_identifier = Uuid::new_v4().to_string();
        connection
            .execute(
                "INSERT INTO scan_type \
                 (id, name, only_discovery, consider_alive, be_quiet, port_list_id, \
                  plugin_fingerprint, plugin_vuln_engine, plugin_web, plugin_vuln_lookup, \
                  description, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    scan_type_identifier.clone(),
                    new_scan_type.name,
                    new_scan_type.only_discovery as i64,
                    new_scan_type.consider_alive as i64,
                    new_scan_type.be_quiet as i64,
                    new_scan_type.port_list_id,
                    new_scan_type.plugin_fingerprint as i64,
                    new_scan_type.plugin_vuln_engine as i64,
                    new_scan_type.plugin_web as i64,
                    new_scan_type.plugin_vuln_lookup as i64,
                    new_scan_type.description,
                    now_text()
                ],
            )
            .await?;

        info!("🧾 [INVENTORY]: Scan type [{}] registered.", scan_type_identifier);
        self.fetch(&scan_type_identifier).await
    }

    pub async fn fetch(&self, scan_type_identifier: &str) -> Result<ScanType, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM scan_type WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![scan_type_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_scan_type_row(&data_row),
            None => Err(DbError::NotFound(scan_type_identifier.into())),
        }
    }

    pub async fn list(&self, list_query: &ListQuery) -> Result<Paged<ScanType>, DbError> {
        let connection = self.database_client.get_connection()?;
        let (limit, offset) = list_query.limit_offset();
        let order_clause = list_query.order_clause(ORDERABLE_COLUMNS, "name ASC");
        let search_pattern = list_query
            .search
            .as_deref()
            .map(|term| format!("%{}%", term))
            .unwrap_or_else(|| "%".into());

        let mut total_result = connection
            .query(
                "SELECT COUNT(*) FROM scan_type WHERE deleted_at IS NULL \
                 AND (name LIKE ?1 OR COALESCE(description,'') LIKE ?1)",
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
                    "SELECT {} FROM scan_type WHERE deleted_at IS NULL \
                     AND (name LIKE ?1 OR COALESCE(description,'') LIKE ?1) \
                     {} LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS, order_clause
                ),
                params![search_pattern, limit as i64, offset as i64],
            )
            .await?;

        let mut scan_types = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            scan_types.push(map_scan_type_row(&data_row)?);
        }

        Ok(Paged {
            items: scan_types,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    #[instrument(skip(self, scan_type))]
    pub async fn update(&self, scan_type: &ScanType) -> Result<ScanType, DbError> {
        scan_type
            .validate()
            .map_err(|validation_fault| DbError::MappingError(validation_fault.to_string()))?;

        let connection = self.database_client.get_connection()?;
        self.guard_unique_name(&connection, &scan_type.name, Some(&scan_type.id)).await?;

        let rows_affected = connection
            .execute(
                "UPDATE scan_type SET name = ?2, only_discovery = ?3, consider_alive = ?4, \
                 be_quiet = ?5, port_list_id = ?6, plugin_fingerprint = ?7, \
                 plugin_vuln_engine = ?8, plugin_web = ?9, plugin_vuln_lookup = ?10, \
                 description = ?11, updated_at = ?12 WHERE id = ?1 AND deleted_at IS NULL",
                params![
                    scan_type.id.clone(),
                    scan_type.name.clone(),
                    scan_type.only_discovery as i64,
                    scan_type.consider_alive as i64,
                    scan_type.be_quiet as i64,
                    scan_type.port_list_id.clone(),
                    scan_type.plugin_fingerprint as i64,
                    scan_type.plugin_vuln_engine as i64,
                    scan_type.plugin_web as i64,
                    scan_type.plugin_vuln_lookup as i64,
                    scan_type.description.clone(),
                    now_text()
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(scan_type.id.clone()));
        }
        self.fetch(&scan_type.id).await
    }

    pub async fn soft_delete(&self, scan_type_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE scan_type SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![scan_type_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(scan_type_identifier.into()));
        }
        Ok(())
    }

    async fn guard_unique_name(
        &self,
        connection: &libsql::Connection,
        candidate_name: &str,
        excluded_identifier: Option<&str>,
    ) -> Result<(), DbError> {
        let mut collision_result = connection
            .query(
                "SELECT COUNT(*) FROM scan_type WHERE name = ?1 AND deleted_at IS NULL \
                 AND id != COALESCE(?2, '')",
                params![candidate_name, excluded_identifier],
            )
            .await?;

        let collision_count = collision_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);

        if collision_count > 0 {
            return Err(DbError::DuplicateName(candidate_name.into()));
        }
        Ok(())
    }
}

fn map_scan_type_row(data_row: &libsql::Row) -> Result<ScanType, DbError> {
    Ok(ScanType {
        id: required_text(data_row, 0)?,
        name: required_text(data_row, 1)?,
        only_discovery: flag(data_row, 2)?,
        consider_alive: flag(data_row, 3)?,
        be_quiet: flag(data_row, 4)?,
        port_list_id: optional_text(data_row, 5)?,
        plugin_fingerprint: flag(data_row, 6)?,
        plugin_vuln_engine: flag(data_row, 7)?,
        plugin_web: flag(data_row, 8)?,
        plugin_vuln_lookup: flag(data_row, 9)?,
        description: optional_text(data_row, 10)?,
        created_at: required_timestamp(data_row, 11)?,
        updated_at: required_timestamp(data_row, 12)?,
        deleted_at: optional_timestamp(data_row, 13)?,
    })
}
