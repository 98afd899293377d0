// [libs/infra/db-libsql/src/repositories/target.rs]
/*!
 * =================================================================
 * APARATO: TARGET REPOSITORY (V4.2 - UNIQUENESS GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE OBJETIVOS DE EVALUACIÓN
 *
 * # Mathematical Proof (Live Uniqueness):
 * La pareja (customer_id, address) es única entre objetivos vivos por
 * índice parcial; el guard previo a la inserción traduce la colisión a
 * un fallo semántico 409 sin depender del texto del error SQLite.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use crate::repositories::{
    now_text, optional_text, optional_timestamp, required_text, required_timestamp, ListQuery,
    Paged,
};
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;
use vapter_domain_models::validation::validate_target_address;
use vapter_domain_models::Target;

const SELECT_COLUMNS: &str =
    "id, customer_id, name, address, description, created_at, updated_at, deleted_at";

const ORDERABLE_COLUMNS: &[&str] = &["name", "address", "created_at"];

#[derive(Debug, Clone)]
pub struct NewTarget {
    pub customer_id: String,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
}

pub struct TargetRepository {
    database_client: LedgerClient,
}

impl TargetRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Registra un objetivo tras validar la dirección y la unicidad viva.
    ///
    /// # Errors:
    /// - `DbError::MappingError` ante dirección ilegal (mapea a 400).
    /// - `DbError::DuplicateTarget` ante colisión (customer, address).
    #[instrument(skip(self, new_target))]
    pub async fn create(&self, new_target: NewTarget) -> Result<Target, DbError> {
        validate_target_address(&new_target.address)
            .map_err(|validation_fault| DbError::MappingError(validation_fault.to_string()))?;

        let connection = self.database_client.get_connection()?;

        let mut collision_result = connection
            .query(
                "SELECT COUNT(*) FROM target \
                 WHERE customer_id = ?1 AND address = ?2 AND deleted_at IS NULL",
                params![new_target.customer_id.clone(), new_target.address.clone()],
            )
            .await?;
        let collision_count = collision_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);

        if collision_count > 0 {
            return Err(DbError::DuplicateTarget);
        }

        let target_identifier = Uuid::new_v4().to_string();
        connection
            .execute(
                "INSERT INTO target (id, customer_id, name, address, description, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    target_identifier.clone(),
                    new_target.customer_id,
                    new_target.name,
                    new_target.address,
                    new_target.description,
                    now_text()
                ],
            )
            .await?;

        info!("🎯 [INVENTORY]: Target [{}] registered.", target_identifier);
        self.fetch(&target_identifier).await
    }

    pub async fn fetch(&self, target_identifier: &str) -> Result<Target, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM target WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![target_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_target_row(&data_row),
            None => Err(DbError::NotFound(target_identifier.into())),
        }
    }

    /// Listado global o restringido a un cliente, con búsqueda en
    /// nombre/dirección/descripción.
    pub async fn list(
        &self,
        list_query: &ListQuery,
        customer_filter: Option<&str>,
    ) -> Result<Paged<Target>, DbError> {
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
                "SELECT COUNT(*) FROM target WHERE deleted_at IS NULL \
                 AND customer_id = COALESCE(?2, customer_id) \
                 AND (name LIKE ?1 OR address LIKE ?1 OR COALESCE(description,'') LIKE ?1)",
                params![search_pattern.clone(), customer_filter],
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
                    "SELECT {} FROM target WHERE deleted_at IS NULL \
                     AND customer_id = COALESCE(?2, customer_id) \
                     AND (name LIKE ?1 OR address LIKE ?1 OR COALESCE(description,'') LIKE ?1) \
                     {} LIMIT ?3 OFFSET ?4",
                    SELECT_COLUMNS, order_clause
                ),
                params![search_pattern, customer_filter, limit as i64, offset as i64],
            )
            .await?;

        let mut targets = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            targets.push(map_target_row(&data_row)?);
        }

        Ok(Paged {
            items: targets,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    #[instrument(skip(self, target))]
    pub async fn update(&self, target: &Target) -> Result<Target, DbError> {
        validate_target_address(&target.address)
            .map_err(|validation_fault| DbError::MappingError(validation_fault.to_string()))?;

        let connection = self.database_client.get_connection()?;

        let mut collision_result = connection
            .query(
                "SELECT COUNT(*) FROM target WHERE customer_id = ?1 AND address = ?2 \
                 AND deleted_at IS NULL AND id != ?3",
                params![target.customer_id.clone(), target.address.clone(), target.id.clone()],
            )
            .await?;
        let collision_count = collision_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0))
            .unwrap_or(0);
        if collision_count > 0 {
            return Err(DbError::DuplicateTarget);
        }

        let rows_affected = connection
            .execute(
                "UPDATE target SET name = ?2, address = ?3, description = ?4, updated_at = ?5 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![
                    target.id.clone(),
                    target.name.clone(),
                    target.address.clone(),
                    target.description.clone(),
                    now_text()
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(target.id.clone()));
        }
        self.fetch(&target.id).await
    }

    pub async fn soft_delete(&self, target_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE target SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![target_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(target_identifier.into()));
        }
        info!("🗑️  [INVENTORY]: Target [{}] concealed.", target_identifier);
        Ok(())
    }

    /// Conteo de objetivos vivos de un cliente (estadísticas del HUD).
    pub async fn count_for_customer(&self, customer_identifier: &str) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut count_result = connection
            .query(
                "SELECT COUNT(*) FROM target WHERE customer_id = ?1 AND deleted_at IS NULL",
                params![customer_identifier],
            )
            .await?;

        Ok(count_result
            .next()
            .await?
            .map(|row| row.get::<i64>(0).unwrap_or(0) as u64)
            .unwrap_or(0))
    }
}

fn map_target_row(data_row: &libsql::Row) -> Result<Target, DbError> {
    Ok(Target {
        id: required_text(data_row, 0)?,
        customer_id: required_text(data_row, 1)?,
        name: required_text(data_row, 2)?,
        address: required_text(data_row, 3)?,
        description: optional_text(data_row, 4)?,
        created_at: required_timestamp(data_row, 5)?,
        updated_at: required_timestamp(data_row, 6)?,
        deleted_at: optional_timestamp(data_row, 7)?,
    })
}
