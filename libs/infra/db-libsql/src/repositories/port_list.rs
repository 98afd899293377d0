// [libs/infra/db-libsql/src/repositories/port_list.rs]
/*!
 * =================================================================
 * APARATO: PORT LIST REPOSITORY (V4.0 - SPEC GUARDED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CATÁLOGO DE LISTAS DE PUERTOS CON NOMBRE ÚNICO
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
use vapter_domain_models::PortList;
use vapter_domain_models::validation::validate_port_list_definition;

const SELECT_COLUMNS: &str =
    "id, name, tcp_ports, udp_ports, description, created_at, updated_at, deleted_at";

const ORDERABLE_COLUMNS: &[&str] = &["name", "created_at"];

#[derive(Debug, Clone)]
pub struct NewPortList {
    pub name: String,
    pub tcp_ports: Option<String>,
    pub udp_ports: Option<String>,
    pub description: Option<String>,
}

pub struct PortListRepository {
    database_client: LedgerClient,
}

impl PortListRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Forja una lista de puertos tras validar su especificación completa.
    ///
    /// # Errors:
    /// - `DbError::DuplicateName` ante colisión del nombre único.
    /// - `DbError::MappingError` nunca; la validación ocurre en L2.
    #[instrument(skip(self, new_port_list))]
    pub async fn create(&self, new_port_list: NewPortList) -> Result<PortList, DbError> {
        validate_port_list_definition(
            new_port_list.tcp_ports.as_deref(),
            new_port_list.udp_ports.as_deref(),
        )
        .map_err(|validation_fault| DbError::MappingError(validation_fault.to_string()))?;

        let connection = self.database_client.get_connection()?;
        self.guard_unique_name(&connection, &new_port_list.name, None).await?;

        let port_list_identifier = Uuid::new_v4().to_string();
        connection
            .execute(
                "INSERT INTO port_list (id, name, tcp_ports, udp_ports, description, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    port_list_identifier.clone(),
                    new_port_list.name,
                    new_port_list.tcp_ports,
                    new_port_list.udp_ports,
                    new_port_list.description,
                    now_text()
                ],
            )
            .await?;

        info!("📇 [INVENTORY]: Port list [{}] registered.", port_list_identifier);
        self.fetch(&port_list_identifier).await
    }

    pub async fn fetch(&self, port_list_identifier: &str) -> Result<PortList, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM port_list WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![port_list_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_port_list_row(&data_row),
            None => Err(DbError::NotFound(port_list_identifier.into())),
        }
    }

    pub async fn list(&self, list_query: &ListQuery) -> Result<Paged<PortList>, DbError> {
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
                "SELECT COUNT(*) FROM port_list WHERE deleted_at IS NULL \
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
                    "SELECT {} FROM port_list WHERE deleted_at IS NULL \
                     AND (name LIKE ?1 OR COALESCE(description,'') LIKE ?1) \
                     {} LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS, order_clause
                ),
                params![search_pattern, limit as i64, offset as i64],
            )
            .await?;

        let mut port_lists = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            port_lists.push(map_port_list_row(&data_row)?);
        }

        Ok(Paged {
            items: port_lists,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    #[instrument(skip(self, port_list))]
    pub async fn update(&self, port_list: &PortList) -> Result<PortList, DbError> {
        port_list
            .validate()
            .map_err(|validation_fault| DbError::MappingError(validation_fault.to_string()))?;

        let connection = self.database_client.get_connection()?;
        self.guard_unique_name(&connection, &port_list.name, Some(&port_list.id)).await?;

        let rows_affected = connection
            .execute(
                "UPDATE port_list SET name = ?2, tcp_ports = ?3, udp_ports = ?4, \
                 description = ?5, updated_at = ?6 WHERE id = ?1 AND deleted_at IS NULL",
                params![
                    port_list.id.clone(),
                    port_list.name.clone(),
                    port_list.tcp_ports.clone(),
                    port_list.udp_ports.clone(),
                    port_list.description.clone(),
                    now_text()
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(port_list.id.clone()));
        }
        self.fetch(&port_list.id).await
    }

    pub async fn soft_delete(&self, port_list_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE port_list SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![port_list_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(port_list_identifier.into()));
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
                "SELECT COUNT(*) FROM port_list WHERE name = ?1 AND deleted_at IS NULL \
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

fn map_port_list_row(data_row: &libsql::Row) -> Result<PortList, DbError> {
    Ok(PortList {
        id: required_text(data_row, 0)?,
        name: required_text(data_row, 1)?,
        tcp_ports: optional_text(data_row, 2)?,
        udp_ports: optional_text(data_row, 3)?,
        description: optional_text(data_row, 4)?,
        created_at: required_timestamp(data_row, 5)?,
        updated_at: required_timestamp(data_row, 6)?,
        deleted_at: optional_timestamp(data_row, 7)?,
    })
}
