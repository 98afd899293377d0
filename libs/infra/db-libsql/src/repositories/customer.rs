// [libs/infra/db-libsql/src/repositories/customer.rs]
/*!
 * =================================================================
 * APARATO: CUSTOMER REPOSITORY (V4.1 - MULTI-TENANT ROOT)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE CLIENTES PROPIETARIOS DE OBJETIVOS
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
use vapter_domain_models::Customer;

const SELECT_COLUMNS: &str =
    "id, name, company_name, email, phone, contact_person, address, notes, \
     created_at, updated_at, deleted_at";

const ORDERABLE_COLUMNS: &[&str] = &["name", "email", "created_at", "updated_at"];

/// Datos mínimos para forjar un cliente nuevo.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

pub struct CustomerRepository {
    database_client: LedgerClient,
}

impl CustomerRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, new_customer))]
    pub async fn create(&self, new_customer: NewCustomer) -> Result<Customer, DbError> {
        let connection = self.database_client.get_connection()?;
        let customer_identifier = Uuid::new_v4().to_string();
        let creation_timestamp = now_text();

        connection
            .execute(
                "INSERT INTO customer \
                 (id, name, company_name, email, phone, contact_person, address, notes, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    customer_identifier.clone(),
                    new_customer.name,
                    new_customer.company_name,
                    new_customer.email,
                    new_customer.phone,
                    new_customer.contact_person,
                    new_customer.address,
                    new_customer.notes,
                    creation_timestamp
                ],
            )
            .await?;

        info!("🏢 [INVENTORY]: Customer [{}] registered.", customer_identifier);
        self.fetch(&customer_identifier).await
    }

    pub async fn fetch(&self, customer_identifier: &str) -> Result<Customer, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {} FROM customer WHERE id = ?1 AND deleted_at IS NULL",
                    SELECT_COLUMNS
                ),
                params![customer_identifier],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_customer_row(&data_row),
            None => Err(DbError::NotFound(customer_identifier.into())),
        }
    }

    pub async fn list(&self, list_query: &ListQuery) -> Result<Paged<Customer>, DbError> {
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
                "SELECT COUNT(*) FROM customer WHERE deleted_at IS NULL \
                 AND (name LIKE ?1 OR COALESCE(company_name,'') LIKE ?1 \
                      OR email LIKE ?1 OR COALESCE(contact_person,'') LIKE ?1)",
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
                    "SELECT {} FROM customer WHERE deleted_at IS NULL \
                     AND (name LIKE ?1 OR COALESCE(company_name,'') LIKE ?1 \
                          OR email LIKE ?1 OR COALESCE(contact_person,'') LIKE ?1) \
                     {} LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS, order_clause
                ),
                params![search_pattern, limit as i64, offset as i64],
            )
            .await?;

        let mut customers = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            customers.push(map_customer_row(&data_row)?);
        }

        Ok(Paged {
            items: customers,
            total,
            page: list_query.page.unwrap_or(1).max(1),
            page_size: limit,
        })
    }

    #[instrument(skip(self, customer))]
    pub async fn update(&self, customer: &Customer) -> Result<Customer, DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE customer SET name = ?2, company_name = ?3, email = ?4, phone = ?5, \
                 contact_person = ?6, address = ?7, notes = ?8, updated_at = ?9 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![
                    customer.id.clone(),
                    customer.name.clone(),
                    customer.company_name.clone(),
                    customer.email.clone(),
                    customer.phone.clone(),
                    customer.contact_person.clone(),
                    customer.address.clone(),
                    customer.notes.clone(),
                    now_text()
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(customer.id.clone()));
        }
        self.fetch(&customer.id).await
    }

    /// Ocultamiento lógico: la historia referencial permanece intacta.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, customer_identifier: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                "UPDATE customer SET deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![customer_identifier, now_text()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(customer_identifier.into()));
        }
        info!("🗑️  [INVENTORY]: Customer [{}] concealed.", customer_identifier);
        Ok(())
    }
}

fn map_customer_row(data_row: &libsql::Row) -> Result<Customer, DbError> {
    Ok(Customer {
        id: required_text(data_row, 0)?,
        name: required_text(data_row, 1)?,
        company_name: optional_text(data_row, 2)?,
        email: required_text(data_row, 3)?,
        phone: optional_text(data_row, 4)?,
        contact_person: optional_text(data_row, 5)?,
        address: optional_text(data_row, 6)?,
        notes: optional_text(data_row, 7)?,
        created_at: required_timestamp(data_row, 8)?,
        updated_at: required_timestamp(data_row, 9)?,
        deleted_at: optional_timestamp(data_row, 10)?,
    })
}
