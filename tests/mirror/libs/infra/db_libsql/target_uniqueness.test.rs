// [tests/mirror/libs/infra/db_libsql/target_uniqueness.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE UNICIDAD DE OBJETIVOS (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE (customer, address) ENTRE VIVOS
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_infra_db::repositories::customer::NewCustomer;
    use vapter_infra_db::repositories::target::NewTarget;
    use vapter_infra_db::repositories::{CustomerRepository, TargetRepository};
    use vapter_infra_db::{DbError, LedgerClient};

    async fn provision_customer(database_client: &LedgerClient, email: &str) -> String {
        CustomerRepository::new(database_client.clone())
            .create(NewCustomer {
                name: "Tenant".into(),
                company_name: None,
                email: email.into(),
                phone: None,
                contact_person: None,
                address: None,
                notes: None,
            })
            .await
            .expect("GENESIS_FAULT: customer")
            .id
    }

    fn new_target(customer_id: &str, address: &str) -> NewTarget {
        NewTarget {
            customer_id: customer_id.into(),
            name: format!("node-{}", address),
            address: address.into(),
            description: None,
        }
    }

    /**
     * CERTIFICACIÓN: (customer, address) único entre objetivos vivos;
     * el ocultamiento lógico libera la pareja.
     */
    #[tokio::test]
    async fn certify_live_target_uniqueness() {
        println!("\n🎯 [PROVING_GROUNDS]: Validating live target uniqueness strata...");

        let database_client = LedgerClient::connect("file:mem_target_unique_v40?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let target_repository = TargetRepository::new(database_client.clone());
        let tenant_alpha = provision_customer(&database_client, "alpha@example.com").await;
        let tenant_beta = provision_customer(&database_client, "beta@example.com").await;

        let original_target = target_repository
            .create(new_target(&tenant_alpha, "192.0.2.10"))
            .await
            .expect("GENESIS_FAULT: target");

        // 1. Duplicado vivo bajo el mismo cliente: rechazado.
        let duplicate_attempt = target_repository.create(new_target(&tenant_alpha, "192.0.2.10")).await;
        assert!(
            matches!(duplicate_attempt, Err(DbError::DuplicateTarget)),
            "UNIQUENESS_BREACH: duplicate live target admitted"
        );

        // 2. Misma dirección bajo OTRO cliente: legal.
        target_repository
            .create(new_target(&tenant_beta, "192.0.2.10"))
            .await
            .expect("UNIQUENESS_FAULT: cross-tenant address rejected");

        // 3. Ocultamiento lógico libera la pareja para el cliente.
        target_repository.soft_delete(&original_target.id).await.expect("CONCEAL_FAULT");
        target_repository
            .create(new_target(&tenant_alpha, "192.0.2.10"))
            .await
            .expect("UNIQUENESS_FAULT: address not released after soft delete");

        // 4. Dirección sintácticamente ilegal: rechazada en el umbral.
        let illegal_address_attempt = target_repository.create(new_target(&tenant_alpha, "-bad-.host")).await;
        assert!(illegal_address_attempt.is_err(), "PERIMETER_BREACH: illegal address admitted");
    }
}
