// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V4.2 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el Ledger y la topología de colas queden
 * nivelados ANTES de la apertura del socket TCP, previniendo estados
 * de carrera donde un worker reporte contra colas aún no declaradas.
 * =================================================================
 */

use vapter_orchestrator::prelude::*;

use dotenvy::dotenv;
use tracing::info;
use vapter_shared_heimdall::init_tracing;

/**
 * Punto de ignición supremo del binario del centro de mando.
 */
fn main() -> anyhow::Result<()> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (HEIMDALL)
    init_tracing("vapter_orchestrator");

    // 3. CONFIGURACIÓN DEL RUNTIME SOBERANO
    let runtime_orchestrator = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Global ignition sequence starting...");

        // 4. ADQUISICIÓN DE COORDENADAS TÁCTICAS
        let database_connection_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment."))?;

        let database_access_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

        let listening_network_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        // 5. CONSTRUCCIÓN E IGNICIÓN DEL KERNEL SOBERANO
        let kernel_instance = OrchestratorKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_network_port,
        )
        .await?;

        info!("🚀 [VAPTER_ONLINE]: Control plane operational on port {}.", listening_network_port);
        kernel_instance.launch_sovereign_operations().await
    })
}
