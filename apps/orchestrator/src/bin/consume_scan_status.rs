// [apps/orchestrator/src/bin/consume_scan_status.rs]
/*!
 * =================================================================
 * APARATO: STATUS CONSUMER SHELL (V4.2 - FOREGROUND DRAIN)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: CONSUMO EN PRIMER PLANO DE 'scan_status_updates'
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SPLIT DEPLOYMENTS: Permite segregar la reconciliación del servidor
 *    HTTP; ambos comparten el mismo punto de entrada de reconciliación
 *    y el consumo duplicado es inocuo por idempotencia.
 * 2. GRACEFUL EXIT: INT/TERM detienen el consumo, drenan el evento en
 *    vuelo y cierran conexiones. Salida 0 en apagado limpio; distinta
 *    de cero ante fallo fatal de ignición.
 * =================================================================
 */

use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use vapter_infra_broker::{
    queues::broker_url_from_env, BrokerLink, LapinQueuePublisher, QueueConsumer, QueueTopology,
};
use vapter_infra_db::LedgerClient;
use vapter_orchestrator::kernel::await_termination_signal;
use vapter_orchestrator::services::status_consumer::StatusUpdateHandler;
use vapter_orchestrator::state::AppState;
use vapter_shared_heimdall::init_tracing;

/**
 * Directivas de mando del consumidor de estados.
 */
#[derive(Parser, Debug)]
#[command(
    author = "Raz Podesta <metaShark Tech>",
    version = "4.2",
    about = "VaPtER Scan Status Consumer // Foreground reconciliation drain"
)]
struct ConsumerDirectives {
    /// Cola de estados a drenar (default: topología del entorno).
    #[arg(long)]
    queue: Option<String>,

    /// Mensajes en prefetch por consumidor.
    #[arg(long, default_value_t = 1)]
    prefetch: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. ENTORNO Y OBSERVABILIDAD
    dotenv().ok();
    init_tracing("vapter_status_consumer");

    let consumer_directives = ConsumerDirectives::parse();

    info!("📨 [CONSUMER_SHELL]: Ignition sequence starting...");

    // 2. SINAPSIS CON EL LEDGER
    let database_connection_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment."))?;
    let database_access_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

    let database_client = LedgerClient::connect(&database_connection_url, database_access_token)
        .await
        .map_err(|ledger_fault| anyhow::anyhow!("Ledger ignition aborted: {}", ledger_fault))?;

    // 3. SINAPSIS CON LA ARTERIA DE MENSAJERÍA
    let broker_url = broker_url_from_env()
        .map_err(|config_fault| anyhow::anyhow!("Broker ignition aborted: {}", config_fault))?;
    let queue_topology = QueueTopology::from_env();

    // El reconciliador despacha etapas: requiere su propio publicador.
    let publisher_link = BrokerLink::connect(&broker_url, "publisher")
        .await
        .map_err(|broker_fault| anyhow::anyhow!("Broker ignition aborted: {}", broker_fault))?;
    publisher_link
        .declare_topology(&queue_topology)
        .await
        .map_err(|broker_fault| anyhow::anyhow!("Topology declaration aborted: {}", broker_fault))?;

    let status_queue_name = consumer_directives
        .queue
        .unwrap_or_else(|| queue_topology.scan_status_updates.clone());

    let application_state = AppState::new(
        database_client,
        Arc::new(LapinQueuePublisher::new(publisher_link)),
        queue_topology,
    );

    // 4. PROTOCOLO DE SEÑALES (Terminación Ordenada)
    let (shutdown_transmitter, shutdown_receiver) = watch::channel(false);
    tokio::spawn(async move {
        await_termination_signal().await;
        let _ = shutdown_transmitter.send(true);
    });

    // 5. DRENAJE EN PRIMER PLANO
    info!("👂 [CONSUMER_SHELL]: Consuming from queue [{}].", status_queue_name);

    let status_consumer = QueueConsumer::new(
        broker_url,
        status_queue_name,
        "vapter-status-consumer-foreground".into(),
    )
    .with_prefetch(consumer_directives.prefetch);

    let delivery_handler = StatusUpdateHandler::new(application_state);
    status_consumer
        .run(&delivery_handler, shutdown_receiver)
        .await
        .map_err(|consumer_fault| anyhow::anyhow!("Consumer collapsed: {}", consumer_fault))?;

    info!("🏁 [CONSUMER_SHELL]: Consumer stopped gracefully.");
    Ok(())
}
