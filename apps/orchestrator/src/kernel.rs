// [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V4.4 - CONSUMER EMBEDDED)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan el Ledger, la arteria de
 * mensajería y la superficie REST. La tarea del consumidor de estados
 * corre embebida junto al servidor HTTP; el binario
 * 'consume-scan-status' la ejecuta además en primer plano para
 * despliegues segregados.
 * =================================================================
 */

use crate::routes::create_control_surface_router;
use crate::services::status_consumer::StatusUpdateHandler;
use crate::state::AppState;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument};
use vapter_infra_broker::{
    queues::broker_url_from_env, BrokerLink, LapinQueuePublisher, QueueConsumer, QueueTopology,
};
use vapter_infra_db::LedgerClient;

pub struct OrchestratorKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
    broker_url: String,
}

impl OrchestratorKernel {
    /**
     * Realiza la ignición del Ledger, el publicador y el estado neural.
     * La topología de colas queda declarada antes de aceptar tráfico.
     */
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
    ) -> anyhow::Result<Self> {
        let database_client = LedgerClient::connect(database_connection_url, database_access_token)
            .await
            .map_err(|ledger_fault| anyhow::anyhow!("Ledger ignition aborted: {}", ledger_fault))?;

        let broker_url = broker_url_from_env()
            .map_err(|config_fault| anyhow::anyhow!("Broker ignition aborted: {}", config_fault))?;

        let queue_topology = QueueTopology::from_env();

        // Enlace de publicación dedicado: el consumidor abre el suyo.
        let publisher_link = BrokerLink::connect(&broker_url, "publisher")
            .await
            .map_err(|broker_fault| anyhow::anyhow!("Broker ignition aborted: {}", broker_fault))?;
        publisher_link
            .declare_topology(&queue_topology)
            .await
            .map_err(|broker_fault| anyhow::anyhow!("Topology declaration aborted: {}", broker_fault))?;

        let queue_publisher = Arc::new(LapinQueuePublisher::new(publisher_link));

        Ok(Self {
            server_network_port: listening_port,
            application_state: AppState::new(database_client, queue_publisher, queue_topology),
            broker_url,
        })
    }

    /**
     * Lanza la tarea del consumidor de estados y el servidor HTTP.
     * INT/TERM detienen el consumo, drenan la reconciliación en vuelo
     * y cierran conexiones.
     */
    pub async fn launch_sovereign_operations(self) -> anyhow::Result<()> {
        let shared_application_state = self.application_state.clone();

        let (shutdown_transmitter, shutdown_receiver) = watch::channel(false);

        // --- 1. TAREA EMBEBIDA DEL CONSUMIDOR DE ESTADOS ---
        let status_queue_name = shared_application_state.queue_topology.scan_status_updates.clone();
        let consumer_state = shared_application_state.clone();
        let consumer_broker_url = self.broker_url.clone();
        let consumer_task_handle = tokio::spawn(async move {
            let status_consumer = QueueConsumer::new(
                consumer_broker_url,
                status_queue_name,
                "orchestrator-status-consumer".into(),
            );
            let delivery_handler = StatusUpdateHandler::new(consumer_state);

            if let Err(consumer_fault) = status_consumer
                .run(&delivery_handler, shutdown_receiver)
                .await
            {
                error!("💀 [KERNEL]: Status consumer collapsed: {}", consumer_fault);
            }
        });

        // --- 2. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let control_surface_router = create_control_surface_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("CRITICAL_FAULT: Static bind address rejected."),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Control surface listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address).await?;

        axum::serve(tcp_listener, control_surface_router)
            .with_graceful_shutdown(await_termination_signal())
            .await?;

        // --- 3. DRENAJE ORDENADO DEL CONSUMIDOR ---
        let _ = shutdown_transmitter.send(true);
        let _ = consumer_task_handle.await;

        info!("🏁 [KERNEL]: Shutdown sequence concluded. Control plane offline.");
        Ok(())
    }
}

/// Espera INT o TERM del host de infraestructura.
pub async fn await_termination_signal() {
    let ctrl_c_signal = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate_signal = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal_stream) => {
                signal_stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate_signal = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c_signal => {},
        _ = terminate_signal => {},
    }

    info!("⚠️ [KERNEL]: Termination signal received. Sealing current strata...");
}
