// [apps/stage-worker/src/main.rs]
/*!
 * =================================================================
 * APARATO: STAGE WORKER SHELL (V4.3 - UNIVERSAL SOLDIER)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL EJECUTOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE STAGE PER PROCESS: '--stage' selecciona el ejecutor; cada
 *    proceso sirve exactamente una etapa con prefetch=1. Escalar es
 *    lanzar N procesos.
 * 2. DUAL UPLINK: Enlace de publicación dedicado para veredictos y
 *    progreso; el enlace de consumo vive dentro del bucle del
 *    consumidor con su propia reconexión.
 * 3. ORDERED EXIT: INT/TERM detienen el consumo y drenan la etapa en
 *    vuelo antes del cierre determinista.
 * =================================================================
 */

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use vapter_domain_models::StageModule;
use vapter_infra_broker::{BrokerLink, LapinQueuePublisher, QueueConsumer, QueueTopology};
use vapter_infra_gateway_client::GatewayClient;
use vapter_shared_heimdall::init_tracing;
use vapter_stage_worker::config::WorkerSettings;
use vapter_stage_worker::runtime::{StatusEmitter, WorkerRuntime};
use vapter_stage_worker::stages::{
    fingerprint::FingerprintExecutor, nmap::NmapExecutor, report::ReportExecutor,
    vuln_engine::VulnEngineExecutor, vuln_lookup::VulnLookupExecutor, web::WebExecutor,
    StageExecutor,
};

/// Selector cerrado de etapa servida por este proceso.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StageSelector {
    Nmap,
    Fingerprint,
    VulnEngine,
    Web,
    VulnLookup,
    Report,
}

impl StageSelector {
    fn into_executor(self) -> (StageModule, Box<dyn StageExecutor>) {
        match self {
            StageSelector::Nmap => (StageModule::Nmap, Box::new(NmapExecutor)),
            StageSelector::Fingerprint => (StageModule::Fingerprint, Box::new(FingerprintExecutor)),
            StageSelector::VulnEngine => (StageModule::VulnEngine, Box::new(VulnEngineExecutor)),
            StageSelector::Web => (StageModule::Web, Box::new(WebExecutor)),
            StageSelector::VulnLookup => (StageModule::VulnLookup, Box::new(VulnLookupExecutor)),
            StageSelector::Report => (StageModule::Report, Box::new(ReportExecutor)),
        }
    }
}

/**
 * Directivas de mando del soldado de etapa.
 */
#[derive(Parser, Debug)]
#[command(
    author = "Raz Podesta <metaShark Tech>",
    version = "4.3",
    about = "VaPtER Stage Worker // One stage, one queue, one contract"
)]
struct WorkerDirectives {
    /// Etapa del pipeline servida por este proceso.
    #[arg(long, value_enum)]
    stage: StageSelector,

    /// Identificador del nodo en la rejilla de vigilancia.
    #[arg(long, env = "WORKER_NODE_IDENTIFIER", default_value = "vapter-worker-alpha")]
    worker_node_identifier: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. ENTORNO Y OBSERVABILIDAD
    dotenv().ok();
    init_tracing("vapter_stage_worker");

    let worker_directives = WorkerDirectives::parse();
    let (stage_module, stage_executor) = worker_directives.stage.into_executor();

    info!("💠 [SHELL]: Stage worker ignition for [{}] starting...", stage_module);

    // 2. HIDRATACIÓN DE DIRECTIVAS DE ENTORNO
    let worker_settings = WorkerSettings::from_env()
        .map_err(|config_fault| anyhow::anyhow!("CRITICAL_FAULT: {}", config_fault))?;

    tokio::fs::create_dir_all(&worker_settings.temp_results_dir)
        .await
        .context("IO_FAULT: Unable to claim scratch results directory.")?;

    // 3. TÚNEL HTTP HACIA EL NÚCLEO
    let gateway_client = GatewayClient::new(
        worker_settings.api_gateway_url.clone(),
        worker_settings.api_timeout,
        worker_settings.max_retries,
        worker_settings.retry_delay,
    );

    // 4. ENLACE DE PUBLICACIÓN DEDICADO (VEREDICTOS Y PROGRESO)
    let queue_topology = QueueTopology::from_env();

    let publisher_link = BrokerLink::connect(&worker_settings.broker_url, "publisher")
        .await
        .map_err(|broker_fault| anyhow::anyhow!("Broker ignition aborted: {}", broker_fault))?;
    publisher_link
        .declare_topology(&queue_topology)
        .await
        .map_err(|broker_fault| anyhow::anyhow!("Topology declaration aborted: {}", broker_fault))?;

    let status_emitter = StatusEmitter::new(
        Arc::new(LapinQueuePublisher::new(publisher_link)),
        queue_topology.scan_status_updates.clone(),
        stage_module,
    );

    // 5. ESQUELETO DEL WORKER Y PROTOCOLO DE SEÑALES
    let worker_runtime = WorkerRuntime::new(
        worker_settings.clone(),
        gateway_client,
        status_emitter,
        stage_executor,
    );

    let (shutdown_transmitter, shutdown_receiver) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("⚠️ [SHELL]: Termination requested by host. Sealing current stage...");
        let _ = shutdown_transmitter.send(true);
    });

    // 6. BUCLE DE CONSUMO (PREFETCH=1, ACK MANUAL)
    let request_queue_name = queue_topology.request_queue_for(stage_module).to_string();
    info!(
        "🚀 [SHELL]: Node [{}] operational. Consuming [{}].",
        worker_directives.worker_node_identifier, request_queue_name
    );

    let stage_consumer = QueueConsumer::new(
        worker_settings.broker_url.clone(),
        request_queue_name,
        format!("vapter-{}-{}", stage_module, worker_directives.worker_node_identifier),
    );

    stage_consumer
        .run(&worker_runtime, shutdown_receiver)
        .await
        .map_err(|consumer_fault| anyhow::anyhow!("Consumer collapsed: {}", consumer_fault))?;

    // 7. CIERRE DETERMINISTA
    info!("🏁 [SHELL]: Shutdown sequence concluded. Stage worker offline.");
    Ok(())
}
