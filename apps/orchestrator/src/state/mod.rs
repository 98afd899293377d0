// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V4.2 - COMPOSITION ROOT)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, PUBLICADOR Y TOPOLOGÍA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NO SHARED MUTABLE CACHES: Todo estado mutable sensible a carreras
 *    vive en el Ledger; el AppState solo transporta autoridades Arc'd
 *    inmutables.
 * 2. PUBLISHER SEAM: El publicador viaja como 'Arc<dyn QueuePublisher>'
 *    para que el Proving Grounds inyecte un doble de captura.
 * =================================================================
 */

use std::sync::Arc;
use vapter_infra_broker::{QueuePublisher, QueueTopology};
use vapter_infra_db::repositories::{
    CustomerRepository, FingerprintRepository, PortListRepository, ScanDetailRepository,
    ScanRepository, ScanTypeRepository, TargetRepository, VulnEngineResultRepository,
};
use vapter_infra_db::LedgerClient;
use tracing::debug;

/**
 * Contenedor de estado compartido (Thread-Safe) para el centro de mando.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente del Ledger de Evaluación (libSQL).
    pub database_client: LedgerClient,
    /// Publicador hacia la arteria de mensajería (o su doble de captura).
    pub queue_publisher: Arc<dyn QueuePublisher>,
    /// Registro nominal de las siete colas del plano de control.
    pub queue_topology: QueueTopology,

    // --- REPOSITORIOS DE AUTORIDAD ÚNICA ---
    pub customer_repository: Arc<CustomerRepository>,
    pub port_list_repository: Arc<PortListRepository>,
    pub scan_type_repository: Arc<ScanTypeRepository>,
    pub target_repository: Arc<TargetRepository>,
    pub scan_repository: Arc<ScanRepository>,
    pub scan_detail_repository: Arc<ScanDetailRepository>,
    pub fingerprint_repository: Arc<FingerprintRepository>,
    pub vuln_engine_repository: Arc<VulnEngineResultRepository>,
}

impl AppState {
    /**
     * Forja el Estado Maestro inyectando todas las dependencias.
     */
    pub fn new(
        database_client: LedgerClient,
        queue_publisher: Arc<dyn QueuePublisher>,
        queue_topology: QueueTopology,
    ) -> Self {
        debug!("🧬 [APP_STATE]: Executing composition root ignition sequence...");

        Self {
            customer_repository: Arc::new(CustomerRepository::new(database_client.clone())),
            port_list_repository: Arc::new(PortListRepository::new(database_client.clone())),
            scan_type_repository: Arc::new(ScanTypeRepository::new(database_client.clone())),
            target_repository: Arc::new(TargetRepository::new(database_client.clone())),
            scan_repository: Arc::new(ScanRepository::new(database_client.clone())),
            scan_detail_repository: Arc::new(ScanDetailRepository::new(database_client.clone())),
            fingerprint_repository: Arc::new(FingerprintRepository::new(database_client.clone())),
            vuln_engine_repository: Arc::new(VulnEngineResultRepository::new(database_client.clone())),
            database_client,
            queue_publisher,
            queue_topology,
        }
    }
}
