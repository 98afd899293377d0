// [libs/domain/models-rs/src/pipeline.rs]
/*!
 * =================================================================
 * APARATO: PIPELINE WIRE CONTRACTS (V4.2 - CLOSED VARIANTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE MENSAJERÍA ENTRE NÚCLEO Y WORKERS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CLOSED VARIANTS: 'StageModule' y 'StagePhase' son enums cerrados;
 *    un módulo o estado desconocido colapsa el parseo del mensaje y la
 *    entrega es rechazada sin re-encolado.
 * 2. BACKWARD COMPAT: El alias 'error' se acepta como 'failed' y
 *    'started' como 'running' en la ingesta, pero este repositorio solo
 *    emite las formas canónicas.
 * 3. SIGNAL REFINEMENT: 'StatusSignal' refina el mensaje plano del cable
 *    en variantes que transportan únicamente los campos que usan.
 *
 * # Mathematical Proof (Per-Scan Ordering):
 * FIFO por cola + una sola etapa en vuelo por escaneo implican orden
 * total de señales por escaneo; entre escaneos no se exige orden alguno.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Etapa del pipeline. Una cola de trabajo y un worker por variante.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageModule {
    /// Descubrimiento de puertos (nmap).
    Nmap,
    /// Huella de servicios por puerto (fingerprintx).
    Fingerprint,
    /// Motor externo de vulnerabilidades (reporte XML masivo).
    VulnEngine,
    /// Sondeo de superficies web.
    Web,
    /// Búsqueda de vulnerabilidades por servicio detectado.
    VulnLookup,
    /// Ensamblado del reporte final.
    Report,
}

/// Orden canónico de plugins post-descubrimiento.
pub const CANONICAL_PLUGIN_ORDER: [StageModule; 4] = [
    StageModule::Fingerprint,
    StageModule::VulnEngine,
    StageModule::Web,
    StageModule::VulnLookup,
];

impl StageModule {
    /// Etiqueta canónica del módulo en el cable.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageModule::Nmap => "nmap",
            StageModule::Fingerprint => "fingerprint",
            StageModule::VulnEngine => "vuln_engine",
            StageModule::Web => "web",
            StageModule::VulnLookup => "vuln_lookup",
            StageModule::Report => "report",
        }
    }

    /// Posición de la etapa en el orden lineal del pipeline.
    /// El reporte no participa del orden de plugins.
    pub fn pipeline_position(&self) -> u8 {
        match self {
            StageModule::Nmap => 0,
            StageModule::Fingerprint => 1,
            StageModule::VulnEngine => 2,
            StageModule::Web => 3,
            StageModule::VulnLookup => 4,
            StageModule::Report => 5,
        }
    }

    /// Clave del campo 'parsed_<stage>_results' asociado a la etapa.
    pub fn parsed_results_field(&self) -> &'static str {
        match self {
            StageModule::Nmap => "parsed_nmap_results",
            StageModule::Fingerprint => "parsed_fingerprint_results",
            StageModule::VulnEngine => "parsed_vuln_engine_results",
            StageModule::Web => "parsed_web_results",
            StageModule::VulnLookup => "parsed_vuln_lookup_results",
            StageModule::Report => "report_path",
        }
    }
}

impl std::fmt::Display for StageModule {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Fase reportada por un worker sobre su etapa en vuelo.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// El worker tomó el mensaje de la cola.
    Received,
    /// La herramienta externa está en ejecución.
    #[serde(alias = "started")]
    Running,
    /// La salida de la herramienta está siendo estructurada.
    Parsing,
    /// Etapa terminal exitosa: resultados ya persistidos.
    Completed,
    /// Etapa terminal fallida.
    #[serde(alias = "error")]
    Failed,
}

impl StagePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StagePhase::Completed | StagePhase::Failed)
    }
}

/// Orden de trabajo de etapa publicada por el despachador y consumida
/// por el worker correspondiente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequest {
    pub scan_id: String,
    pub target_id: String,
    pub target_host: String,
    #[serde(default)]
    pub scan_type_id: Option<String>,
    pub plugin: StageModule,
    pub timestamp: DateTime<Utc>,
}

impl StageRequest {
    /// Verifica la presencia de los campos obligatorios del contrato.
    ///
    /// # Errors:
    /// Retorna la lista de campos vacíos; el mensaje debe rechazarse sin
    /// re-encolado (malformación permanente).
    pub fn validate(&self) -> Result<(), Vec<&'static str>> {
        let mut missing_field_registry = Vec::new();
        if self.scan_id.trim().is_empty() {
            missing_field_registry.push("scan_id");
        }
        if self.target_id.trim().is_empty() {
            missing_field_registry.push("target_id");
        }
        if self.target_host.trim().is_empty() {
            missing_field_registry.push("target_host");
        }
        if missing_field_registry.is_empty() {
            Ok(())
        } else {
            Err(missing_field_registry)
        }
    }
}

/// Mensaje plano de la cola de estados, tal como viaja por el cable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub scan_id: String,
    pub module: StageModule,
    pub status: StagePhase,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Progreso porcentual [0,100] transportado por eventos 'running'.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl StatusEvent {
    /// Construye un evento canónico con marca temporal presente.
    pub fn new(scan_id: impl Into<String>, module: StageModule, status: StagePhase) -> Self {
        Self {
            scan_id: scan_id.into(),
            module,
            status,
            timestamp: Utc::now(),
            message: None,
            error_details: None,
            progress: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, error_details: impl Into<String>) -> Self {
        self.error_details = Some(error_details.into());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Refina el mensaje plano en la señal tipada del reconciliador.
    pub fn into_signal(self) -> StatusSignal {
        match self.status {
            StagePhase::Received => StatusSignal::StageReceived { module: self.module },
            StagePhase::Running => StatusSignal::StageRunning {
                module: self.module,
                progress: self.progress,
            },
            StagePhase::Parsing => StatusSignal::StageParsing { module: self.module },
            StagePhase::Completed => StatusSignal::StageCompleted {
                module: self.module,
                message: self.message,
            },
            StagePhase::Failed => StatusSignal::StageFailed {
                module: self.module,
                error_details: self
                    .error_details
                    .or(self.message)
                    .unwrap_or_else(|| format!("{} stage failed", self.module)),
            },
        }
    }
}

/// Señal tipada del reconciliador: cada variante transporta únicamente
/// los campos que esa combinación (módulo, fase) realmente utiliza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSignal {
    StageReceived { module: StageModule },
    StageRunning { module: StageModule, progress: Option<u8> },
    StageParsing { module: StageModule },
    StageCompleted { module: StageModule, message: Option<String> },
    StageFailed { module: StageModule, error_details: String },
}

impl StatusSignal {
    pub fn module(&self) -> StageModule {
        match self {
            StatusSignal::StageReceived { module }
            | StatusSignal::StageRunning { module, .. }
            | StatusSignal::StageParsing { module }
            | StatusSignal::StageCompleted { module, .. }
            | StatusSignal::StageFailed { module, .. } => *module,
        }
    }
}
