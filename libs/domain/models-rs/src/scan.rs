// [libs/domain/models-rs/src/scan.rs]
/*!
 * =================================================================
 * APARATO: SCAN LIFECYCLE MODELS (V4.1 - LINEAR LATTICE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTIDAD DE ESCANEO, RETÍCULA DE ESTADOS Y ARTEFACTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LINEAR LATTICE: 'ScanStatus' expone un rango lineal monótono; el
 *    reconciliador jamás aplica una transición que reduzca el rango.
 * 2. ABSORBING TERMINALS: 'Completed' y 'Failed' absorben toda señal
 *    tardía; la cancelación de usuario es un 'Failed' con mensaje canónico.
 * 3. ARTIFACT TYPING: Todo 'parsed_<stage>_results' es objeto JSON o
 *    NULL; nunca un booleano centinela.
 *
 * # Mathematical Proof (Monotonicity):
 * Sea r: Status -> N el rango lineal. Toda transición aplicada satisface
 * r(nuevo) > r(actual) o nuevo == actual (idempotencia); los estados con
 * r máximo no tienen sucesor. La retícula es por tanto un orden total
 * con dos elementos absorbentes.
 * =================================================================
 */

use crate::pipeline::StageModule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typeshare::typeshare;

/// Mensaje canónico registrado al cancelar un escaneo por mando de usuario.
pub const USER_CANCELLED_MESSAGE: &str = "Scan cancelled by user";

/// Estado soberano del ciclo de vida de un escaneo.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Queued")]
    Queued,
    #[serde(rename = "Nmap Scan Running")]
    NmapScanRunning,
    #[serde(rename = "Nmap Scan Completed")]
    NmapScanCompleted,
    #[serde(rename = "Finger Scan Running")]
    FingerScanRunning,
    #[serde(rename = "Finger Scan Completed")]
    FingerScanCompleted,
    #[serde(rename = "VulnEngine Running")]
    VulnEngineRunning,
    #[serde(rename = "VulnEngine Completed")]
    VulnEngineCompleted,
    #[serde(rename = "Web Scan Running")]
    WebScanRunning,
    #[serde(rename = "Web Scan Completed")]
    WebScanCompleted,
    #[serde(rename = "Vuln Lookup Running")]
    VulnLookupRunning,
    #[serde(rename = "Vuln Lookup Completed")]
    VulnLookupCompleted,
    #[serde(rename = "Report Generation Running")]
    ReportGenerationRunning,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Failed")]
    Failed,
}

impl ScanStatus {
    /// Forma textual persistida en el Ledger y expuesta por la API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "Pending",
            ScanStatus::Queued => "Queued",
            ScanStatus::NmapScanRunning => "Nmap Scan Running",
            ScanStatus::NmapScanCompleted => "Nmap Scan Completed",
            ScanStatus::FingerScanRunning => "Finger Scan Running",
            ScanStatus::FingerScanCompleted => "Finger Scan Completed",
            ScanStatus::VulnEngineRunning => "VulnEngine Running",
            ScanStatus::VulnEngineCompleted => "VulnEngine Completed",
            ScanStatus::WebScanRunning => "Web Scan Running",
            ScanStatus::WebScanCompleted => "Web Scan Completed",
            ScanStatus::VulnLookupRunning => "Vuln Lookup Running",
            ScanStatus::VulnLookupCompleted => "Vuln Lookup Completed",
            ScanStatus::ReportGenerationRunning => "Report Generation Running",
            ScanStatus::Completed => "Completed",
            ScanStatus::Failed => "Failed",
        }
    }

    /// Reconstruye el estado desde su forma textual persistida.
    pub fn parse(status_label: &str) -> Option<Self> {
        let parsed_status = match status_label {
            "Pending" => ScanStatus::Pending,
            "Queued" => ScanStatus::Queued,
            "Nmap Scan Running" => ScanStatus::NmapScanRunning,
            "Nmap Scan Completed" => ScanStatus::NmapScanCompleted,
            "Finger Scan Running" => ScanStatus::FingerScanRunning,
            "Finger Scan Completed" => ScanStatus::FingerScanCompleted,
            "VulnEngine Running" => ScanStatus::VulnEngineRunning,
            "VulnEngine Completed" => ScanStatus::VulnEngineCompleted,
            "Web Scan Running" => ScanStatus::WebScanRunning,
            "Web Scan Completed" => ScanStatus::WebScanCompleted,
            "Vuln Lookup Running" => ScanStatus::VulnLookupRunning,
            "Vuln Lookup Completed" => ScanStatus::VulnLookupCompleted,
            "Report Generation Running" => ScanStatus::ReportGenerationRunning,
            "Completed" => ScanStatus::Completed,
            "Failed" => ScanStatus::Failed,
            _ => return None,
        };
        Some(parsed_status)
    }

    /// Rango lineal del estado dentro de la retícula monótona.
    pub fn rank(&self) -> u8 {
        match self {
            ScanStatus::Pending => 0,
            ScanStatus::Queued => 1,
            ScanStatus::NmapScanRunning => 2,
            ScanStatus::NmapScanCompleted => 3,
            ScanStatus::FingerScanRunning => 4,
            ScanStatus::FingerScanCompleted => 5,
            ScanStatus::VulnEngineRunning => 6,
            ScanStatus::VulnEngineCompleted => 7,
            ScanStatus::WebScanRunning => 8,
            ScanStatus::WebScanCompleted => 9,
            ScanStatus::VulnLookupRunning => 10,
            ScanStatus::VulnLookupCompleted => 11,
            ScanStatus::ReportGenerationRunning => 12,
            ScanStatus::Completed => 13,
            ScanStatus::Failed => 14,
        }
    }

    /// Los estados terminales absorben toda señal posterior.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Estado 'Running' asociado a una etapa del pipeline.
    pub fn running_for(stage_module: StageModule) -> Self {
        match stage_module {
            StageModule::Nmap => ScanStatus::NmapScanRunning,
            StageModule::Fingerprint => ScanStatus::FingerScanRunning,
            StageModule::VulnEngine => ScanStatus::VulnEngineRunning,
            StageModule::Web => ScanStatus::WebScanRunning,
            StageModule::VulnLookup => ScanStatus::VulnLookupRunning,
            StageModule::Report => ScanStatus::ReportGenerationRunning,
        }
    }

    /// Estado 'Completed' asociado a una etapa del pipeline.
    /// La finalización del reporte sella el escaneo completo.
    pub fn completed_for(stage_module: StageModule) -> Self {
        match stage_module {
            StageModule::Nmap => ScanStatus::NmapScanCompleted,
            StageModule::Fingerprint => ScanStatus::FingerScanCompleted,
            StageModule::VulnEngine => ScanStatus::VulnEngineCompleted,
            StageModule::Web => ScanStatus::WebScanCompleted,
            StageModule::VulnLookup => ScanStatus::VulnLookupCompleted,
            StageModule::Report => ScanStatus::Completed,
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Una corrida end-to-end del pipeline contra un objetivo bajo una receta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub target_id: String,
    pub scan_type_id: String,
    pub status: ScanStatus,
    pub initiated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parsed_nmap_results: Option<Value>,
    #[serde(default)]
    pub parsed_fingerprint_results: Option<Value>,
    #[serde(default)]
    pub parsed_vuln_engine_results: Option<Value>,
    #[serde(default)]
    pub parsed_web_results: Option<Value>,
    #[serde(default)]
    pub parsed_vuln_lookup_results: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Artefacto estructurado de una etapa, si ya fue persistido.
    pub fn parsed_results_for(&self, stage_module: StageModule) -> Option<&Value> {
        let stage_artifact = match stage_module {
            StageModule::Nmap => &self.parsed_nmap_results,
            StageModule::Fingerprint => &self.parsed_fingerprint_results,
            StageModule::VulnEngine => &self.parsed_vuln_engine_results,
            StageModule::Web => &self.parsed_web_results,
            StageModule::VulnLookup => &self.parsed_vuln_lookup_results,
            StageModule::Report => return None,
        };
        stage_artifact.as_ref().filter(|value| !value.is_null())
    }
}

/// Detalle 1:1 del escaneo: puertos abiertos, OS y cronometría por etapa.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanDetail {
    pub id: String,
    pub scan_id: String,
    #[serde(default)]
    pub open_ports: Option<Value>,
    #[serde(default)]
    pub os_guess: Option<Value>,
    #[serde(default)]
    pub nmap_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nmap_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fingerprint_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fingerprint_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vuln_engine_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vuln_engine_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vuln_lookup_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vuln_lookup_completed_at: Option<DateTime<Utc>>,
}

/// Protocolo de transporte de un puerto detectado.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// Resultado de huella por puerto/servicio. Muchos por escaneo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintDetail {
    pub id: String,
    pub scan_id: String,
    pub target_id: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_product: Option<String>,
    #[serde(default)]
    pub service_version: Option<String>,
    #[serde(default)]
    pub service_info: Option<String>,
    /// Método utilizado para la huella (ej. fingerprintx, banner).
    pub fingerprint_method: String,
    /// Confianza [0,100] del veredicto de huella.
    pub confidence_score: u8,
    #[serde(default)]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub additional_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FingerprintDetail {
    /// Valida rangos de puerto y confianza antes de la persistencia.
    pub fn validate(&self) -> Result<(), crate::validation::ValidationError> {
        if self.port == 0 {
            return Err(crate::validation::ValidationError::InvalidPort(0));
        }
        if self.confidence_score > 100 {
            return Err(crate::validation::ValidationError::InvalidConfidence(
                self.confidence_score,
            ));
        }
        Ok(())
    }
}

/// Formato del reporte emitido por el motor externo de vulnerabilidades.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    #[serde(rename = "XML")]
    Xml,
    #[serde(rename = "JSON")]
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Xml => "XML",
            ReportFormat::Json => "JSON",
        }
    }
}

/// Conteo de vulnerabilidades por severidad extraído del reporte.
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityCount {
    #[typeshare(serialized_as = "number")]
    pub critical: u32,
    #[typeshare(serialized_as = "number")]
    pub high: u32,
    #[typeshare(serialized_as = "number")]
    pub medium: u32,
    #[typeshare(serialized_as = "number")]
    pub low: u32,
    #[typeshare(serialized_as = "number")]
    pub log: u32,
    #[typeshare(serialized_as = "number")]
    pub total: u32,
}

impl VulnerabilityCount {
    /// Suma de severidades cuando el reporte no declara el total pleno.
    pub fn severity_sum(&self) -> u32 {
        self.critical + self.high + self.medium + self.low + self.log
    }
}

/// Resultado único del motor externo de vulnerabilidades para un escaneo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnEngineResult {
    pub id: String,
    pub scan_id: String,
    pub target_id: String,
    #[serde(default)]
    pub external_task_id: Option<String>,
    #[serde(default)]
    pub external_report_id: Option<String>,
    #[serde(default)]
    pub external_target_id: Option<String>,
    pub external_status: String,
    /// Progreso porcentual [0,100] reportado por el motor.
    pub progress: u8,
    pub report_format: ReportFormat,
    #[serde(default)]
    pub full_report: Option<String>,
    pub vulnerability_count: VulnerabilityCount,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
