// [libs/infra/broker/src/queues.rs]
/*!
 * =================================================================
 * APARATO: QUEUE TOPOLOGY REGISTRY (V4.1 - DURABLE STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: NOMBRES DE COLAS, ARGUMENTOS DE DURABILIDAD Y BACKOFF
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE QUEUE PER STAGE: Seis colas de órdenes de etapa más una única
 *    cola multiplexada de actualizaciones de estado.
 * 2. OVERFLOW DISCIPLINE: TTL por mensaje de 1 hora, tope de 10 000
 *    mensajes con descarte por cabeza (drop-head).
 * 3. ENV OVERRIDES: Cada nombre de cola es reescribible por variable de
 *    entorno para despliegues multi-ambiente.
 * =================================================================
 */

use crate::errors::BrokerError;
use lapin::types::{AMQPValue, FieldTable};
use std::env;
use std::time::Duration;
use vapter_domain_models::StageModule;

/// TTL por mensaje: 1 hora en milisegundos.
pub const MESSAGE_TTL_MILLISECONDS: i32 = 3_600_000;
/// Tope de profundidad de cola antes del descarte por cabeza.
pub const QUEUE_MAX_LENGTH: i32 = 10_000;
/// Latido AMQP recomendado para cuerpos de etapa de larga duración.
pub const HEARTBEAT_SECONDS: u16 = 60;

/// Parámetros del retroceso exponencial de reconexión.
pub const RECONNECT_BASE_DELAY_SECONDS: u64 = 5;
pub const RECONNECT_MAX_DELAY_SECONDS: u64 = 300;
pub const MAX_CONNECTION_ATTEMPTS: u32 = 10;

/// Registro nominal de las siete colas del plano de control.
#[derive(Debug, Clone)]
pub struct QueueTopology {
    pub nmap_scan_requests: String,
    pub fingerprint_scan_requests: String,
    pub vuln_engine_scan_requests: String,
    pub web_scan_requests: String,
    pub vuln_lookup_requests: String,
    pub report_requests: String,
    pub scan_status_updates: String,
}

impl Default for QueueTopology {
    fn default() -> Self {
        Self {
            nmap_scan_requests: "nmap_scan_requests".into(),
            fingerprint_scan_requests: "fingerprint_scan_requests".into(),
            vuln_engine_scan_requests: "vuln_engine_scan_requests".into(),
            web_scan_requests: "web_scan_requests".into(),
            vuln_lookup_requests: "vuln_lookup_requests".into(),
            report_requests: "report_requests".into(),
            scan_status_updates: "scan_status_updates".into(),
        }
    }
}

impl QueueTopology {
    /// Hidrata la topología desde el entorno, con defaults canónicos.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nmap_scan_requests: env_or("NMAP_SCAN_REQUEST_QUEUE", &defaults.nmap_scan_requests),
            fingerprint_scan_requests: env_or(
                "FINGERPRINT_SCAN_REQUEST_QUEUE",
                &defaults.fingerprint_scan_requests,
            ),
            vuln_engine_scan_requests: env_or(
                "VULN_ENGINE_SCAN_REQUEST_QUEUE",
                &defaults.vuln_engine_scan_requests,
            ),
            web_scan_requests: env_or("WEB_SCAN_REQUEST_QUEUE", &defaults.web_scan_requests),
            vuln_lookup_requests: env_or("VULN_LOOKUP_REQUEST_QUEUE", &defaults.vuln_lookup_requests),
            report_requests: env_or("REPORT_REQUEST_QUEUE", &defaults.report_requests),
            scan_status_updates: env_or("SCAN_STATUS_UPDATE_QUEUE", &defaults.scan_status_updates),
        }
    }

    /// Cola de órdenes asociada a una etapa del pipeline.
    pub fn request_queue_for(&self, stage_module: StageModule) -> &str {
        match stage_module {
            StageModule::Nmap => &self.nmap_scan_requests,
            StageModule::Fingerprint => &self.fingerprint_scan_requests,
            StageModule::VulnEngine => &self.vuln_engine_scan_requests,
            StageModule::Web => &self.web_scan_requests,
            StageModule::VulnLookup => &self.vuln_lookup_requests,
            StageModule::Report => &self.report_requests,
        }
    }

    /// Las siete colas, para la declaración idempotente de topología.
    pub fn all_queues(&self) -> [&str; 7] {
        [
            &self.nmap_scan_requests,
            &self.fingerprint_scan_requests,
            &self.vuln_engine_scan_requests,
            &self.web_scan_requests,
            &self.vuln_lookup_requests,
            &self.report_requests,
            &self.scan_status_updates,
        ]
    }
}

/// URL del broker desde el entorno.
///
/// # Errors:
/// - `BrokerError::ConfigurationError` si BROKER_URL está ausente.
pub fn broker_url_from_env() -> Result<String, BrokerError> {
    env::var("BROKER_URL")
        .map_err(|_| BrokerError::ConfigurationError("BROKER_URL undefined".into()))
}

/// Argumentos de durabilidad aplicados a toda cola del plano de control.
pub fn durable_queue_arguments() -> FieldTable {
    let mut queue_arguments = FieldTable::default();
    queue_arguments.insert("x-message-ttl".into(), AMQPValue::LongInt(MESSAGE_TTL_MILLISECONDS));
    queue_arguments.insert("x-max-length".into(), AMQPValue::LongInt(QUEUE_MAX_LENGTH));
    queue_arguments.insert("x-overflow".into(), AMQPValue::LongString("drop-head".into()));
    queue_arguments
}

/// Retardo de reconexión para el intento N (base 5s, tope 5min).
pub fn reconnect_delay(attempt_number: u32) -> Duration {
    let exponential_delay = RECONNECT_BASE_DELAY_SECONDS
        .saturating_mul(2u64.saturating_pow(attempt_number.min(16)));
    Duration::from_secs(exponential_delay.min(RECONNECT_MAX_DELAY_SECONDS))
}

/// Garantiza el parámetro 'heartbeat' en la URI AMQP sin pisar uno explícito.
pub fn ensure_heartbeat(broker_url: &str) -> String {
    if broker_url.contains("heartbeat=") {
        return broker_url.to_string();
    }
    let separator = if broker_url.contains('?') { '&' } else { '?' };
    format!("{}{}heartbeat={}", broker_url, separator, HEARTBEAT_SECONDS)
}

fn env_or(variable_name: &str, default_value: &str) -> String {
    env::var(variable_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_value.to_string())
}
