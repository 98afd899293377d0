// [apps/stage-worker/src/config.rs]
/*!
 * =================================================================
 * APARATO: WORKER SETTINGS HYDRATOR (V4.2 - ENV SOVEREIGN)
 * CLASIFICACIÓN: APPLICATION CONFIG (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: HIDRATACIÓN TIPADA DE DIRECTIVAS DE ENTORNO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ONE STRUCT PER PROCESS: Toda perilla del worker vive aquí; los
 *    ejecutores jamás leen el entorno directamente.
 * 2. SANE DEFAULTS: Valores idénticos a los del despliegue de
 *    referencia (timeouts por etapa, pool de huellas, reintentos).
 * =================================================================
 */

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Directivas del motor externo de vulnerabilidades (protocolo GMP).
#[derive(Debug, Clone)]
pub struct VulnEngineSettings {
    pub username: String,
    pub password: String,
    pub socket_path: PathBuf,
    pub scan_config_id: String,
    pub scanner_id: String,
    pub port_list_id: String,
    pub polling_interval: Duration,
    pub max_scan_time: Duration,
    pub report_format: String,
}

/// Directivas completas del proceso worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub broker_url: String,
    pub api_gateway_url: String,
    pub api_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub temp_results_dir: PathBuf,
    pub keep_raw_output: bool,

    // --- TIMEOUTS DUROS POR ETAPA ---
    pub nmap_timeout: Duration,
    pub fingerprint_timeout_per_port: Duration,
    pub web_scan_timeout: Duration,
    pub vuln_lookup_timeout: Duration,
    pub report_timeout: Duration,

    pub max_concurrent_fingerprints: usize,
    pub fingerprintx_path: PathBuf,
    pub nmap_path: PathBuf,

    pub vuln_engine: VulnEngineSettings,
}

impl WorkerSettings {
    /// Hidrata las directivas desde el entorno del proceso.
    ///
    /// # Errors:
    /// Retorna el nombre de la variable obligatoria ausente (BROKER_URL).
    pub fn from_env() -> Result<Self, String> {
        let broker_url = env::var("BROKER_URL")
            .map_err(|_| "BROKER_URL undefined in runtime environment".to_string())?;

        Ok(Self {
            broker_url,
            api_gateway_url: env_or("API_GATEWAY_URL", "http://api_gateway:8080"),
            api_timeout: duration_secs_env("API_TIMEOUT", 30),
            max_retries: integer_env("MAX_RETRIES", 3) as u32,
            retry_delay: duration_secs_env("RETRY_DELAY", 5),
            temp_results_dir: PathBuf::from(env_or("TEMP_RESULTS_DIR", "/tmp/vapter_results")),
            keep_raw_output: env_or("KEEP_RAW_OUTPUT", "false").eq_ignore_ascii_case("true"),

            nmap_timeout: duration_secs_env("NMAP_TIMEOUT", 3600),
            fingerprint_timeout_per_port: duration_secs_env("FINGERPRINT_TIMEOUT_PER_PORT", 60),
            web_scan_timeout: duration_secs_env("WEB_SCAN_TIMEOUT", 600),
            vuln_lookup_timeout: duration_secs_env("VULN_LOOKUP_TIMEOUT", 600),
            report_timeout: duration_secs_env("REPORT_TIMEOUT", 300),

            max_concurrent_fingerprints: integer_env("MAX_CONCURRENT_FINGERPRINTS", 10) as usize,
            fingerprintx_path: PathBuf::from(env_or("FINGERPRINTX_PATH", "/usr/local/bin/fingerprintx")),
            nmap_path: PathBuf::from(env_or("NMAP_PATH", "nmap")),

            vuln_engine: VulnEngineSettings {
                username: env_or("VULN_ENGINE_USERNAME", "vapter_api"),
                password: env_or("VULN_ENGINE_PASSWORD", ""),
                socket_path: PathBuf::from(env_or(
                    "VULN_ENGINE_SOCKET_PATH",
                    "/mnt/vuln_engine_sockets/gvmd.sock",
                )),
                scan_config_id: env_or(
                    "VULN_ENGINE_SCAN_CONFIG_ID",
                    "daba56c8-73ec-11df-a475-002264764cea",
                ),
                scanner_id: env_or(
                    "VULN_ENGINE_SCANNER_ID",
                    "08b69003-5fc2-4037-a479-93b440211c73",
                ),
                port_list_id: env_or(
                    "VULN_ENGINE_PORT_LIST_ID",
                    "730ef368-57e2-11e1-a90f-406186ea4fc5",
                ),
                polling_interval: duration_secs_env("VULN_ENGINE_POLLING_INTERVAL", 60),
                max_scan_time: duration_secs_env("VULN_ENGINE_MAX_SCAN_TIME", 14400),
                report_format: env_or("VULN_ENGINE_REPORT_FORMAT", "XML"),
            },
        })
    }
}

fn env_or(variable_name: &str, default_value: &str) -> String {
    env::var(variable_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_value.to_string())
}

fn integer_env(variable_name: &str, default_value: u64) -> u64 {
    env::var(variable_name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default_value)
}

fn duration_secs_env(variable_name: &str, default_seconds: u64) -> Duration {
    Duration::from_secs(integer_env(variable_name, default_seconds))
}
