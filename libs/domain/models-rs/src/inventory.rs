// [libs/domain/models-rs/src/inventory.rs]
/*!
 * =================================================================
 * APARATO: INVENTORY DOMAIN MODELS (V4.0 - RECIPE ALIGNED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ENTIDADES DE CLIENTES, OBJETIVOS Y RECETAS DE ESCANEO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RECIPE SOVEREIGNTY: 'ScanType' es la receta soberana del pipeline;
 *    sus cuatro banderas de plugin definen el subconjunto ordenado de
 *    etapas post-descubrimiento.
 * 2. SOFT DELETE PARITY: Toda entidad transporta 'deleted_at' para que
 *    el Ledger oculte filas sin romper la historia referencial.
 * 3. NOMINAL PURITY: Erradicación total de abreviaciones.
 *
 * # Mathematical Proof (Recipe Closure):
 * El conjunto de plugins es cerrado y ordenado. Para toda receta R, las
 * etapas ejecutadas son exactamente el subconjunto habilitado de
 * [fingerprint, vuln_engine, web, vuln_lookup] en ese orden.
 * =================================================================
 */

use crate::pipeline::StageModule;
use crate::validation::{validate_port_list_definition, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cliente propietario de objetivos de evaluación (multi-tenancy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Objetivo de evaluación: una dirección IP o un FQDN bajo un cliente.
///
/// Invariante: '(customer_id, address)' es único entre objetivos vivos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Lista de puertos TCP/UDP expresada como especificación textual
/// ('22,80,443' o '1-1024'). Al menos uno de los dos campos debe existir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tcp_ports: Option<String>,
    #[serde(default)]
    pub udp_ports: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PortList {
    /// Valida la especificación completa de puertos de la lista.
    ///
    /// # Errors:
    /// - `ValidationError::EmptyPortList` si ambos campos están vacíos.
    /// - `ValidationError::InvalidPortSpec` ante puertos o rangos ilegales.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_port_list_definition(self.tcp_ports.as_deref(), self.udp_ports.as_deref())
    }
}

/// Receta soberana del pipeline: banderas de descubrimiento y plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanType {
    pub id: String,
    pub name: String,
    /// Solo liveness del host: sin enumeración de puertos ni plugins.
    pub only_discovery: bool,
    /// Omite la fase de descubrimiento: el objetivo se asume vivo.
    pub consider_alive: bool,
    /// Reduce la intensidad de sondeo del descubridor.
    pub be_quiet: bool,
    #[serde(default)]
    pub port_list_id: Option<String>,
    pub plugin_fingerprint: bool,
    pub plugin_vuln_engine: bool,
    pub plugin_web: bool,
    pub plugin_vuln_lookup: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ScanType {
    /// Valida la coherencia interna de la receta.
    ///
    /// # Errors:
    /// - `ValidationError::ConflictingRecipe` si 'only_discovery' convive
    ///   con cualquier plugin post-descubrimiento.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.only_discovery && self.any_plugin_enabled() {
            return Err(ValidationError::ConflictingRecipe);
        }
        Ok(())
    }

    /// Indica si la receta habilita al menos un plugin post-descubrimiento.
    pub fn any_plugin_enabled(&self) -> bool {
        self.plugin_fingerprint
            || self.plugin_vuln_engine
            || self.plugin_web
            || self.plugin_vuln_lookup
    }

    /// Subconjunto ordenado de plugins habilitados, en el orden canónico
    /// [fingerprint, vuln_engine, web, vuln_lookup].
    pub fn enabled_plugins(&self) -> Vec<StageModule> {
        let mut enabled_plugin_sequence = Vec::with_capacity(4);
        if self.plugin_fingerprint {
            enabled_plugin_sequence.push(StageModule::Fingerprint);
        }
        if self.plugin_vuln_engine {
            enabled_plugin_sequence.push(StageModule::VulnEngine);
        }
        if self.plugin_web {
            enabled_plugin_sequence.push(StageModule::Web);
        }
        if self.plugin_vuln_lookup {
            enabled_plugin_sequence.push(StageModule::VulnLookup);
        }
        enabled_plugin_sequence
    }

    /// Determina si la receta habilita un plugin específico.
    pub fn is_plugin_enabled(&self, plugin_module: StageModule) -> bool {
        match plugin_module {
            StageModule::Fingerprint => self.plugin_fingerprint,
            StageModule::VulnEngine => self.plugin_vuln_engine,
            StageModule::Web => self.plugin_web,
            StageModule::VulnLookup => self.plugin_vuln_lookup,
            StageModule::Nmap | StageModule::Report => false,
        }
    }
}
