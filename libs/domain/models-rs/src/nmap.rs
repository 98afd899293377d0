// [libs/domain/models-rs/src/nmap.rs]
/*!
 * =================================================================
 * APARATO: NMAP RESULT CONTRACTS (V4.1 - DERIVATION SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: FORMA ESTRUCTURADA DEL DESCUBRIMIENTO Y SU DERIVACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DERIVATION CONTRACT: De 'hosts[].ports[]' se derivan únicamente los
 *    puertos con state == "open", ordenados ascendentemente, separados
 *    por protocolo; el OS se toma del primer host.
 * 2. TOLERANT INGESTION: 'portid' y 'os' llegan con tipos laxos desde el
 *    parseo XML del worker; la ingesta los normaliza sin colapsar.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resultado estructurado completo de la etapa de descubrimiento.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NmapRunResults {
    #[serde(default)]
    pub hosts: Vec<NmapHost>,
    #[serde(default)]
    pub scan_info: Value,
    #[serde(default)]
    pub statistics: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NmapHost {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Value>,
    #[serde(default)]
    pub hostnames: Vec<Value>,
    #[serde(default)]
    pub ports: Vec<NmapPort>,
    /// Objeto de detección de OS, o lista de 'osmatch' según el origen.
    #[serde(default)]
    pub os: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmapPort {
    /// Identificador de puerto; el XML de nmap lo entrega como texto.
    #[serde(deserialize_with = "deserialize_flexible_port", serialize_with = "serialize_port_text")]
    pub portid: u16,
    pub protocol: String,
    pub state: String,
    #[serde(default)]
    pub service: Option<NmapService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NmapService {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub extrainfo: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub conf: Option<String>,
}

/// Entrada de puerto abierto dentro de 'ScanDetail.open_ports'.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenPortEntry {
    pub port: u16,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrainfo: Option<String>,
}

/// Mapa de puertos abiertos por protocolo, ordenados ascendentemente.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenPorts {
    pub tcp: Vec<OpenPortEntry>,
    pub udp: Vec<OpenPortEntry>,
}

/// Veredicto de sistema operativo derivado del primer host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsGuess {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osfamily: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osgen: Option<String>,
}

/// Deriva el mapa de puertos abiertos del resultado de descubrimiento.
/// Solo 'state == "open"', orden ascendente por puerto, por protocolo.
pub fn derive_open_ports(discovery_results: &NmapRunResults) -> OpenPorts {
    let mut open_ports_map = OpenPorts::default();

    for discovered_host in &discovery_results.hosts {
        for scanned_port in &discovered_host.ports {
            if scanned_port.state != "open" {
                continue;
            }

            let service_snapshot = scanned_port.service.clone().unwrap_or_default();
            let port_entry = OpenPortEntry {
                port: scanned_port.portid,
                state: scanned_port.state.clone(),
                service: service_snapshot.name,
                product: service_snapshot.product,
                version: service_snapshot.version,
                extrainfo: service_snapshot.extrainfo,
            };

            match scanned_port.protocol.as_str() {
                "udp" => open_ports_map.udp.push(port_entry),
                _ => open_ports_map.tcp.push(port_entry),
            }
        }
    }

    open_ports_map.tcp.sort_by_key(|entry| entry.port);
    open_ports_map.udp.sort_by_key(|entry| entry.port);
    open_ports_map
}

/// Deriva el veredicto de OS desde el primer host del resultado.
/// Acepta tanto un objeto único como la lista de 'osmatch' del XML.
pub fn derive_os_guess(discovery_results: &NmapRunResults) -> Option<OsGuess> {
    let first_host = discovery_results.hosts.first()?;

    let os_candidate: &Value = match &first_host.os {
        Value::Array(osmatch_list) => osmatch_list.first()?,
        Value::Object(_) => &first_host.os,
        _ => return None,
    };

    let os_name = os_candidate.get("name")?.as_str()?.to_string();

    Some(OsGuess {
        name: os_name,
        accuracy: extract_text_field(os_candidate, "accuracy"),
        vendor: extract_text_field(os_candidate, "vendor"),
        os_type: extract_text_field(os_candidate, "type"),
        osfamily: extract_text_field(os_candidate, "osfamily"),
        osgen: extract_text_field(os_candidate, "osgen"),
    })
}

fn extract_text_field(json_object: &Value, field_name: &str) -> Option<String> {
    match json_object.get(field_name)? {
        Value::String(text_value) => Some(text_value.clone()),
        Value::Number(numeric_value) => Some(numeric_value.to_string()),
        _ => None,
    }
}

fn deserialize_flexible_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(numeric_port) => numeric_port
            .as_u64()
            .filter(|port| (1..=u16::MAX as u64).contains(port))
            .map(|port| port as u16)
            .ok_or_else(|| D::Error::custom("port out of range")),
        Value::String(textual_port) => textual_port
            .trim()
            .parse::<u16>()
            .map_err(|_| D::Error::custom("unparseable port text")),
        _ => Err(D::Error::custom("unsupported portid shape")),
    }
}

fn serialize_port_text<S>(port: &u16, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u16(*port)
}
