// [apps/stage-worker/src/stages/nmap.rs]
/*!
 * =================================================================
 * APARATO: NMAP DISCOVERY EXECUTOR (V4.4 - RECIPE DRIVEN)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: DESCUBRIMIENTO DE PUERTOS Y PARSEO DEL XML
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RECIPE FLAGS: 'only_discovery' -> -sn; 'consider_alive' -> -Pn;
 *    'be_quiet' -> -T2; la lista de puertos gobierna -p.
 * 2. XML CONTRACT: Siempre '-oX -' y parseo a la forma estructurada
 *    {hosts, scan_info, statistics} que el núcleo deriva.
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use roxmltree::Document;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument};
use vapter_domain_models::{ScanType, StageModule, StagePhase};

pub struct NmapExecutor;

#[async_trait]
impl StageExecutor for NmapExecutor {
    fn module(&self) -> StageModule {
        StageModule::Nmap
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        settings.nmap_timeout
    }

    #[instrument(skip(self, context), fields(target = %context.request.target_host))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        // 1. INSUMOS: receta y lista de puertos.
        let scan_type = match &context.request.scan_type_id {
            Some(scan_type_identifier) => {
                Some(context.gateway.fetch_scan_type(scan_type_identifier).await?)
            }
            None => None,
        };

        let port_specification = match scan_type.as_ref().and_then(|recipe| recipe.port_list_id.clone()) {
            Some(port_list_identifier) => {
                let port_list = context.gateway.fetch_port_list(&port_list_identifier).await?;
                build_port_specification(port_list.tcp_ports.as_deref(), port_list.udp_ports.as_deref())
            }
            None => None,
        };

        // 2. HERRAMIENTA EXTERNA
        let command_arguments =
            build_nmap_arguments(scan_type.as_ref(), port_specification.as_deref(), &context.request.target_host);

        info!("🔍 [NMAP]: Executing discovery: nmap {}", command_arguments.join(" "));

        let tool_output = Command::new(&context.settings.nmap_path)
            .args(&command_arguments)
            .output()
            .await
            .map_err(|spawn_fault| StageFailure::Permanent(format!("nmap spawn failed: {}", spawn_fault)))?;

        if !tool_output.status.success() {
            let stderr_excerpt = String::from_utf8_lossy(&tool_output.stderr);
            return Err(StageFailure::Permanent(format!(
                "nmap exited with {}: {}",
                tool_output.status,
                stderr_excerpt.trim()
            )));
        }

        // 3. PARSEO A LA FORMA ESTRUCTURADA
        let _ = context
            .status_emitter
            .emit_phase(&context.request.scan_id, StagePhase::Parsing)
            .await;

        let xml_output = String::from_utf8_lossy(&tool_output.stdout);
        let discovery_artifact = parse_nmap_xml(&xml_output)
            .map_err(|parse_fault| StageFailure::Permanent(format!("nmap XML parse failed: {}", parse_fault)))?;

        // 4. CARGA DURABLE HACIA EL NÚCLEO
        context
            .gateway
            .upload_parsed_results(&context.request.scan_id, StageModule::Nmap, &discovery_artifact)
            .await?;

        info!("📤 [NMAP]: Discovery artifact sealed for scan [{}].", context.request.scan_id);
        Ok(())
    }
}

/// Combina las especificaciones TCP/UDP en la gramática '-p' de nmap.
fn build_port_specification(tcp_ports: Option<&str>, udp_ports: Option<&str>) -> Option<String> {
    match (tcp_ports.filter(|s| !s.trim().is_empty()), udp_ports.filter(|s| !s.trim().is_empty())) {
        (Some(tcp_specification), Some(udp_specification)) => {
            Some(format!("T:{},U:{}", tcp_specification, udp_specification))
        }
        (Some(tcp_specification), None) => Some(format!("T:{}", tcp_specification)),
        (None, Some(udp_specification)) => Some(format!("U:{}", udp_specification)),
        (None, None) => None,
    }
}

/// Construye la línea de argumentos honrando las banderas de la receta.
pub fn build_nmap_arguments(
    scan_type: Option<&ScanType>,
    port_specification: Option<&str>,
    target_host: &str,
) -> Vec<String> {
    let mut command_arguments: Vec<String> = vec!["-v".into(), "--reason".into()];

    let only_discovery = scan_type.map(|recipe| recipe.only_discovery).unwrap_or(false);

    if only_discovery {
        // Solo liveness del host: sin enumeración de puertos.
        command_arguments.push("-sn".into());
    } else {
        if scan_type.map(|recipe| recipe.consider_alive).unwrap_or(false) {
            command_arguments.push("-Pn".into());
        }
        if scan_type.map(|recipe| recipe.be_quiet).unwrap_or(false) {
            command_arguments.push("-T2".into());
        }

        if let Some(port_spec) = port_specification {
            if port_spec.contains("U:") {
                command_arguments.push("-sU".into());
            }
            if port_spec.contains("T:") {
                command_arguments.push("-sS".into());
            }
            command_arguments.push("-p".into());
            command_arguments.push(port_spec.to_string());
        }

        // Detección de servicios y OS para el derivado del núcleo.
        command_arguments.push("-sV".into());
        command_arguments.push("-O".into());
    }

    command_arguments.push("-oX".into());
    command_arguments.push("-".into());
    command_arguments.push(target_host.to_string());
    command_arguments
}

/**
 * Parsea el XML '-oX -' a la forma estructurada del contrato.
 *
 * # Errors:
 * Texto del fallo sintáctico; el llamador lo sella como permanente.
 */
pub fn parse_nmap_xml(xml_output: &str) -> Result<Value, String> {
    let parsed_document = Document::parse(xml_output).map_err(|e| e.to_string())?;
    let document_root = parsed_document.root_element();

    let mut scan_info = Map::new();
    for scaninfo_node in document_root.children().filter(|node| node.has_tag_name("scaninfo")) {
        if let Some(protocol_label) = scaninfo_node.attribute("protocol") {
            scan_info.insert(
                protocol_label.to_string(),
                json!({
                    "type": scaninfo_node.attribute("type"),
                    "numservices": scaninfo_node.attribute("numservices"),
                    "services": scaninfo_node.attribute("services"),
                }),
            );
        }
    }

    let mut hosts = Vec::new();
    for host_node in document_root.children().filter(|node| node.has_tag_name("host")) {
        let host_status = host_node
            .children()
            .find(|node| node.has_tag_name("status"))
            .and_then(|status_node| status_node.attribute("state"))
            .map(str::to_string);

        let addresses: Vec<Value> = host_node
            .children()
            .filter(|node| node.has_tag_name("address"))
            .map(|address_node| {
                json!({
                    "addr": address_node.attribute("addr"),
                    "addrtype": address_node.attribute("addrtype"),
                })
            })
            .collect();

        let hostnames: Vec<Value> = host_node
            .children()
            .find(|node| node.has_tag_name("hostnames"))
            .map(|hostnames_node| {
                hostnames_node
                    .children()
                    .filter(|node| node.has_tag_name("hostname"))
                    .map(|hostname_node| {
                        json!({
                            "name": hostname_node.attribute("name"),
                            "type": hostname_node.attribute("type"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ports: Vec<Value> = host_node
            .children()
            .find(|node| node.has_tag_name("ports"))
            .map(|ports_node| {
                ports_node
                    .children()
                    .filter(|node| node.has_tag_name("port"))
                    .map(|port_node| {
                        let state = port_node
                            .children()
                            .find(|node| node.has_tag_name("state"))
                            .and_then(|state_node| state_node.attribute("state"));

                        let service = port_node
                            .children()
                            .find(|node| node.has_tag_name("service"))
                            .map(|service_node| {
                                json!({
                                    "name": service_node.attribute("name"),
                                    "product": service_node.attribute("product"),
                                    "version": service_node.attribute("version"),
                                    "extrainfo": service_node.attribute("extrainfo"),
                                    "method": service_node.attribute("method"),
                                    "conf": service_node.attribute("conf"),
                                })
                            })
                            .unwrap_or_else(|| json!({}));

                        json!({
                            "portid": port_node.attribute("portid"),
                            "protocol": port_node.attribute("protocol"),
                            "state": state,
                            "service": service,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let os_matches: Vec<Value> = host_node
            .children()
            .find(|node| node.has_tag_name("os"))
            .map(|os_node| {
                os_node
                    .children()
                    .filter(|node| node.has_tag_name("osmatch"))
                    .map(|osmatch_node| {
                        json!({
                            "name": osmatch_node.attribute("name"),
                            "accuracy": osmatch_node.attribute("accuracy"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        hosts.push(json!({
            "status": host_status,
            "addresses": addresses,
            "hostnames": hostnames,
            "ports": ports,
            "os": os_matches,
        }));
    }

    let mut statistics = Map::new();
    if let Some(runstats_node) = document_root.children().find(|node| node.has_tag_name("runstats")) {
        if let Some(finished_node) = runstats_node.children().find(|node| node.has_tag_name("finished")) {
            statistics.insert("timestr".into(), json!(finished_node.attribute("timestr")));
            statistics.insert("elapsed".into(), json!(finished_node.attribute("elapsed")));
            statistics.insert("exit".into(), json!(finished_node.attribute("exit")));
        }
        if let Some(hosts_node) = runstats_node.children().find(|node| node.has_tag_name("hosts")) {
            statistics.insert(
                "hosts".into(),
                json!({
                    "up": hosts_node.attribute("up"),
                    "down": hosts_node.attribute("down"),
                    "total": hosts_node.attribute("total"),
                }),
            );
        }
    }

    Ok(json!({
        "hosts": hosts,
        "scan_info": scan_info,
        "statistics": statistics,
    }))
}
