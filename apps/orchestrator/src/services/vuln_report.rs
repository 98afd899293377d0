// [apps/orchestrator/src/services/vuln_report.rs]
/*!
 * =================================================================
 * APARATO: VULN REPORT ANALYZER (V4.2 - RESULT COUNT EXTRACTION)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXTRACCIÓN DE CONTEOS DE SEVERIDAD DEL REPORTE XML
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL INGESTION: El cuerpo puede llegar como XML crudo o como XML
 *    codificado dentro de una cadena JSON; ambos caminos convergen.
 * 2. COUNT CONTRACT: Se localiza 'report/result_count' y se extraen
 *    {high, medium, low, log}; 'total' proviene de 'result_count/full'
 *    cuando existe, o de la suma de severidades.
 * 3. VERBATIM STORAGE: El cuerpo crudo se almacena intacto; este aparato
 *    solo deriva los agregados.
 * =================================================================
 */

use roxmltree::{Document, Node};
use tracing::{instrument, warn};
use vapter_domain_models::VulnerabilityCount;

/**
 * Deriva el conteo de vulnerabilidades por severidad del reporte.
 *
 * Cuerpos ilegibles degradan a conteo cero con advertencia: la ingesta
 * del reporte jamás colapsa por un XML exótico del motor externo.
 */
#[instrument(skip(report_body), fields(body_length = report_body.len()))]
pub fn extract_vulnerability_count(report_body: &str) -> VulnerabilityCount {
    let normalized_body = normalize_report_body(report_body);

    let parsed_document = match Document::parse(&normalized_body) {
        Ok(document) => document,
        Err(parse_fault) => {
            warn!("⚠️ [VULN_REPORT]: Unparseable report body ({}); zero counts derived.", parse_fault);
            return VulnerabilityCount::default();
        }
    };

    let Some(result_count_node) = parsed_document
        .descendants()
        .find(|node| node.has_tag_name("result_count"))
    else {
        warn!("⚠️ [VULN_REPORT]: No 'result_count' element located; zero counts derived.");
        return VulnerabilityCount::default();
    };

    let mut severity_count = VulnerabilityCount {
        critical: severity_value(&result_count_node, "critical"),
        high: severity_value(&result_count_node, "high"),
        medium: severity_value(&result_count_node, "medium"),
        low: severity_value(&result_count_node, "low"),
        log: severity_value(&result_count_node, "log"),
        total: 0,
    };

    // 'full' directo bajo result_count dicta el total pleno del reporte.
    severity_count.total = direct_child_integer(&result_count_node, "full")
        .unwrap_or_else(|| severity_count.severity_sum());

    severity_count
}

/// Desenvuelve un XML codificado como cadena JSON, si corresponde.
fn normalize_report_body(report_body: &str) -> String {
    let trimmed_body = report_body.trim();

    if trimmed_body.starts_with('"') {
        if let Ok(decoded_xml) = serde_json::from_str::<String>(trimmed_body) {
            return decoded_xml;
        }
    }

    trimmed_body.to_string()
}

/// Valor de una severidad: el hijo nombrado, leyendo su 'full' anidado
/// cuando el motor lo emite, o su texto directo.
fn severity_value(result_count_node: &Node<'_, '_>, severity_name: &str) -> u32 {
    let Some(severity_node) = result_count_node
        .children()
        .find(|child| child.has_tag_name(severity_name))
    else {
        return 0;
    };

    if let Some(nested_full) = severity_node
        .children()
        .find(|child| child.has_tag_name("full"))
    {
        return leading_integer(nested_full.text().unwrap_or_default());
    }

    leading_integer(severity_node.text().unwrap_or_default())
}

fn direct_child_integer(result_count_node: &Node<'_, '_>, child_name: &str) -> Option<u32> {
    result_count_node
        .children()
        .find(|child| child.has_tag_name(child_name))
        .map(|child| leading_integer(child.text().unwrap_or_default()))
}

/// Entero inicial del texto (el motor anexa sufijos como '12 (3 new)').
fn leading_integer(raw_text: &str) -> u32 {
    raw_text
        .trim()
        .chars()
        .take_while(|character| character.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}
