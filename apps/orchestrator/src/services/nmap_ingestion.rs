// [apps/orchestrator/src/services/nmap_ingestion.rs]
/*!
 * =================================================================
 * APARATO: NMAP RESULTS INGESTION (V4.1 - DERIVATION SIDE EFFECT)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DERIVAR open_ports/os_guess AL RECIBIR EL ARTEFACTO
 * =================================================================
 */

use crate::services::OrchestrationError;
use crate::state::AppState;
use serde_json::Value;
use tracing::{info, instrument};
use vapter_domain_models::nmap::{derive_open_ports, derive_os_guess, NmapRunResults};

/**
 * Efecto colateral del PATCH que fija 'parsed_nmap_results': derivación
 * de puertos abiertos y veredicto de OS hacia el detalle del escaneo.
 *
 * # Errors:
 * - `OrchestrationError::Artifact` si el artefacto no honra la forma
 *   estructurada del descubrimiento (mapea a 400 en el perímetro).
 */
#[instrument(skip(app_state, discovery_artifact))]
pub async fn ingest_discovery_artifact(
    app_state: &AppState,
    scan_identifier: &str,
    discovery_artifact: &Value,
) -> Result<(), OrchestrationError> {
    let discovery_results: NmapRunResults = serde_json::from_value(discovery_artifact.clone())
        .map_err(|schema_fault| OrchestrationError::Artifact(schema_fault.to_string()))?;

    let open_ports_map = derive_open_ports(&discovery_results);
    let os_guess_verdict = derive_os_guess(&discovery_results);

    let open_ports_value = serde_json::to_value(&open_ports_map)
        .map_err(|serialization_fault| OrchestrationError::Artifact(serialization_fault.to_string()))?;
    let os_guess_value = match &os_guess_verdict {
        Some(os_guess) => Some(
            serde_json::to_value(os_guess)
                .map_err(|serialization_fault| OrchestrationError::Artifact(serialization_fault.to_string()))?,
        ),
        None => None,
    };

    app_state
        .scan_detail_repository
        .set_derived_artifacts(scan_identifier, &open_ports_value, os_guess_value.as_ref())
        .await?;

    info!(
        "🧩 [NMAP_INGESTION]: Scan [{}] derived {} tcp / {} udp open ports.",
        scan_identifier,
        open_ports_map.tcp.len(),
        open_ports_map.udp.len()
    );
    Ok(())
}
