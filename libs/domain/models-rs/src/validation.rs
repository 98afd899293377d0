// [libs/domain/models-rs/src/validation.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN VALIDATION ENGINE (V4.0 - PERIMETER GUARD)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: VALIDACIÓN DE DIRECCIONES Y ESPECIFICACIONES DE PUERTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PERIMETER DISCIPLINE: Toda dirección aceptada es una IP parseable
 *    (v4/v6) o un FQDN que honra las reglas de etiquetas DNS.
 * 2. ROUND-TRIP GUARANTEE: Toda especificación de puertos aceptada
 *    re-parsea a enteros en [1,65535] y rangos con inicio <= fin.
 * 3. SEMANTIC FAULTS: Errores catalogados con 'thiserror' para su
 *    mapeo directo al código 400 del perímetro HTTP.
 * =================================================================
 */

use std::net::IpAddr;
use thiserror::Error;

/// Límites estructurales de un FQDN según las reglas de etiquetas DNS.
const FQDN_MAX_TOTAL_LENGTH: usize = 253;
const FQDN_MAX_LABEL_LENGTH: usize = 63;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// La dirección no es IP parseable ni FQDN legal.
    #[error("[L2_VALIDATION_FAULT]: ADDRESS_REJECTED -> {0}")]
    InvalidAddress(String),

    /// Puerto fuera del rango [1,65535].
    #[error("[L2_VALIDATION_FAULT]: PORT_OUT_OF_RANGE -> {0}")]
    InvalidPort(u32),

    /// Rango con inicio mayor que fin, o sintaxis de rango ilegal.
    #[error("[L2_VALIDATION_FAULT]: PORT_RANGE_REJECTED -> {0}")]
    InvalidPortRange(String),

    /// Especificación de puertos sintácticamente ilegible.
    #[error("[L2_VALIDATION_FAULT]: PORT_SPEC_REJECTED -> {0}")]
    InvalidPortSpec(String),

    /// Una lista de puertos requiere al menos un campo TCP o UDP.
    #[error("[L2_VALIDATION_FAULT]: PORT_LIST_VOID")]
    EmptyPortList,

    /// 'only_discovery' es incompatible con plugins post-descubrimiento.
    #[error("[L2_VALIDATION_FAULT]: RECIPE_CONFLICT -> only_discovery excludes plugins")]
    ConflictingRecipe,

    /// Confianza de huella fuera de [0,100].
    #[error("[L2_VALIDATION_FAULT]: CONFIDENCE_OUT_OF_RANGE -> {0}")]
    InvalidConfidence(u8),
}

/// Rango inclusivo de puertos ya validado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Forma textual canónica: puerto único o 'inicio-fin'.
    pub fn to_spec(&self) -> String {
        if self.start == self.end {
            self.start.to_string()
        } else {
            format!("{}-{}", self.start, self.end)
        }
    }
}

/// Valida que la dirección sea una IP (v4/v6) o un FQDN legal.
///
/// Reglas FQDN: longitud total <= 253, etiquetas de 1..=63 caracteres
/// alfanuméricos o guiones, sin guion inicial ni final, sin etiquetas
/// vacías.
///
/// # Errors:
/// - `ValidationError::InvalidAddress` con la dirección rechazada.
pub fn validate_target_address(candidate_address: &str) -> Result<(), ValidationError> {
    let trimmed_address = candidate_address.trim();

    if trimmed_address.is_empty() {
        return Err(ValidationError::InvalidAddress("<empty>".into()));
    }

    // Vía rápida: dirección IP parseable (v4 o v6).
    if trimmed_address.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    // Vía FQDN: escrutinio de etiquetas DNS.
    if trimmed_address.len() > FQDN_MAX_TOTAL_LENGTH {
        return Err(ValidationError::InvalidAddress(trimmed_address.into()));
    }

    let is_legal_fqdn = trimmed_address.split('.').all(|dns_label| {
        !dns_label.is_empty()
            && dns_label.len() <= FQDN_MAX_LABEL_LENGTH
            && !dns_label.starts_with('-')
            && !dns_label.ends_with('-')
            && dns_label
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || character == '-')
    });

    if is_legal_fqdn {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress(trimmed_address.into()))
    }
}

/// Parsea una especificación de puertos ('22,80,443' o '1-1024,8080')
/// en rangos validados.
///
/// # Errors:
/// - `ValidationError::InvalidPortSpec` ante sintaxis ilegible.
/// - `ValidationError::InvalidPort` ante el puerto 0 o > 65535.
/// - `ValidationError::InvalidPortRange` ante inicio > fin.
pub fn parse_port_spec(ports_specification: &str) -> Result<Vec<PortRange>, ValidationError> {
    let mut validated_port_ranges = Vec::new();

    for raw_segment in ports_specification.split(',') {
        let segment = raw_segment.trim();
        if segment.is_empty() {
            return Err(ValidationError::InvalidPortSpec(ports_specification.into()));
        }

        if let Some((range_start_text, range_end_text)) = segment.split_once('-') {
            let range_start = parse_single_port(range_start_text.trim())?;
            let range_end = parse_single_port(range_end_text.trim())?;

            if range_start > range_end {
                return Err(ValidationError::InvalidPortRange(segment.into()));
            }

            validated_port_ranges.push(PortRange { start: range_start, end: range_end });
        } else {
            let single_port = parse_single_port(segment)?;
            validated_port_ranges.push(PortRange { start: single_port, end: single_port });
        }
    }

    Ok(validated_port_ranges)
}

/// Valida la definición completa de una lista de puertos TCP/UDP.
///
/// # Errors:
/// - `ValidationError::EmptyPortList` si ambos campos están ausentes o vacíos.
pub fn validate_port_list_definition(
    tcp_ports_specification: Option<&str>,
    udp_ports_specification: Option<&str>,
) -> Result<(), ValidationError> {
    let tcp_field = tcp_ports_specification.map(str::trim).filter(|spec| !spec.is_empty());
    let udp_field = udp_ports_specification.map(str::trim).filter(|spec| !spec.is_empty());

    if tcp_field.is_none() && udp_field.is_none() {
        return Err(ValidationError::EmptyPortList);
    }

    if let Some(tcp_specification) = tcp_field {
        parse_port_spec(tcp_specification)?;
    }
    if let Some(udp_specification) = udp_field {
        parse_port_spec(udp_specification)?;
    }

    Ok(())
}

fn parse_single_port(port_text: &str) -> Result<u16, ValidationError> {
    let numeric_port: u32 = port_text
        .parse()
        .map_err(|_| ValidationError::InvalidPortSpec(port_text.into()))?;

    if numeric_port == 0 || numeric_port > u16::MAX as u32 {
        return Err(ValidationError::InvalidPort(numeric_port));
    }

    Ok(numeric_port as u16)
}
