// [tests/mirror/libs/domain/models_rs/port_spec.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ESPECIFICACIONES DE PUERTOS (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL ROUND-TRIP DE LISTAS DE PUERTOS
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_domain_models::validation::{
        parse_port_spec, validate_port_list_definition, ValidationError,
    };

    #[test]
    fn certify_port_spec_roundtrip() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating port specification parity...");

        let parsed_ranges = parse_port_spec("22,80,443,1000-2000").expect("PARSE_FAULT");
        assert_eq!(parsed_ranges.len(), 4);

        // Round-trip: todo rango re-serializa a su forma canónica.
        let canonical_specification: Vec<String> =
            parsed_ranges.iter().map(|range| range.to_spec()).collect();
        assert_eq!(canonical_specification, vec!["22", "80", "443", "1000-2000"]);

        // Todo entero reside en [1,65535] con inicio <= fin.
        for range in &parsed_ranges {
            assert!(range.start >= 1);
            assert!(range.end <= 65535);
            assert!(range.start <= range.end);
        }
    }

    #[test]
    fn certify_illegal_specs_rejected() {
        assert!(matches!(parse_port_spec("0"), Err(ValidationError::InvalidPort(0))));
        assert!(matches!(parse_port_spec("65536"), Err(ValidationError::InvalidPort(65536))));
        assert!(matches!(
            parse_port_spec("2000-1000"),
            Err(ValidationError::InvalidPortRange(_))
        ));
        assert!(parse_port_spec("22,,80").is_err());
        assert!(parse_port_spec("http").is_err());
        assert!(parse_port_spec("1-2-3").is_err());
    }

    #[test]
    fn certify_port_list_requires_one_side() {
        assert!(matches!(
            validate_port_list_definition(None, None),
            Err(ValidationError::EmptyPortList)
        ));
        assert!(matches!(
            validate_port_list_definition(Some("  "), Some("")),
            Err(ValidationError::EmptyPortList)
        ));
        assert!(validate_port_list_definition(Some("22,80"), None).is_ok());
        assert!(validate_port_list_definition(None, Some("53,161")).is_ok());
    }

    #[test]
    fn certify_boundary_ports_admitted() {
        let boundary_ranges = parse_port_spec("1,65535,1-65535").expect("PARSE_FAULT");
        assert_eq!(boundary_ranges[0].start, 1);
        assert_eq!(boundary_ranges[1].end, 65535);
        assert_eq!((boundary_ranges[2].start, boundary_ranges[2].end), (1, 65535));
    }
}
