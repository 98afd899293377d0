// [tests/mirror/libs/domain/models_rs/address_validation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE DIRECCIONES DE OBJETIVO (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE REGLAS IP/FQDN DEL PERÍMETRO
 *
 * # Mathematical Proof (Address Admission):
 * Toda dirección admitida es IP parseable (v4/v6) o un FQDN cuyas
 * etiquetas satisfacen 1..=63 caracteres alfanuméricos/guiones sin
 * guion inicial ni final, con longitud total <= 253.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_domain_models::validation::validate_target_address;

    #[test]
    fn certify_ip_addresses_admitted() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating IP admission strata...");

        for legal_address in ["192.0.2.10", "10.0.0.1", "255.255.255.255", "::1", "2001:db8::42"] {
            assert!(
                validate_target_address(legal_address).is_ok(),
                "ADMISSION_FAULT: legal IP rejected: {}",
                legal_address
            );
        }
    }

    #[test]
    fn certify_fqdn_label_rules() {
        for legal_fqdn in ["example.com", "scanner-01.corp.example.com", "a.io", "x1.y2.z3"] {
            assert!(
                validate_target_address(legal_fqdn).is_ok(),
                "ADMISSION_FAULT: legal FQDN rejected: {}",
                legal_fqdn
            );
        }

        // Etiqueta con guion inicial/final, etiquetas vacías y vacío total.
        for illegal_address in ["-leading.example.com", "trailing-.example.com", "double..dot", "", "under_score.example.com"] {
            assert!(
                validate_target_address(illegal_address).is_err(),
                "PERIMETER_BREACH: illegal address admitted: '{}'",
                illegal_address
            );
        }
    }

    #[test]
    fn certify_length_boundaries() {
        // Etiqueta de exactamente 63 caracteres: legal.
        let label_63 = "a".repeat(63);
        assert!(validate_target_address(&format!("{}.com", label_63)).is_ok());

        // Etiqueta de 64: ilegal.
        let label_64 = "a".repeat(64);
        assert!(validate_target_address(&format!("{}.com", label_64)).is_err());

        // Longitud total > 253: ilegal.
        let oversized_fqdn = format!("{}.{}.{}.{}.example", label_63, label_63, label_63, label_63);
        assert!(validate_target_address(&oversized_fqdn).is_err());
    }
}
