// [tests/mirror/apps/orchestrator/services/vuln_report.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CONTEOS DEL MOTOR EXTERNO (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: EXTRACCIÓN DE result_count DEL REPORTE XML
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_orchestrator::services::vuln_report::extract_vulnerability_count;

    const FLAT_REPORT: &str = r#"
        <get_reports_response status="200">
          <report id="r-1">
            <result_count>
              <full>42</full>
              <high>7</high>
              <medium>15</medium>
              <low>12</low>
              <log>8</log>
            </result_count>
          </report>
        </get_reports_response>"#;

    const NESTED_REPORT: &str = r#"
        <report id="r-2">
          <result_count>
            <high><full>3</full></high>
            <medium><full>5</full></medium>
            <low><full>2</full></low>
            <log><full>11</full></log>
          </result_count>
        </report>"#;

    #[test]
    fn certify_flat_severity_extraction() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating severity count extraction...");

        let severity_count = extract_vulnerability_count(FLAT_REPORT);
        assert_eq!(severity_count.high, 7);
        assert_eq!(severity_count.medium, 15);
        assert_eq!(severity_count.low, 12);
        assert_eq!(severity_count.log, 8);
        // 'full' directo dicta el total pleno del reporte.
        assert_eq!(severity_count.total, 42);
    }

    #[test]
    fn certify_nested_full_and_summed_total() {
        let severity_count = extract_vulnerability_count(NESTED_REPORT);
        assert_eq!(severity_count.high, 3);
        assert_eq!(severity_count.medium, 5);
        assert_eq!(severity_count.low, 2);
        assert_eq!(severity_count.log, 11);
        // Sin 'full' directo: el total es la suma de severidades.
        assert_eq!(severity_count.total, 21);
    }

    /// XML transportado como cadena JSON: ambos caminos convergen.
    #[test]
    fn certify_json_encoded_xml_ingestion() {
        let json_encoded_report = serde_json::to_string(FLAT_REPORT).expect("FIXTURE_FAULT");
        let severity_count = extract_vulnerability_count(&json_encoded_report);
        assert_eq!(severity_count.total, 42);
        assert_eq!(severity_count.high, 7);
    }

    /// Cuerpos exóticos degradan a conteo cero, jamás a pánico.
    #[test]
    fn certify_exotic_bodies_degrade_to_zero() {
        for exotic_body in ["", "not xml at all", "<report><no_counts/></report>"] {
            let severity_count = extract_vulnerability_count(exotic_body);
            assert_eq!(severity_count.total, 0, "DEGRADATION_FAULT on body: {:?}", exotic_body);
        }
    }

    /// Sufijos del motor ('12 (3 new)') no contaminan el entero.
    #[test]
    fn certify_suffixed_integers_tolerated() {
        let suffixed_report = r#"
            <report>
              <result_count>
                <high>12 (3 new)</high>
                <medium>0</medium>
                <low>1</low>
                <log>0</log>
              </result_count>
            </report>"#;

        let severity_count = extract_vulnerability_count(suffixed_report);
        assert_eq!(severity_count.high, 12);
        assert_eq!(severity_count.total, 13);
    }
}
