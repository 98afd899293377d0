// [tests/mirror/libs/domain/models_rs/nmap_derivation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE DERIVACIÓN DE DESCUBRIMIENTO (V4.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL CONTRATO open_ports / os_guess
 *
 * # Mathematical Proof (Open Port Projection):
 * open_ports = filter(state == "open") ordenado ascendentemente por
 * puerto y particionado por protocolo; os_guess proviene del primer
 * host, tolerando objeto único o lista de osmatch.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vapter_domain_models::nmap::{derive_open_ports, derive_os_guess, NmapRunResults};

    fn discovery_fixture() -> NmapRunResults {
        serde_json::from_value(json!({
            "hosts": [{
                "status": "up",
                "addresses": [{"addr": "192.0.2.10", "addrtype": "ipv4"}],
                "hostnames": [],
                "ports": [
                    {"portid": "443", "protocol": "tcp", "state": "open",
                     "service": {"name": "https", "product": "nginx", "version": "1.24.0"}},
                    {"portid": "22", "protocol": "tcp", "state": "open",
                     "service": {"name": "ssh", "product": "OpenSSH", "version": "9.6", "extrainfo": "Ubuntu"}},
                    {"portid": "25", "protocol": "tcp", "state": "filtered",
                     "service": {"name": "smtp"}},
                    {"portid": 161, "protocol": "udp", "state": "open",
                     "service": {"name": "snmp"}}
                ],
                "os": [
                    {"name": "Linux 5.15", "accuracy": "96"},
                    {"name": "Linux 4.x", "accuracy": "90"}
                ]
            }]
        }))
        .expect("FIXTURE_FAULT: discovery artifact rejected")
    }

    #[test]
    fn certify_open_port_projection() {
        println!("\n🧪 [PROVING_GROUNDS]: Validating open port projection strata...");

        let open_ports_map = derive_open_ports(&discovery_fixture());

        // Solo 'open', ascendente, particionado por protocolo.
        let tcp_ports: Vec<u16> = open_ports_map.tcp.iter().map(|entry| entry.port).collect();
        assert_eq!(tcp_ports, vec![22, 443], "PROJECTION_FAULT: tcp ordering or filter drift");

        let udp_ports: Vec<u16> = open_ports_map.udp.iter().map(|entry| entry.port).collect();
        assert_eq!(udp_ports, vec![161]);

        // El puerto filtrado (25/filtered) jamás se proyecta.
        assert!(open_ports_map.tcp.iter().all(|entry| entry.port != 25));

        let ssh_entry = &open_ports_map.tcp[0];
        assert_eq!(ssh_entry.service.as_deref(), Some("ssh"));
        assert_eq!(ssh_entry.product.as_deref(), Some("OpenSSH"));
        assert_eq!(ssh_entry.version.as_deref(), Some("9.6"));
        assert_eq!(ssh_entry.extrainfo.as_deref(), Some("Ubuntu"));
    }

    #[test]
    fn certify_os_guess_from_first_host() {
        let os_verdict = derive_os_guess(&discovery_fixture()).expect("OS_FAULT: verdict absent");
        assert_eq!(os_verdict.name, "Linux 5.15");
        assert_eq!(os_verdict.accuracy.as_deref(), Some("96"));
    }

    #[test]
    fn certify_os_guess_tolerates_single_object() {
        let single_object_fixture: NmapRunResults = serde_json::from_value(json!({
            "hosts": [{
                "ports": [],
                "os": {"name": "OpenBSD 7.4", "accuracy": "88", "osfamily": "OpenBSD"}
            }]
        }))
        .expect("FIXTURE_FAULT");

        let os_verdict = derive_os_guess(&single_object_fixture).expect("OS_FAULT");
        assert_eq!(os_verdict.name, "OpenBSD 7.4");
        assert_eq!(os_verdict.osfamily.as_deref(), Some("OpenBSD"));
    }

    #[test]
    fn certify_empty_discovery_degrades_gracefully() {
        let empty_results = NmapRunResults::default();
        let open_ports_map = derive_open_ports(&empty_results);
        assert!(open_ports_map.tcp.is_empty() && open_ports_map.udp.is_empty());
        assert!(derive_os_guess(&empty_results).is_none());
    }
}
