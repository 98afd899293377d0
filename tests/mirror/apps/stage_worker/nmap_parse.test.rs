// [tests/mirror/apps/stage_worker/nmap_parse.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PARSEO DE DESCUBRIMIENTO (V4.2)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: XML '-oX -' -> FORMA ESTRUCTURADA + BANDERAS DE RECETA
 * =================================================================
 */

use chrono::Utc;
use vapter_domain_models::ScanType;
use vapter_stage_worker::stages::nmap::{build_nmap_arguments, parse_nmap_xml};

const DISCOVERY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -sV -O -oX - 192.0.2.10" version="7.94">
  <scaninfo type="syn" protocol="tcp" numservices="1000" services="1-1000"/>
  <host>
    <status state="up" reason="echo-reply"/>
    <address addr="192.0.2.10" addrtype="ipv4"/>
    <hostnames><hostname name="alpha.example.com" type="PTR"/></hostnames>
    <ports>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack"/>
        <service name="ssh" product="OpenSSH" version="9.6" method="probed" conf="10"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack"/>
        <service name="http" product="nginx" extrainfo="Ubuntu" method="probed" conf="10"/>
      </port>
      <port protocol="tcp" portid="25">
        <state state="filtered" reason="no-response"/>
      </port>
    </ports>
    <os>
      <osmatch name="Linux 5.15 - 6.2" accuracy="95"/>
      <osmatch name="Linux 4.15" accuracy="90"/>
    </os>
  </host>
  <runstats>
    <finished time="1760000000" timestr="now" elapsed="12.34" exit="success"/>
    <hosts up="1" down="0" total="1"/>
  </runstats>
</nmaprun>"#;

fn recipe_fixture(only_discovery: bool, consider_alive: bool, be_quiet: bool) -> ScanType {
    ScanType {
        id: "st-1".into(),
        name: "fixture".into(),
        only_discovery,
        consider_alive,
        be_quiet,
        port_list_id: None,
        plugin_fingerprint: false,
        plugin_vuln_engine: false,
        plugin_web: false,
        plugin_vuln_lookup: false,
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_xml_projection_to_contract_shape() {
        println!("\n🔍 [PROVING_GROUNDS]: Validating discovery XML projection...");

        let discovery_artifact = parse_nmap_xml(DISCOVERY_XML).expect("PARSE_FAULT");

        let hosts = discovery_artifact["hosts"].as_array().expect("SHAPE_FAULT: hosts");
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0]["status"], "up");
        assert_eq!(hosts[0]["addresses"][0]["addr"], "192.0.2.10");
        assert_eq!(hosts[0]["hostnames"][0]["name"], "alpha.example.com");

        let ports = hosts[0]["ports"].as_array().expect("SHAPE_FAULT: ports");
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0]["portid"], "22");
        assert_eq!(ports[0]["state"], "open");
        assert_eq!(ports[0]["service"]["product"], "OpenSSH");
        assert_eq!(ports[2]["state"], "filtered");

        assert_eq!(hosts[0]["os"][0]["name"], "Linux 5.15 - 6.2");
        assert_eq!(hosts[0]["os"][0]["accuracy"], "95");

        assert_eq!(discovery_artifact["scan_info"]["tcp"]["type"], "syn");
        assert_eq!(discovery_artifact["statistics"]["hosts"]["up"], "1");
    }

    #[test]
    fn certify_garbage_xml_rejected() {
        assert!(parse_nmap_xml("this is not xml").is_err());
        assert!(parse_nmap_xml("").is_err());
    }

    /**
     * CERTIFICACIÓN: Las banderas de la receta gobiernan la línea de
     * comando: -sn / -Pn / -T2 / -p y el cierre '-oX -' constante.
     */
    #[test]
    fn certify_recipe_flags_drive_arguments() {
        // Descubrimiento puro: -sn sin enumeración ni detección.
        let discovery_arguments =
            build_nmap_arguments(Some(&recipe_fixture(true, false, false)), None, "192.0.2.10");
        assert!(discovery_arguments.contains(&"-sn".to_string()));
        assert!(!discovery_arguments.contains(&"-sV".to_string()));
        assert!(!discovery_arguments.contains(&"-O".to_string()));

        // Receta sigilosa asumiendo host vivo, con lista de puertos.
        let quiet_arguments = build_nmap_arguments(
            Some(&recipe_fixture(false, true, true)),
            Some("T:22,80,443,U:53"),
            "alpha.example.com",
        );
        assert!(quiet_arguments.contains(&"-Pn".to_string()));
        assert!(quiet_arguments.contains(&"-T2".to_string()));
        assert!(quiet_arguments.contains(&"-sS".to_string()));
        assert!(quiet_arguments.contains(&"-sU".to_string()));
        assert!(quiet_arguments.contains(&"-sV".to_string()));

        let port_flag_position = quiet_arguments.iter().position(|arg| arg == "-p").expect("FLAG_FAULT");
        assert_eq!(quiet_arguments[port_flag_position + 1], "T:22,80,443,U:53");

        // Cierre constante del contrato: '-oX -' y el objetivo al final.
        for arguments in [&discovery_arguments, &quiet_arguments] {
            let xml_flag_position = arguments.iter().position(|arg| arg == "-oX").expect("FLAG_FAULT");
            assert_eq!(arguments[xml_flag_position + 1], "-");
            assert!(arguments.last().unwrap() == "192.0.2.10" || arguments.last().unwrap() == "alpha.example.com");
        }
    }
}
