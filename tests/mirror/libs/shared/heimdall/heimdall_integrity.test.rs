// [tests/mirror/libs/shared/heimdall/heimdall_integrity.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE OBSERVABILIDAD (V4.0 - HEIMDALL CORE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE IGNICIÓN ÚNICA DEL SUSCRIPTOR GLOBAL
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use vapter_shared_heimdall::init_tracing;

    /**
     * CERTIFICACIÓN: La ignición del estrato de observabilidad no
     * colapsa y los macros de rastro quedan operativos de inmediato.
     */
    #[test]
    fn certify_tracing_ignition() {
        println!("\n👁️  [PROVING_GROUNDS]: Igniting Heimdall observability strata...");

        init_tracing("vapter_proving_grounds");

        // Emisión inmediata post-ignición: no debe entrar en pánico.
        tracing::info!("🧪 [TEST]: Observability strata operational.");
        tracing::warn!("🧪 [TEST]: Warning channel operational.");
    }
}
