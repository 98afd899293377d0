// [apps/stage-worker/src/stages/vuln_engine.rs]
/*!
 * =================================================================
 * APARATO: VULN ENGINE EXECUTOR (V4.4 - GMP SESSION DRIVER)
 * CLASIFICACIÓN: STAGE EXECUTOR (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: SESIÓN COMPLETA CONTRA EL MOTOR EXTERNO (SOCKET GMP)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SESSION LIFECYCLE: autenticar -> crear objetivo -> crear tarea ->
 *    arrancar -> sondear progreso -> recuperar reporte -> cargar.
 * 2. DUAL PROGRESS: Cada sondeo reporta progreso por HTTP (PATCH
 *    vuln-engine-progress) y por la cola de estados ('running' con
 *    porcentaje).
 * 3. TIME BUDGET: Superado 'max_scan_time' la tarea se detiene y la
 *    etapa se sella como fallo permanente.
 * =================================================================
 */

use crate::config::WorkerSettings;
use crate::stages::{StageContext, StageExecutor, StageFailure};
use async_trait::async_trait;
use chrono::Utc;
use roxmltree::Document;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};
use vapter_domain_models::{ReportFormat, StageModule, StagePhase};
use vapter_infra_gateway_client::{VulnEngineProgressPayload, VulnEngineResultsPayload};

pub struct VulnEngineExecutor;

#[async_trait]
impl StageExecutor for VulnEngineExecutor {
    fn module(&self) -> StageModule {
        StageModule::VulnEngine
    }

    fn hard_timeout(&self, settings: &WorkerSettings) -> Duration {
        // Margen sobre el presupuesto del motor para drenaje del reporte.
        settings.vuln_engine.max_scan_time + Duration::from_secs(600)
    }

    #[instrument(skip(self, context), fields(target = %context.request.target_host))]
    async fn execute(&self, context: StageContext<'_>) -> Result<(), StageFailure> {
        let engine_settings = &context.settings.vuln_engine;
        let scan_identifier = &context.request.scan_id;

        // 1. SESIÓN GMP: autenticación sobre el socket del motor.
        let mut engine_session = GmpSession::connect(&engine_settings.socket_path)
            .await
            .map_err(StageFailure::Transient)?;

        engine_session
            .authenticate(&engine_settings.username, &engine_settings.password)
            .await
            .map_err(StageFailure::Permanent)?;

        // 2. PROVISIÓN: objetivo y tarea en el motor.
        let engine_target_id = engine_session
            .create_target(scan_identifier, &context.request.target_host, &engine_settings.port_list_id)
            .await
            .map_err(StageFailure::Permanent)?;

        let engine_task_id = engine_session
            .create_task(
                scan_identifier,
                &engine_settings.scan_config_id,
                &engine_target_id,
                &engine_settings.scanner_id,
            )
            .await
            .map_err(StageFailure::Permanent)?;

        let started_at = Utc::now();
        let engine_report_id = engine_session
            .start_task(&engine_task_id)
            .await
            .map_err(StageFailure::Permanent)?;

        info!(
            "🧪 [VULN_ENGINE]: Task [{}] ignited for scan [{}] (report [{}]).",
            engine_task_id, scan_identifier, engine_report_id
        );

        // 3. SONDEO CON DOBLE REPORTE DE PROGRESO
        let polling_deadline = Instant::now() + engine_settings.max_scan_time;

        loop {
            sleep(engine_settings.polling_interval).await;

            let (task_status, task_progress) = engine_session
                .get_task_progress(&engine_task_id)
                .await
                .map_err(StageFailure::Permanent)?;

            let progress_payload = VulnEngineProgressPayload {
                external_task_id: Some(engine_task_id.clone()),
                external_status: task_status.clone(),
                progress: task_progress,
            };
            if let Err(uplink_fault) = context
                .gateway
                .patch_vuln_engine_progress(scan_identifier, &progress_payload)
                .await
            {
                warn!("⚠️ [VULN_ENGINE]: Progress PATCH failed ({}); continuing poll.", uplink_fault);
            }
            let _ = context.status_emitter.emit_progress(scan_identifier, task_progress).await;

            match task_status.as_str() {
                "Done" => break,
                "Stopped" | "Interrupted" => {
                    return Err(StageFailure::Permanent(format!(
                        "engine task entered state '{}'",
                        task_status
                    )));
                }
                _ => {}
            }

            if Instant::now() >= polling_deadline {
                let _ = engine_session.stop_task(&engine_task_id).await;
                return Err(StageFailure::Permanent(format!(
                    "engine scan exceeded time budget ({}s)",
                    engine_settings.max_scan_time.as_secs()
                )));
            }
        }

        // 4. RECUPERACIÓN Y CARGA DEL REPORTE MASIVO
        let _ = context.status_emitter.emit_phase(scan_identifier, StagePhase::Parsing).await;

        let full_report = engine_session
            .get_report(&engine_report_id)
            .await
            .map_err(StageFailure::Permanent)?;

        let report_format = if engine_settings.report_format.eq_ignore_ascii_case("JSON") {
            ReportFormat::Json
        } else {
            ReportFormat::Xml
        };

        let results_payload = VulnEngineResultsPayload {
            external_task_id: Some(engine_task_id),
            external_report_id: Some(engine_report_id),
            external_target_id: Some(engine_target_id),
            report_format,
            full_report,
            started_at: Some(started_at),
            completed_at: Some(Utc::now()),
        };

        context
            .gateway
            .post_vuln_engine_results(scan_identifier, &results_payload)
            .await?;

        info!("📤 [VULN_ENGINE]: Report sealed for scan [{}].", scan_identifier);
        Ok(())
    }
}

/// Sesión mínima del protocolo GMP sobre el socket unix del motor.
struct GmpSession {
    engine_stream: UnixStream,
}

impl GmpSession {
    async fn connect(socket_path: &std::path::Path) -> Result<Self, String> {
        let engine_stream = UnixStream::connect(socket_path)
            .await
            .map_err(|connect_fault| format!("engine socket unreachable: {}", connect_fault))?;
        Ok(Self { engine_stream })
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), String> {
        let response = self
            .transact(
                "authenticate",
                &format!(
                    "<authenticate><credentials><username>{}</username><password>{}</password></credentials></authenticate>",
                    xml_escape(username),
                    xml_escape(password)
                ),
            )
            .await?;

        expect_ok_status(&response, "authenticate")
    }

    async fn create_target(
        &mut self,
        scan_identifier: &str,
        target_host: &str,
        port_list_id: &str,
    ) -> Result<String, String> {
        let response = self
            .transact(
                "create_target",
                &format!(
                    "<create_target><name>vapter-{}</name><hosts>{}</hosts><port_list id=\"{}\"/></create_target>",
                    xml_escape(scan_identifier),
                    xml_escape(target_host),
                    xml_escape(port_list_id)
                ),
            )
            .await?;

        extract_created_id(&response, "create_target")
    }

    async fn create_task(
        &mut self,
        scan_identifier: &str,
        scan_config_id: &str,
        engine_target_id: &str,
        scanner_id: &str,
    ) -> Result<String, String> {
        let response = self
            .transact(
                "create_task",
                &format!(
                    "<create_task><name>vapter-{}</name><config id=\"{}\"/><target id=\"{}\"/><scanner id=\"{}\"/></create_task>",
                    xml_escape(scan_identifier),
                    xml_escape(scan_config_id),
                    xml_escape(engine_target_id),
                    xml_escape(scanner_id)
                ),
            )
            .await?;

        extract_created_id(&response, "create_task")
    }

    /// Arranca la tarea; el motor retorna el id del reporte en curso.
    async fn start_task(&mut self, engine_task_id: &str) -> Result<String, String> {
        let response = self
            .transact(
                "start_task",
                &format!("<start_task task_id=\"{}\"/>", xml_escape(engine_task_id)),
            )
            .await?;

        expect_ok_status(&response, "start_task")?;

        let parsed_response = Document::parse(&response).map_err(|e| e.to_string())?;
        parsed_response
            .descendants()
            .find(|node| node.has_tag_name("report_id"))
            .and_then(|node| node.text())
            .map(str::to_string)
            .ok_or_else(|| "start_task response carried no report_id".into())
    }

    /// Estado y progreso [0,100] de la tarea en curso.
    async fn get_task_progress(&mut self, engine_task_id: &str) -> Result<(String, u8), String> {
        let response = self
            .transact(
                "get_tasks",
                &format!("<get_tasks task_id=\"{}\"/>", xml_escape(engine_task_id)),
            )
            .await?;

        let parsed_response = Document::parse(&response).map_err(|e| e.to_string())?;
        let task_node = parsed_response
            .descendants()
            .find(|node| node.has_tag_name("task"))
            .ok_or_else(|| "get_tasks response carried no task".to_string())?;

        let task_status = task_node
            .children()
            .find(|node| node.has_tag_name("status"))
            .and_then(|node| node.text())
            .unwrap_or("Unknown")
            .to_string();

        let task_progress = task_node
            .children()
            .find(|node| node.has_tag_name("progress"))
            .and_then(|node| node.text())
            .and_then(|text| text.trim().parse::<i16>().ok())
            .map(|raw_progress| raw_progress.clamp(0, 100) as u8)
            .unwrap_or(0);

        Ok((task_status, task_progress))
    }

    async fn stop_task(&mut self, engine_task_id: &str) -> Result<(), String> {
        let response = self
            .transact(
                "stop_task",
                &format!("<stop_task task_id=\"{}\"/>", xml_escape(engine_task_id)),
            )
            .await?;
        expect_ok_status(&response, "stop_task")
    }

    async fn get_report(&mut self, engine_report_id: &str) -> Result<String, String> {
        self.transact(
            "get_reports",
            &format!(
                "<get_reports report_id=\"{}\" details=\"1\" ignore_pagination=\"1\"/>",
                xml_escape(engine_report_id)
            ),
        )
        .await
    }

    /// Envía un comando GMP y drena hasta el cierre de su respuesta.
    async fn transact(&mut self, command_name: &str, command_xml: &str) -> Result<String, String> {
        self.engine_stream
            .write_all(command_xml.as_bytes())
            .await
            .map_err(|write_fault| format!("engine write fault: {}", write_fault))?;

        let closing_tag = format!("</{}_response>", command_name);
        let self_closing_prefix = format!("<{}_response ", command_name);

        let mut response_buffer = Vec::new();
        let mut read_chunk = [0u8; 8192];

        loop {
            let bytes_read = self
                .engine_stream
                .read(&mut read_chunk)
                .await
                .map_err(|read_fault| format!("engine read fault: {}", read_fault))?;

            if bytes_read == 0 {
                return Err("engine closed the session mid-response".into());
            }

            response_buffer.extend_from_slice(&read_chunk[..bytes_read]);
            let buffered_text = String::from_utf8_lossy(&response_buffer);

            if buffered_text.contains(&closing_tag) {
                break;
            }
            // Respuesta auto-cerrada sin cuerpo (<x_response status="200"/>).
            if buffered_text.contains(&self_closing_prefix) && buffered_text.trim_end().ends_with("/>") {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&response_buffer).into_owned())
    }
}

fn expect_ok_status(response_xml: &str, command_name: &str) -> Result<(), String> {
    let parsed_response = Document::parse(response_xml).map_err(|e| e.to_string())?;
    let status_attribute = parsed_response
        .root_element()
        .attribute("status")
        .unwrap_or("0");

    if status_attribute.starts_with('2') {
        Ok(())
    } else {
        let status_text = parsed_response
            .root_element()
            .attribute("status_text")
            .unwrap_or("unspecified");
        Err(format!("{} rejected by engine: {} ({})", command_name, status_attribute, status_text))
    }
}

fn extract_created_id(response_xml: &str, command_name: &str) -> Result<String, String> {
    expect_ok_status(response_xml, command_name)?;

    let parsed_response = Document::parse(response_xml).map_err(|e| e.to_string())?;
    parsed_response
        .root_element()
        .attribute("id")
        .map(str::to_string)
        .ok_or_else(|| format!("{} response carried no id", command_name))
}

fn xml_escape(raw_text: &str) -> String {
    raw_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
