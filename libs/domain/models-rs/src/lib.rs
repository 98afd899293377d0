// [libs/domain/models-rs/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS REGISTRY (V4.0 - CONTROL PLANE MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE CONTRATOS SOBERANOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SOURCE OF TRUTH: Toda entidad persistida, todo mensaje de
 *    la arteria AMQP y toda regla de validación viven en este estrato.
 * 2. CLOSED VARIANTS: Los contratos de mensajería usan enums cerrados;
 *    un tag desconocido es rechazado en el parseo, nunca tolerado.
 * 3. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

pub mod inventory;
pub mod scan;
pub mod pipeline;
pub mod validation;
pub mod nmap;

pub use inventory::{Customer, PortList, ScanType, Target};
pub use pipeline::{StageModule, StagePhase, StageRequest, StatusEvent, StatusSignal};
pub use scan::{
    FingerprintDetail, Protocol, ReportFormat, Scan, ScanDetail, ScanStatus,
    VulnEngineResult, VulnerabilityCount,
};
