// [libs/infra/broker/src/lib.rs]
/*!
 * =================================================================
 * APARATO: BROKER ADAPTER ROOT (V4.0 - ARTERIA DE MENSAJERÍA)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPORTACIÓN NOMINAL DE ENLACE, COLAS Y DISCIPLINAS
 * =================================================================
 */

pub mod connection;
pub mod consumer;
pub mod errors;
pub mod fakes;
pub mod publisher;
pub mod queues;

pub use connection::BrokerLink;
pub use consumer::{AckDisposition, DeliveryHandler, QueueConsumer};
pub use errors::BrokerError;
pub use publisher::{LapinQueuePublisher, QueuePublisher};
pub use queues::QueueTopology;
