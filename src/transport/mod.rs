//! Concrete adapters behind the core's transport seams.

pub mod http;
pub mod mqtt;

pub use http::ReqwestHttpTransport;
pub use mqtt::RumqttcMqttLink;
