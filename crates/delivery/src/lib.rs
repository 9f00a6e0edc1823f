//! Prizebox Delivery - the outbound channel that actually grants a reward
//! to a user (points, items) once a claim is approved

pub mod channel;
pub mod http;

pub use channel::{DeliveryChannel, LocalDelivery};
pub use http::HttpDeliveryClient;
