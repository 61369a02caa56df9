//! HTTP adapter for the request channel
//!
//! The front-end process reaches the engine through `POST /invoke/:channel`.
//! Every call is handed to the middleware pipeline; nothing here touches the
//! registry directly.

pub mod health;
pub mod invoke;

pub use health::health_routes;
pub use invoke::invoke_routes;
