pub mod attempt_handler;
pub mod health_handler;

pub use attempt_handler::configure as configure_attempt_routes;
pub use health_handler::health_check;
