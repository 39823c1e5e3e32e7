mod client_id;
mod error_handler;

pub use client_id::{ClientId, client_id_from};
pub use error_handler::log_errors;
