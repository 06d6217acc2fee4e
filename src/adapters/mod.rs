pub mod csv_export;
pub mod email;
pub mod token;
pub mod zaptec_client;
pub mod zaptec_http;
