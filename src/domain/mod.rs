pub mod aggregation;
pub mod billing;
pub mod clock;
pub mod models;
pub mod period;
pub mod summary;
pub mod zaptec_payload;
