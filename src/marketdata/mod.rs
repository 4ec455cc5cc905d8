pub mod bse;
pub mod client;
