pub mod client;
pub mod marketaux;
