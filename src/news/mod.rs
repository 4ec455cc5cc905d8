pub mod client;
pub mod feed;
