pub mod portfolio_store;
pub mod transaction_log;
