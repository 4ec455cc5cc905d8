pub mod catalog;
pub mod scrips;

pub use catalog::Universe;
