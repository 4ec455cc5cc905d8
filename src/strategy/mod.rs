pub mod aggregator;
pub mod allocator;
pub mod blend;
