pub mod aggregation;
pub mod clock;
pub mod debug_page;
pub mod models;
