pub mod models;
pub mod slots;
