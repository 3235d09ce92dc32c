pub mod dictionary;
pub mod engine;
pub mod matrix;
pub mod model;
pub mod output;
pub mod registry;
pub mod types;
