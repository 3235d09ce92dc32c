// src/lib.rs
//! Inference engine for fastText models: label prediction, word vectors,
//! nearest-neighbour search and vocabulary queries over named, shared models.

pub mod c_api;
pub mod config;
pub mod core;
pub mod error;
pub mod persistence;

pub use crate::config::EngineConfig;
pub use crate::core::engine::InferenceEngine;
pub use crate::core::model::{FastText, MAX_INTENTIONS};
pub use crate::core::registry::ModelRegistry;
pub use crate::error::{FastTextError, Result};
pub use crate::persistence::{load_model, read_model, save_model, write_model};
