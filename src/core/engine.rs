use crate::config::EngineConfig;
use crate::core::model::FastText;
use crate::core::registry::ModelRegistry;
use crate::error::{FastTextError, Result};
use crate::persistence::load_model;
use std::path::Path;
use std::sync::{Arc, OnceLock};

static GLOBAL_ENGINE: OnceLock<InferenceEngine> = OnceLock::new();

/// Named-model query API. Every call resolves the model by name, then runs
/// against that snapshot without holding any lock.
#[derive(Default)]
pub struct InferenceEngine {
    registry: ModelRegistry,
}

impl InferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide engine shared by the C ABI and anything else that wants
    /// the classic "load by name, query by name" model.
    pub fn global() -> &'static Self {
        GLOBAL_ENGINE.get_or_init(Self::new)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let engine = Self::new();
        engine.apply_config(config)?;
        Ok(engine)
    }

    /// Loads every model listed in `config`. Stops at the first failure;
    /// models loaded before it stay registered.
    pub fn apply_config(&self, config: &EngineConfig) -> Result<usize> {
        for entry in &config.models {
            self.load_model(&entry.name, &entry.path)?;
        }
        Ok(config.models.len())
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Loads `path` and registers it under `name`, replacing any previous
    /// model only once the new one is complete. On error the registry is
    /// left untouched.
    pub fn load_model(&self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        let model = load_model(path)?;
        self.registry.register(name, model);
        tracing::info!(model = name, "model registered");
        Ok(())
    }

    pub fn register_model(&self, name: &str, model: FastText) -> Option<Arc<FastText>> {
        self.registry.register(name, model)
    }

    pub fn unload_model(&self, name: &str) -> bool {
        let removed = self.registry.unregister(name).is_some();
        if removed {
            tracing::info!(model = name, "model unloaded");
        }
        removed
    }

    pub fn model_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn model(&self, name: &str) -> Result<Arc<FastText>> {
        self.registry.lookup(name)
    }

    pub fn predict(&self, name: &str, text: &str, top_n: usize) -> Result<Vec<(String, f32)>> {
        self.predict_with_threshold(name, text, top_n, 0.0)
    }

    pub fn predict_with_threshold(
        &self,
        name: &str,
        text: &str,
        top_n: usize,
        threshold: f32,
    ) -> Result<Vec<(String, f32)>> {
        if top_n == 0 {
            return Err(FastTextError::invalid_argument("top_n must be at least 1"));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FastTextError::invalid_argument(format!(
                "threshold {threshold} is outside [0, 1]"
            )));
        }
        self.model(name)?.predict(text, top_n, threshold)
    }

    pub fn predict_max_intention(&self, name: &str, text: &str) -> Result<(Vec<String>, Vec<f32>)> {
        self.model(name)?.predict_max_intention(text)
    }

    pub fn get_word_vector(&self, name: &str, word: &str) -> Result<Vec<f32>> {
        Ok(self.model(name)?.word_vector(word))
    }

    pub fn get_word_vector_f64(&self, name: &str, word: &str) -> Result<Vec<f64>> {
        Ok(self.get_word_vector(name, word)?.into_iter().map(f64::from).collect())
    }

    pub fn get_sentence_vector(&self, name: &str, text: &str) -> Result<Vec<f32>> {
        Ok(self.model(name)?.sentence_vector(text))
    }

    pub fn get_most_similar(&self, name: &str, query: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        Ok(self.model(name)?.most_similar(query, top_k))
    }

    pub fn get_dimension(&self, name: &str) -> Result<usize> {
        Ok(self.model(name)?.dimension())
    }

    pub fn get_word_n(&self, name: &str) -> Result<usize> {
        Ok(self.model(name)?.word_count())
    }

    pub fn get_words(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.model(name)?.words())
    }

    pub fn get_labels(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.model(name)?.labels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dictionary::Dictionary;
    use crate::core::matrix::DenseMatrix;
    use crate::core::types::{Args, LossName, ModelName};

    fn engine_with_classifier() -> InferenceEngine {
        let args = Args { dim: 2, loss: LossName::Softmax, ..Args::default() };
        let dict = Dictionary::from_counts(&args, &[("hi", 1), ("bye", 1)], &[("__label__greet", 2), ("__label__leave", 1)]).unwrap();
        let input = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let output = DenseMatrix::from_rows(&[vec![1.0, -1.0], vec![-1.0, 1.0]]).unwrap();
        let engine = InferenceEngine::new();
        engine.register_model("intent", FastText::new(args, 12, dict, input, output).unwrap());
        engine
    }

    #[test]
    fn unknown_model_is_reported_by_every_query() {
        let engine = InferenceEngine::new();
        assert!(matches!(engine.predict("x", "hi", 1), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.predict_max_intention("x", "hi"), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.get_word_vector("x", "hi"), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.get_most_similar("x", "hi", 1), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.get_dimension("x"), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.get_word_n("x"), Err(FastTextError::ModelNotFound(_))));
        assert!(matches!(engine.get_words("x"), Err(FastTextError::ModelNotFound(_))));
    }

    #[test]
    fn missing_model_and_unsupported_query_are_distinct() {
        let engine = InferenceEngine::new();
        let args = Args { dim: 2, model: ModelName::Cbow, loss: LossName::NegativeSampling, ..Args::default() };
        let dict = Dictionary::from_counts(&args, &[("a", 1)], &[]).unwrap();
        let model = FastText::new(args, 12, dict, DenseMatrix::zeros(1, 2), DenseMatrix::zeros(1, 2)).unwrap();
        engine.register_model("vectors", model);
        assert!(matches!(engine.predict("vectors", "a", 1), Err(FastTextError::Inference(_))));
        assert!(matches!(engine.predict("other", "a", 1), Err(FastTextError::ModelNotFound(_))));
    }

    #[test]
    fn predict_validates_arguments() {
        let engine = engine_with_classifier();
        assert!(matches!(engine.predict("intent", "hi", 0), Err(FastTextError::InvalidArgument(_))));
        assert!(matches!(
            engine.predict_with_threshold("intent", "hi", 1, 1.5),
            Err(FastTextError::InvalidArgument(_))
        ));
        let top = engine.predict("intent", "hi", 5).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "__label__greet");
    }

    #[test]
    fn accessors_reflect_the_model() {
        let engine = engine_with_classifier();
        assert_eq!(engine.get_dimension("intent").unwrap(), 2);
        assert_eq!(engine.get_word_n("intent").unwrap(), 2);
        assert_eq!(engine.get_words("intent").unwrap(), vec!["hi", "bye"]);
        assert_eq!(engine.get_labels("intent").unwrap(), vec!["__label__greet", "__label__leave"]);
        assert_eq!(engine.get_word_vector_f64("intent", "bye").unwrap(), vec![0.0, 1.0]);
        assert_eq!(engine.model_names(), vec!["intent"]);
        assert!(engine.unload_model("intent"));
        assert!(!engine.unload_model("intent"));
    }
}
