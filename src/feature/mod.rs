//! Feature factories: the customization point for GA parameters
//!
//! A run names its feature factory with `--feature PKG.CLASS`. Names are
//! resolved once at startup against an explicit [`FeatureRegistry`]; the
//! resulting [`ParameterProvider`] is handed to the scheduler roles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Name of the built-in feature factory
pub const DEFAULT_FEATURE: &str = "run.FeatureFactory";

/// GA parameters published by a feature factory.
///
/// Carried to the worker services as opaque data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureParameters {
    pub n_pop: u32,
    pub n_gen: u32,
    pub term_limit: f64,
    pub hist_granularity: u32,
    pub selection_rate: f64,
    pub mutation_rate: f64,
}

impl Default for FeatureParameters {
    fn default() -> Self {
        Self {
            n_pop: 23,
            n_gen: 10,
            term_limit: 5.0e-03,
            hist_granularity: 3,
            selection_rate: 0.2,
            mutation_rate: 0.02,
        }
    }
}

/// Capability supplied by a feature factory
pub trait ParameterProvider: Send + Sync {
    /// Registry name of this provider
    fn name(&self) -> &str;

    fn parameters(&self) -> FeatureParameters;
}

impl fmt::Debug for dyn ParameterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// The stock feature factory
#[derive(Debug, Clone, Default)]
pub struct DefaultFeatureFactory {
    parameters: FeatureParameters,
}

impl DefaultFeatureFactory {
    pub fn new(parameters: FeatureParameters) -> Self {
        Self { parameters }
    }
}

impl ParameterProvider for DefaultFeatureFactory {
    fn name(&self) -> &str {
        DEFAULT_FEATURE
    }

    fn parameters(&self) -> FeatureParameters {
        self.parameters.clone()
    }
}

/// Explicit name -> provider table
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    providers: BTreeMap<String, Arc<dyn ParameterProvider>>,
}

impl FeatureRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in factory under its own name and `default`
    pub fn builtin() -> Self {
        let stock: Arc<dyn ParameterProvider> = Arc::new(DefaultFeatureFactory::default());
        let mut registry = Self::new();
        registry.register(DEFAULT_FEATURE, stock.clone());
        registry.register("default", stock);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn ParameterProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ParameterProvider>, ConfigError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFeature(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
