//! Fixtures
//!
//! Cart items described in YAML, loaded from `<base>/carts/<name>.yml`.

use std::{fs, path::PathBuf};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::{decimals::PricingConfig, items::CartItem};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Two fixture files define the same item key
    #[error("Duplicate item: {0}")]
    DuplicateItem(String),
}

/// On-disk layout of a cart fixture file.
#[derive(Debug, Deserialize)]
struct CartsFixture {
    #[serde(default)]
    config: Option<PricingConfig>,

    #[serde(default)]
    items: FxHashMap<String, CartItem>,
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Rounding policy from the last file that set one
    config: PricingConfig,

    /// Items by fixture key
    items: FxHashMap<String, CartItem>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            config: PricingConfig::default(),
            items: FxHashMap::default(),
        }
    }

    /// Load a fixture set from the default base path
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_items(name)?;

        Ok(fixture)
    }

    /// Load cart items from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an item key was already
    /// loaded.
    pub fn load_items(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("carts").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: CartsFixture = serde_norway::from_str(&contents)?;

        if let Some(config) = fixture.config {
            self.config = config;
        }

        for (key, item) in fixture.items {
            if self.items.contains_key(&key) {
                return Err(FixtureError::DuplicateItem(key));
            }

            self.items.insert(key, item);
        }

        Ok(self)
    }

    /// Get an item by its fixture key
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::ItemNotFound`] if no loaded file defines the key.
    pub fn item(&self, key: &str) -> Result<&CartItem, FixtureError> {
        self.items
            .get(key)
            .ok_or_else(|| FixtureError::ItemNotFound(key.to_string()))
    }

    /// Take an owned copy of an item, ready to be mutated
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::ItemNotFound`] if no loaded file defines the key.
    pub fn cart_item(&self, key: &str) -> Result<CartItem, FixtureError> {
        self.item(key).cloned()
    }

    /// Loaded item keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.items.keys().map(String::as_str).collect();

        keys.sort_unstable();

        keys
    }

    /// Rounding policy the fixtures were written for
    pub fn config(&self) -> PricingConfig {
        self.config
    }
}
