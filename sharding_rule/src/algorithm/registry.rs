use std::fmt;

use hashbrown::HashMap;

use super::{
    ComplexInlineShardingAlgorithm, HashModShardingAlgorithm, HintInlineShardingAlgorithm,
    InlineShardingAlgorithm, KeyGeneratorFactory, ModShardingAlgorithm, Props,
    RangeShardingAlgorithm, Result, ShardingAlgorithm, SnowflakeKeyGenerateAlgorithm,
    UuidKeyGenerateAlgorithm,
};

/// Builds an algorithm from its configured properties.
pub type AlgorithmFactory = fn(&Props) -> Result<ShardingAlgorithm>;

/// Sharding algorithm and key generator factories keyed by case-insensitive
/// type name.
///
/// [`Default`] registers the built-in types; callers can add their own with
/// [`AlgorithmRegistry::register`] and
/// [`AlgorithmRegistry::register_key_generator`] before loading rules.
pub struct AlgorithmRegistry {
    factories: HashMap<String, AlgorithmFactory>,
    key_generators: HashMap<String, KeyGeneratorFactory>,
}

impl AlgorithmRegistry {
    /// A registry without any algorithm type.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            key_generators: HashMap::new(),
        }
    }

    /// Registers `factory` under `type_name`, replacing any previous one.
    pub fn register(&mut self, type_name: &str, factory: AlgorithmFactory) -> &mut Self {
        self.factories.insert(type_name.to_ascii_uppercase(), factory);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<AlgorithmFactory> {
        self.factories.get(&type_name.to_ascii_uppercase()).copied()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        sorted_names(&self.factories)
    }

    pub fn register_key_generator(
        &mut self,
        type_name: &str,
        factory: KeyGeneratorFactory,
    ) -> &mut Self {
        self.key_generators
            .insert(type_name.to_ascii_uppercase(), factory);
        self
    }

    pub fn get_key_generator(&self, type_name: &str) -> Option<KeyGeneratorFactory> {
        self.key_generators
            .get(&type_name.to_ascii_uppercase())
            .copied()
    }

    pub fn key_generator_type_names(&self) -> Vec<&str> {
        sorted_names(&self.key_generators)
    }
}

fn sorted_names<V>(factories: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<_> = factories.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(ModShardingAlgorithm::TYPE, ModShardingAlgorithm::create)
            .register(HashModShardingAlgorithm::TYPE, HashModShardingAlgorithm::create)
            .register(InlineShardingAlgorithm::TYPE, InlineShardingAlgorithm::create)
            .register(
                RangeShardingAlgorithm::BOUNDARY_TYPE,
                RangeShardingAlgorithm::create_boundary,
            )
            .register(
                RangeShardingAlgorithm::VOLUME_TYPE,
                RangeShardingAlgorithm::create_volume,
            )
            .register(
                ComplexInlineShardingAlgorithm::TYPE,
                ComplexInlineShardingAlgorithm::create,
            )
            .register(
                HintInlineShardingAlgorithm::TYPE,
                HintInlineShardingAlgorithm::create,
            )
            .register_key_generator(
                SnowflakeKeyGenerateAlgorithm::TYPE,
                SnowflakeKeyGenerateAlgorithm::create,
            )
            .register_key_generator(
                UuidKeyGenerateAlgorithm::TYPE,
                UuidKeyGenerateAlgorithm::create,
            );
        registry
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("types", &self.type_names())
            .field("key_generator_types", &self.key_generator_type_names())
            .finish()
    }
}
