//! Optional WebAssembly format features known to the validator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An optional, independently toggleable binary-format feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    MutableGlobals,
    SaturatingFloatToInt,
    SignExtension,
    MultiValue,
    Exceptions,
    ReferenceTypes,
    BulkMemory,
    Simd,
    Threads,
    TailCall,
    Annotations,
    Gc,
    Memory64,
}

/// Features the validator enables when given no flags
pub const DEFAULT_ENABLED: &[Feature] = &[
    Feature::MutableGlobals,
    Feature::SaturatingFloatToInt,
    Feature::SignExtension,
    Feature::MultiValue,
];

/// Features the validator disables when given no flags
pub const DEFAULT_DISABLED: &[Feature] = &[
    Feature::Exceptions,
    Feature::ReferenceTypes,
    Feature::BulkMemory,
    Feature::Simd,
    Feature::Threads,
    Feature::TailCall,
    Feature::Annotations,
    Feature::Gc,
    Feature::Memory64,
];

impl Feature {
    /// Name as used in validator flags (`--enable-<name>`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::MutableGlobals => "mutable-globals",
            Feature::SaturatingFloatToInt => "saturating-float-to-int",
            Feature::SignExtension => "sign-extension",
            Feature::MultiValue => "multi-value",
            Feature::Exceptions => "exceptions",
            Feature::ReferenceTypes => "reference-types",
            Feature::BulkMemory => "bulk-memory",
            Feature::Simd => "simd",
            Feature::Threads => "threads",
            Feature::TailCall => "tail-call",
            Feature::Annotations => "annotations",
            Feature::Gc => "gc",
            Feature::Memory64 => "memory64",
        }
    }

    /// Whether the validator enables this feature without flags
    pub fn enabled_by_default(&self) -> bool {
        DEFAULT_ENABLED.contains(self)
    }

    /// Features that must be force-disabled alongside this one when probing it,
    /// because enabling them makes the validator silently enable this one.
    pub fn implied_by(&self) -> &'static [Feature] {
        match self {
            Feature::ReferenceTypes => &[Feature::Exceptions],
            Feature::BulkMemory => &[Feature::Exceptions, Feature::ReferenceTypes],
            _ => &[],
        }
    }

    /// All features, default-enabled group first
    pub fn all() -> impl Iterator<Item = Feature> {
        DEFAULT_ENABLED
            .iter()
            .chain(DEFAULT_DISABLED.iter())
            .copied()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Feature::all()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown feature: {}", s))
    }
}

/// Set of features a validator run enables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureConfig {
    /// Every feature the validator knows, including ones outside the catalog
    All,

    /// Exactly these catalog features
    Enabled(BTreeSet<Feature>),
}

impl FeatureConfig {
    /// The validator's configuration when given no flags
    pub fn defaults() -> Self {
        Self::enabled(DEFAULT_ENABLED.iter().copied())
    }

    /// Every catalog feature disabled
    pub fn reduced() -> Self {
        Self::Enabled(BTreeSet::new())
    }

    pub fn enabled(features: impl IntoIterator<Item = Feature>) -> Self {
        Self::Enabled(features.into_iter().collect())
    }

    /// Every catalog feature except `candidate` and the features implying it
    pub fn without(candidate: Feature) -> Self {
        let excluded = candidate.implied_by();
        Self::enabled(Feature::all().filter(|f| *f != candidate && !excluded.contains(f)))
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match self {
            FeatureConfig::All => true,
            FeatureConfig::Enabled(set) => set.contains(&feature),
        }
    }
}
