//! Fallback Chain Resolver.
//!
//! Each category has a static preference list of compression methods. At
//! resolution time the list is filtered down to methods whose capability
//! requirements the environment meets, producing a `FallbackChain`. The
//! runner then walks the chain: environment failures advance to the next
//! method, data failures stop the walk.

mod capability;
mod executor;
mod runner;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use capability::{
    Capability, CapabilityProvider, CapabilitySet, HostCapabilityProvider,
    StaticCapabilityProvider,
};
pub use executor::{ChunkContext, CompressionExecutor, CompressionSettings, ExecutorRegistry};
pub use runner::execute_with_fallback;

use crate::profile::Category;

/// Identifier of a compression method (e.g. `video-hardware`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(Cow<'static, str>);

impl MethodId {
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a category's preference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub id: MethodId,
    /// Capabilities the method needs; all must be present.
    pub requires: Vec<Capability>,
}

impl MethodSpec {
    pub fn new(id: MethodId, requires: &[Capability]) -> Self {
        Self {
            id,
            requires: requires.to_vec(),
        }
    }
}

/// Preference-ordered methods per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTable {
    methods: BTreeMap<Category, Vec<MethodSpec>>,
}

impl Default for MethodTable {
    fn default() -> Self {
        use Capability::*;

        let spec = |id: &'static str, requires: &[Capability]| {
            MethodSpec::new(MethodId::from_static(id), requires)
        };

        let mut methods = BTreeMap::new();
        methods.insert(
            Category::Image,
            vec![
                spec("image-simd", &[Simd]),
                spec("image-threaded", &[Threads]),
                spec("image-baseline", &[]),
            ],
        );
        methods.insert(
            Category::Video,
            vec![
                spec("video-hardware", &[HardwareVideoCodec]),
                spec("video-threaded", &[Threads, SharedMemory]),
                spec("video-software", &[]),
            ],
        );
        methods.insert(
            Category::Audio,
            vec![spec("audio-simd", &[Simd]), spec("audio-software", &[])],
        );
        methods.insert(
            Category::Document,
            vec![spec("document-optimize", &[]), spec("document-deflate", &[])],
        );
        methods.insert(
            Category::Archive,
            vec![spec("archive-parallel", &[Threads]), spec("archive-deflate", &[])],
        );

        Self { methods }
    }
}

impl MethodTable {
    /// Replaces the preference list of one category.
    pub fn with_methods(mut self, category: Category, methods: Vec<MethodSpec>) -> Self {
        self.methods.insert(category, methods);
        self
    }

    pub fn methods(&self, category: Category) -> &[MethodSpec] {
        self.methods
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Ordered, capability-filtered list of methods to try for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackChain {
    pub category: Category,
    pub methods: Vec<MethodId>,
}

impl FallbackChain {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodId> {
        self.methods.iter()
    }
}

impl fmt::Display for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.methods.iter().map(MethodId::as_str).collect();
        write!(f, "{}", ids.join(" -> "))
    }
}

/// Resolves fallback chains from the method table.
#[derive(Debug, Clone, Default)]
pub struct FallbackResolver {
    table: MethodTable,
}

impl FallbackResolver {
    pub fn new(table: MethodTable) -> Self {
        Self { table }
    }

    /// Filters the category's preference list down to methods whose
    /// requirements are satisfied, keeping preference order and dropping
    /// duplicate ids.
    pub fn resolve(&self, category: Category, capabilities: &CapabilitySet) -> FallbackChain {
        let mut methods: Vec<MethodId> = Vec::new();
        for spec in self.table.methods(category) {
            if capabilities.satisfies(&spec.requires) && !methods.contains(&spec.id) {
                methods.push(spec.id.clone());
            }
        }
        FallbackChain { category, methods }
    }
}
