//! Ordered catalog of parametric surfaces and the policies that walk it.
//!
//! The catalog is a dispatch table from [`FunctionName`] to a plain function
//! pointer, built once. Catalog position defines both the cyclic order used by
//! [`TransitionMode::Cycle`] and the row/column of a function in the GPU kernel
//! table, so every consumer asks the catalog for indices instead of relying on
//! enum discriminants.

mod surfaces;

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

pub use surfaces::{multi_wave, ripple, sphere, torus, wave, Function};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown function '{0}'; expected one of wave, multi_wave, ripple, sphere, torus")]
    UnknownFunction(String),
    #[error("unknown transition mode '{0}'; expected cycle or random")]
    UnknownMode(String),
    #[error("catalog must contain at least one function")]
    Empty,
    #[error("function '{0}' appears more than once in the catalog")]
    Duplicate(FunctionName),
}

/// Identifier of a catalog surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FunctionName {
    #[default]
    Wave,
    MultiWave,
    Ripple,
    Sphere,
    Torus,
}

impl FunctionName {
    pub const COUNT: usize = 5;

    /// Every surface in canonical catalog order.
    pub const ALL: [FunctionName; Self::COUNT] = [
        FunctionName::Wave,
        FunctionName::MultiWave,
        FunctionName::Ripple,
        FunctionName::Sphere,
        FunctionName::Torus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FunctionName::Wave => "wave",
            FunctionName::MultiWave => "multi_wave",
            FunctionName::Ripple => "ripple",
            FunctionName::Sphere => "sphere",
            FunctionName::Torus => "torus",
        }
    }

    pub fn function(self) -> Function {
        match self {
            FunctionName::Wave => surfaces::wave,
            FunctionName::MultiWave => surfaces::multi_wave,
            FunctionName::Ripple => surfaces::ripple,
            FunctionName::Sphere => surfaces::sphere,
            FunctionName::Torus => surfaces::torus,
        }
    }

    /// WGSL definition of this surface; the function is named [`Self::as_str`].
    pub fn wgsl(self) -> &'static str {
        match self {
            FunctionName::Wave => surfaces::WAVE_WGSL,
            FunctionName::MultiWave => surfaces::MULTI_WAVE_WGSL,
            FunctionName::Ripple => surfaces::RIPPLE_WGSL,
            FunctionName::Sphere => surfaces::SPHERE_WGSL,
            FunctionName::Torus => surfaces::TORUS_WGSL,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionName {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "wave" => Ok(FunctionName::Wave),
            "multi_wave" | "multiwave" => Ok(FunctionName::MultiWave),
            "ripple" => Ok(FunctionName::Ripple),
            "sphere" => Ok(FunctionName::Sphere),
            "torus" => Ok(FunctionName::Torus),
            _ => Err(CatalogError::UnknownFunction(value.trim().to_string())),
        }
    }
}

/// How the next function is chosen when a steady phase ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    #[default]
    Cycle,
    Random,
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionMode::Cycle => f.write_str("cycle"),
            TransitionMode::Random => f.write_str("random"),
        }
    }
}

impl FromStr for TransitionMode {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cycle" | "next" => Ok(TransitionMode::Cycle),
            "random" | "shuffle" => Ok(TransitionMode::Random),
            _ => Err(CatalogError::UnknownMode(value.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    name: FunctionName,
    function: Function,
}

/// Fixed, ordered set of surfaces available to the animation.
#[derive(Debug, Clone)]
pub struct FunctionCatalog {
    entries: Vec<CatalogEntry>,
    positions: [Option<usize>; FunctionName::COUNT],
}

impl FunctionCatalog {
    /// Catalog holding every surface in canonical order.
    pub fn new() -> Self {
        Self::build(&FunctionName::ALL)
    }

    /// Catalog restricted to `names`, in the order given.
    pub fn with_functions(names: &[FunctionName]) -> Result<Self, CatalogError> {
        if names.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = [false; FunctionName::COUNT];
        for name in names {
            if std::mem::replace(&mut seen[name.slot()], true) {
                return Err(CatalogError::Duplicate(*name));
            }
        }
        Ok(Self::build(names))
    }

    fn build(names: &[FunctionName]) -> Self {
        let mut positions = [None; FunctionName::COUNT];
        let entries = names
            .iter()
            .enumerate()
            .map(|(index, &name)| {
                positions[name.slot()] = Some(index);
                CatalogEntry {
                    name,
                    function: name.function(),
                }
            })
            .collect();
        Self { entries, positions }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = FunctionName> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    pub fn contains(&self, name: FunctionName) -> bool {
        self.positions[name.slot()].is_some()
    }

    pub fn index_of(&self, name: FunctionName) -> Option<usize> {
        self.positions[name.slot()]
    }

    pub fn name_at(&self, index: usize) -> Option<FunctionName> {
        self.entries.get(index).map(|entry| entry.name)
    }

    /// Looks up the function for `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not part of this catalog.
    pub fn function(&self, name: FunctionName) -> Function {
        self.entries[self.position(name)].function
    }

    /// Successor of `current` in catalog order, wrapping to the first entry.
    pub fn next_after(&self, current: FunctionName) -> FunctionName {
        let next = (self.position(current) + 1) % self.entries.len();
        self.entries[next].name
    }

    /// Uniformly picks any entry except `current`.
    ///
    /// # Panics
    ///
    /// Panics if the catalog holds fewer than two functions.
    pub fn random_other_than<R: Rng + ?Sized>(
        &self,
        current: FunctionName,
        rng: &mut R,
    ) -> FunctionName {
        let len = self.entries.len();
        assert!(
            len > 1,
            "random selection needs at least two functions, catalog has {len}"
        );
        let offset = rng.gen_range(1..len);
        self.entries[(self.position(current) + offset) % len].name
    }

    pub fn select_next<R: Rng + ?Sized>(
        &self,
        current: FunctionName,
        mode: TransitionMode,
        rng: &mut R,
    ) -> FunctionName {
        match mode {
            TransitionMode::Cycle => self.next_after(current),
            TransitionMode::Random => self.random_other_than(current, rng),
        }
    }

    fn position(&self, name: FunctionName) -> usize {
        self.positions[name.slot()]
            .unwrap_or_else(|| panic!("function '{name}' is not part of this catalog"))
    }
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

type PickFn = fn(&FunctionCatalog, FunctionName, &mut dyn RngCore) -> FunctionName;

fn pick_cycle(
    catalog: &FunctionCatalog,
    current: FunctionName,
    _: &mut dyn RngCore,
) -> FunctionName {
    catalog.next_after(current)
}

fn pick_random(
    catalog: &FunctionCatalog,
    current: FunctionName,
    rng: &mut dyn RngCore,
) -> FunctionName {
    catalog.random_other_than(current, rng)
}

/// Selection policy resolved once from a [`TransitionMode`].
#[derive(Clone, Copy)]
pub struct Selector {
    mode: TransitionMode,
    pick: PickFn,
}

impl Selector {
    pub fn for_mode(mode: TransitionMode) -> Self {
        let pick: PickFn = match mode {
            TransitionMode::Cycle => pick_cycle,
            TransitionMode::Random => pick_random,
        };
        Self { mode, pick }
    }

    pub fn mode(&self) -> TransitionMode {
        self.mode
    }

    pub fn pick(
        &self,
        catalog: &FunctionCatalog,
        current: FunctionName,
        rng: &mut dyn RngCore,
    ) -> FunctionName {
        (self.pick)(catalog, current, rng)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("mode", &self.mode).finish()
    }
}

/// Linear blend between two surfaces sampled at the same `(u, v, t)`.
///
/// `progress` is expected to be eased already; 0 yields `from`, 1 yields `to`.
pub fn morph(u: f32, v: f32, t: f32, from: Function, to: Function, progress: f32) -> Vec3 {
    from(u, v, t).lerp(to(u, v, t), progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn cycle_visits_every_entry_once() {
        let catalog = FunctionCatalog::new();
        let start = FunctionName::Ripple;
        let mut current = start;
        let mut visited = Vec::new();
        for _ in 0..catalog.len() {
            current = catalog.next_after(current);
            visited.push(current);
        }
        assert_eq!(current, start);
        visited.sort();
        assert_eq!(visited, FunctionName::ALL.to_vec());
    }

    #[test]
    fn cycle_wraps_past_last_entry() {
        let catalog = FunctionCatalog::new();
        assert_eq!(catalog.next_after(FunctionName::Torus), FunctionName::Wave);
    }

    #[test]
    fn random_never_repeats_and_is_roughly_uniform() {
        let catalog = FunctionCatalog::new();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let current = FunctionName::Sphere;
        let mut counts = [0usize; FunctionName::COUNT];
        let trials = 10_000;
        for _ in 0..trials {
            let picked = catalog.random_other_than(current, &mut rng);
            assert_ne!(picked, current);
            counts[catalog.index_of(picked).unwrap()] += 1;
        }
        let expected = trials as f64 / (catalog.len() - 1) as f64;
        for name in catalog.names().filter(|name| *name != current) {
            let observed = counts[catalog.index_of(name).unwrap()] as f64;
            assert!(
                (observed - expected).abs() < expected * 0.1,
                "{name} drawn {observed} times, expected about {expected}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "at least two functions")]
    fn random_on_single_entry_catalog_panics() {
        let catalog = FunctionCatalog::with_functions(&[FunctionName::Wave]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        catalog.random_other_than(FunctionName::Wave, &mut rng);
    }

    #[test]
    fn subset_catalog_uses_its_own_order() {
        let catalog =
            FunctionCatalog::with_functions(&[FunctionName::Torus, FunctionName::Wave]).unwrap();
        assert_eq!(catalog.index_of(FunctionName::Torus), Some(0));
        assert_eq!(catalog.next_after(FunctionName::Wave), FunctionName::Torus);
        assert!(!catalog.contains(FunctionName::Ripple));
    }

    #[test]
    fn subset_rejects_duplicates_and_empty() {
        assert_eq!(
            FunctionCatalog::with_functions(&[FunctionName::Wave, FunctionName::Wave]).unwrap_err(),
            CatalogError::Duplicate(FunctionName::Wave)
        );
        assert_eq!(
            FunctionCatalog::with_functions(&[]).unwrap_err(),
            CatalogError::Empty
        );
    }

    #[test]
    fn selector_holds_policy_as_data() {
        let catalog = FunctionCatalog::new();
        let mut rng = StdRng::seed_from_u64(9);
        let cycle = Selector::for_mode(TransitionMode::Cycle);
        assert_eq!(
            cycle.pick(&catalog, FunctionName::Wave, &mut rng),
            FunctionName::MultiWave
        );
        let random = Selector::for_mode(TransitionMode::Random);
        assert_eq!(random.mode(), TransitionMode::Random);
        for _ in 0..100 {
            assert_ne!(
                random.pick(&catalog, FunctionName::Wave, &mut rng),
                FunctionName::Wave
            );
        }
    }

    #[test]
    fn morph_matches_endpoints() {
        let samples = [(-0.9, -0.9, 0.0), (0.1, 0.5, 1.7), (0.9, -0.3, 12.5)];
        for from in FunctionName::ALL {
            for to in FunctionName::ALL {
                for (u, v, t) in samples {
                    let (f, g) = (from.function(), to.function());
                    assert_eq!(morph(u, v, t, f, g, 0.0), f(u, v, t));
                    let end = morph(u, v, t, f, g, 1.0);
                    assert!(end.abs_diff_eq(g(u, v, t), 1e-6), "{from}->{to} at 1.0");
                }
            }
        }
    }

    #[test]
    fn names_round_trip_through_strings() {
        for name in FunctionName::ALL {
            assert_eq!(name.as_str().parse::<FunctionName>().unwrap(), name);
        }
        assert_eq!(
            "Multi-Wave".parse::<FunctionName>().unwrap(),
            FunctionName::MultiWave
        );
        assert!("saddle".parse::<FunctionName>().is_err());
        assert_eq!(
            "shuffle".parse::<TransitionMode>().unwrap(),
            TransitionMode::Random
        );
    }

    #[test]
    fn wgsl_snippets_define_named_functions() {
        for name in FunctionName::ALL {
            assert!(name.wgsl().starts_with(&format!("fn {}(", name.as_str())));
        }
    }
}
