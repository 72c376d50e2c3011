use catalog::{FunctionCatalog, FunctionName, Selector, TransitionMode};
use graphconfig::{ConfigError, GraphConfig};
use rand::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("{name} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { name: &'static str, value: f32 },
    #[error("initial function '{0}' is not part of the catalog")]
    UnknownFunction(FunctionName),
    #[error("random transitions need at least two functions, catalog has {0}")]
    RandomNeedsChoice(usize),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Phase lengths in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionTimings {
    pub function_duration: f32,
    pub transition_duration: f32,
}

impl TransitionTimings {
    pub fn new(function_duration: f32, transition_duration: f32) -> Result<Self, SchedulerError> {
        check_duration("function_duration", function_duration)?;
        check_duration("transition_duration", transition_duration)?;
        Ok(Self {
            function_duration,
            transition_duration,
        })
    }

    pub fn from_config(config: &GraphConfig) -> Result<Self, SchedulerError> {
        Self::new(config.function_seconds(), config.transition_seconds())
    }

    /// Upper bound (exclusive) of `elapsed` once a frame has been normalised.
    pub fn longest(&self) -> f32 {
        self.function_duration.max(self.transition_duration)
    }

    fn is_instant(&self) -> bool {
        self.function_duration == 0.0 && self.transition_duration == 0.0
    }
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            function_duration: 1.0,
            transition_duration: 1.0,
        }
    }
}

fn check_duration(name: &'static str, value: f32) -> Result<(), SchedulerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SchedulerError::InvalidDuration { name, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Steady,
    /// Morphing from `from` towards the state's current function.
    Transitioning { from: FunctionName },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    Began { from: FunctionName, to: FunctionName },
    Finished { function: FunctionName },
}

/// Full cycles one [`TransitionState::advance`] call replays before dropping
/// the rest.
pub const MAX_REPLAYED_CYCLES: f32 = 4.0;

/// Boundary crossings one `advance` call resolves at most.
const MAX_CROSSINGS: usize = 2 * MAX_REPLAYED_CYCLES as usize + 2;

/// Timing state of the animation, advanced by a pure step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub elapsed: f32,
    pub phase: Phase,
    pub current: FunctionName,
}

impl TransitionState {
    pub fn steady(current: FunctionName) -> Self {
        Self {
            elapsed: 0.0,
            phase: Phase::Steady,
            current,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    pub fn from(&self) -> Option<FunctionName> {
        match self.phase {
            Phase::Steady => None,
            Phase::Transitioning { from } => Some(from),
        }
    }

    /// `(from, to)` pair to evaluate; both halves equal `current` while steady.
    pub fn active_pair(&self) -> (FunctionName, FunctionName) {
        (self.from().unwrap_or(self.current), self.current)
    }

    /// Eased morph progress, defined only while transitioning.
    pub fn blend_progress(&self, timings: &TransitionTimings) -> Option<f32> {
        match self.phase {
            Phase::Steady => None,
            Phase::Transitioning { .. } if timings.transition_duration <= 0.0 => Some(1.0),
            Phase::Transitioning { .. } => Some(smoothstep(
                0.0,
                1.0,
                self.elapsed / timings.transition_duration,
            )),
        }
    }

    /// Adds `delta` seconds and crosses every phase boundary it covers.
    ///
    /// Crossing a boundary subtracts the phase length from `elapsed`, so any
    /// overshoot carries into the next phase. `pick` chooses the function a
    /// new transition morphs towards.
    ///
    /// A step spanning more than [`MAX_REPLAYED_CYCLES`] full
    /// steady-plus-transition cycles keeps only the remainder of the last
    /// cycle; the skipped cycles pick nothing and report nothing. The work
    /// done per call is therefore bounded regardless of `delta`.
    pub fn advance<F>(
        mut self,
        timings: &TransitionTimings,
        delta: f32,
        mut pick: F,
    ) -> (Self, Vec<PhaseChange>)
    where
        F: FnMut(FunctionName) -> FunctionName,
    {
        let mut changes = Vec::new();
        self.elapsed += delta.max(0.0);

        let cycle = timings.function_duration + timings.transition_duration;
        if cycle > 0.0 && self.elapsed >= cycle * MAX_REPLAYED_CYCLES {
            self.elapsed %= cycle;
        }

        for _ in 0..MAX_CROSSINGS {
            match self.phase {
                Phase::Steady if self.elapsed >= timings.function_duration => {
                    self.elapsed -= timings.function_duration;
                    changes.push(self.begin_transition(&mut pick));
                }
                Phase::Transitioning { .. } if self.elapsed >= timings.transition_duration => {
                    self.elapsed -= timings.transition_duration;
                    self.phase = Phase::Steady;
                    changes.push(PhaseChange::Finished {
                        function: self.current,
                    });
                }
                _ => break,
            }

            // Zero-length phases on both sides would otherwise never settle.
            if timings.is_instant() {
                self.elapsed = 0.0;
                break;
            }
        }

        (self, changes)
    }

    /// Starts a transition away from the current function right now.
    ///
    /// An in-flight transition is finished first so its target becomes the
    /// new source. Time already spent in the current phase is dropped: the
    /// new transition starts at `elapsed == 0` instead of carrying overshoot.
    pub fn skip<F>(mut self, mut pick: F) -> (Self, Vec<PhaseChange>)
    where
        F: FnMut(FunctionName) -> FunctionName,
    {
        let mut changes = Vec::with_capacity(2);
        if self.is_transitioning() {
            changes.push(PhaseChange::Finished {
                function: self.current,
            });
        }
        self.elapsed = 0.0;
        changes.push(self.begin_transition(&mut pick));
        (self, changes)
    }

    fn begin_transition<F>(&mut self, pick: &mut F) -> PhaseChange
    where
        F: FnMut(FunctionName) -> FunctionName,
    {
        let from = self.current;
        self.current = pick(from);
        self.phase = Phase::Transitioning { from };
        PhaseChange::Began {
            from,
            to: self.current,
        }
    }
}

/// Cubic Hermite ease between `edge0` and `edge1`, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Drives a [`TransitionState`] from frame deltas using a catalog and a
/// configured selection policy.
pub struct TransitionScheduler {
    catalog: FunctionCatalog,
    selector: Selector,
    timings: TransitionTimings,
    state: TransitionState,
    rng: StdRng,
}

impl TransitionScheduler {
    pub fn new(
        catalog: FunctionCatalog,
        mode: TransitionMode,
        timings: TransitionTimings,
        initial: FunctionName,
        seed: u64,
    ) -> Result<Self, SchedulerError> {
        if !catalog.contains(initial) {
            return Err(SchedulerError::UnknownFunction(initial));
        }
        if mode == TransitionMode::Random && catalog.len() < 2 {
            return Err(SchedulerError::RandomNeedsChoice(catalog.len()));
        }
        Ok(Self {
            catalog,
            selector: Selector::for_mode(mode),
            timings,
            state: TransitionState::steady(initial),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Builds a scheduler from validated configuration. A seed in the
    /// configuration takes precedence over `seed`.
    pub fn from_config(config: &GraphConfig, seed: u64) -> Result<Self, SchedulerError> {
        Self::new(
            config.catalog()?,
            config.transition_mode,
            TransitionTimings::from_config(config)?,
            config.function,
            config.seed.unwrap_or(seed),
        )
    }

    pub fn advance(&mut self, delta: f32) -> Vec<PhaseChange> {
        let Self {
            catalog,
            selector,
            timings,
            state,
            rng,
        } = self;
        let (next, changes) = state.advance(timings, delta, |current| {
            selector.pick(catalog, current, &mut *rng)
        });
        *state = next;
        changes
    }

    pub fn skip(&mut self) -> Vec<PhaseChange> {
        let Self {
            catalog,
            selector,
            state,
            rng,
            ..
        } = self;
        let (next, changes) = state.skip(|current| selector.pick(catalog, current, &mut *rng));
        *state = next;
        changes
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn timings(&self) -> &TransitionTimings {
        &self.timings
    }

    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    pub fn mode(&self) -> TransitionMode {
        self.selector.mode()
    }

    pub fn current(&self) -> FunctionName {
        self.state.current
    }

    pub fn blend_progress(&self) -> Option<f32> {
        self.state.blend_progress(&self.timings)
    }

    pub fn active_pair(&self) -> (FunctionName, FunctionName) {
        self.state.active_pair()
    }
}
