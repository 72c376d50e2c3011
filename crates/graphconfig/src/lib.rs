use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use catalog::{FunctionCatalog, FunctionName, TransitionMode};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Grid resolutions the per-point CPU path can sustain.
pub const CPU_RESOLUTION_RANGE: RangeInclusive<u32> = 10..=200;
/// Grid resolutions accepted by the compute path.
pub const GPU_RESOLUTION_RANGE: RangeInclusive<u32> = 10..=2000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which execution path evaluates the surface each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Cpu,
    #[default]
    Gpu,
}

impl Backend {
    pub fn resolution_range(self) -> RangeInclusive<u32> {
        match self {
            Backend::Cpu => CPU_RESOLUTION_RANGE,
            Backend::Gpu => GPU_RESOLUTION_RANGE,
        }
    }

    /// Clamps `resolution` into the range this backend accepts.
    pub fn clamp_resolution(self, resolution: u32) -> u32 {
        let range = self.resolution_range();
        resolution.clamp(*range.start(), *range.end())
    }
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "gpu" | "compute" => Ok(Backend::Gpu),
            other => Err(ConfigError::Invalid(format!(
                "unknown backend '{other}'; expected cpu or gpu"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => f.write_str("cpu"),
            Backend::Gpu => f.write_str("gpu"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    #[serde(default)]
    pub function: FunctionName,
    /// Catalog subset in cycle order; empty selects every surface.
    #[serde(default)]
    pub functions: Vec<FunctionName>,
    #[serde(default)]
    pub transition_mode: TransitionMode,
    #[serde(
        default = "default_phase_duration",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_seconds"
    )]
    pub function_duration: Duration,
    #[serde(
        default = "default_phase_duration",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_seconds"
    )]
    pub transition_duration: Duration,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub window: WindowSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backend: Backend::default(),
            resolution: default_resolution(),
            function: FunctionName::default(),
            functions: Vec::new(),
            transition_mode: TransitionMode::default(),
            function_duration: default_phase_duration(),
            transition_duration: default_phase_duration(),
            seed: None,
            window: WindowSettings::default(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_resolution() -> u32 {
    50
}

fn default_phase_duration() -> Duration {
    Duration::from_secs(1)
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_title() -> String {
    "morphgraph".to_string()
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            seconds_to_duration(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_seconds<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

fn seconds_to_duration(v: f64) -> Result<Duration, String> {
    if v.is_nan() || v.is_sign_negative() {
        return Err("duration must be non-negative".into());
    }
    Duration::try_from_secs_f64(v).map_err(|err| format!("invalid duration {v}: {err}"))
}

/// Parses `1.5`, `"750ms"` or `"2s"` style durations.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds);
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}

impl GraphConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GraphConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Builds the catalog described by `functions`, or the full catalog when empty.
    pub fn catalog(&self) -> Result<FunctionCatalog, ConfigError> {
        if self.functions.is_empty() {
            return Ok(FunctionCatalog::new());
        }
        FunctionCatalog::with_functions(&self.functions)
            .map_err(|err| ConfigError::Invalid(format!("functions: {err}")))
    }

    pub fn function_seconds(&self) -> f32 {
        self.function_duration.as_secs_f32()
    }

    pub fn transition_seconds(&self) -> f32 {
        self.transition_duration.as_secs_f32()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let range = self.backend.resolution_range();
        if !range.contains(&self.resolution) {
            return Err(ConfigError::Invalid(format!(
                "resolution {} is outside the {} backend range {}..={}",
                self.resolution,
                self.backend,
                range.start(),
                range.end()
            )));
        }

        let catalog = self.catalog()?;
        if !catalog.contains(self.function) {
            return Err(ConfigError::Invalid(format!(
                "function '{}' is not listed in functions",
                self.function
            )));
        }

        if self.transition_mode == TransitionMode::Random && catalog.len() < 2 {
            return Err(ConfigError::Invalid(
                "random transition mode needs at least two functions".into(),
            ));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window dimensions must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
