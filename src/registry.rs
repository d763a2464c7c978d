//! Filter specifications keyed by filter name.
//!
//! The registry is a plain value: build it once (built-ins plus any configured extensions),
//! then share it read-only. [`FilterRegistry::global`] offers a process-wide instance for
//! callers that do not want to thread one through.

use std::{collections::HashMap, fmt, sync::OnceLock};

use indexmap::{IndexMap, IndexSet};

use crate::foundation::error::{FfgraphError, FfgraphResult};

/// Accepted values for one parameter.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRange {
    /// Inclusive `[min, max]`; the value must parse as a finite number.
    Numeric { min: f64, max: f64 },
    /// The value must be one of these literals.
    OneOf(Vec<String>),
}

impl ParamRange {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Numeric { min, max } => value
                .trim()
                .parse::<f64>()
                .is_ok_and(|v| v.is_finite() && *min <= v && v <= *max),
            Self::OneOf(allowed) => allowed.iter().any(|a| a == value),
        }
    }

    fn check_shape(&self) -> Result<(), String> {
        match self {
            Self::Numeric { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err("numeric range bounds must be finite".to_owned());
                }
                if min > max {
                    return Err(format!("numeric range [{min}, {max}] is inverted"));
                }
                Ok(())
            }
            Self::OneOf(allowed) if allowed.is_empty() => {
                Err("enumerated range must list at least one value".to_owned())
            }
            Self::OneOf(_) => Ok(()),
        }
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric { min, max } => write!(f, "[{min}, {max}]"),
            Self::OneOf(allowed) => write!(f, "one of {{{}}}", allowed.join(", ")),
        }
    }
}

/// Parameter contract of one filter.
///
/// `required_params` keeps declaration order: bare numeric values in a filter's argument list
/// bind to the first unclaimed required parameters in that order (`scale=1280:720`).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub required_params: IndexSet<String>,
    #[serde(default)]
    pub optional_params: IndexSet<String>,
    #[serde(default)]
    pub param_ranges: IndexMap<String, ParamRange>,
}

impl FilterSpec {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_params: required.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn optional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.required_params.contains(&name) {
                self.optional_params.insert(name);
            }
        }
        self
    }

    pub fn numeric(self, param: &str, min: f64, max: f64) -> Self {
        self.with_range(param, ParamRange::Numeric { min, max })
    }

    pub fn one_of(self, param: &str, values: &[&str]) -> Self {
        let values = values.iter().map(|v| (*v).to_owned()).collect();
        self.with_range(param, ParamRange::OneOf(values))
    }

    fn with_range(mut self, param: &str, range: ParamRange) -> Self {
        if !self.required_params.contains(param) {
            self.optional_params.insert(param.to_owned());
        }
        self.param_ranges.insert(param.to_owned(), range);
        self
    }

    pub fn is_known_param(&self, name: &str) -> bool {
        self.required_params.contains(name) || self.optional_params.contains(name)
    }

    pub(crate) fn validate_shape(&self, filter: &str) -> FfgraphResult<()> {
        for (param, range) in &self.param_ranges {
            range.check_shape().map_err(|msg| {
                FfgraphError::config(format!("filter '{filter}' parameter '{param}': {msg}"))
            })?;
        }
        Ok(())
    }
}

/// Filters known without any configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinFilter {
    Scale,
    Format,
    Volume,
    Rotate,
    Eq,
    ColorBalance,
    Gblur,
    Amix,
    Hstack,
    Vstack,
    Overlay,
    Crop,
    ColorChannelMixer,
    Hue,
    Fps,
}

const PIXEL_FORMATS: &[&str] = &[
    "yuv420p", "yuv422p", "yuv444p", "yuvj420p", "nv12", "p010le", "rgb24", "bgr24", "rgba",
    "bgra", "gray", "cuda", "qsv", "vaapi",
];

impl BuiltinFilter {
    pub const ALL: [Self; 15] = [
        Self::Scale,
        Self::Format,
        Self::Volume,
        Self::Rotate,
        Self::Eq,
        Self::ColorBalance,
        Self::Gblur,
        Self::Amix,
        Self::Hstack,
        Self::Vstack,
        Self::Overlay,
        Self::Crop,
        Self::ColorChannelMixer,
        Self::Hue,
        Self::Fps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Scale => "scale",
            Self::Format => "format",
            Self::Volume => "volume",
            Self::Rotate => "rotate",
            Self::Eq => "eq",
            Self::ColorBalance => "colorbalance",
            Self::Gblur => "gblur",
            Self::Amix => "amix",
            Self::Hstack => "hstack",
            Self::Vstack => "vstack",
            Self::Overlay => "overlay",
            Self::Crop => "crop",
            Self::ColorChannelMixer => "colorchannelmixer",
            Self::Hue => "hue",
            Self::Fps => "fps",
        }
    }

    pub fn spec(self) -> FilterSpec {
        match self {
            Self::Scale => FilterSpec::new(["width", "height"])
                .numeric("width", 1.0, 7680.0)
                .numeric("height", 1.0, 4320.0)
                .one_of(
                    "flags",
                    &[
                        "fast_bilinear",
                        "bilinear",
                        "bicubic",
                        "neighbor",
                        "area",
                        "lanczos",
                        "spline",
                    ],
                ),
            Self::Format => FilterSpec::default().one_of("pix_fmts", PIXEL_FORMATS),
            Self::Volume => FilterSpec::new(["volume"]).numeric("volume", 0.0, 10.0),
            Self::Rotate => FilterSpec::new(["angle"])
                .numeric("angle", 0.0, 360.0)
                .optional(["out_w", "out_h", "fillcolor"]),
            Self::Eq => FilterSpec::default()
                .numeric("brightness", -1.0, 1.0)
                .numeric("contrast", 0.0, 2.0)
                .numeric("saturation", 0.0, 3.0)
                .numeric("gamma", 0.1, 10.0),
            Self::ColorBalance => {
                let mut spec = FilterSpec::default();
                for p in ["rs", "gs", "bs", "rm", "gm", "bm", "rh", "gh", "bh"] {
                    spec = spec.numeric(p, -1.0, 1.0);
                }
                spec
            }
            Self::Gblur => FilterSpec::default()
                .numeric("sigma", 0.0, 1024.0)
                .numeric("steps", 1.0, 6.0),
            Self::Amix => FilterSpec::new(["inputs"])
                .numeric("inputs", 2.0, 32.0)
                .one_of("duration", &["longest", "shortest", "first"])
                .optional(["weights", "dropout_transition", "normalize"]),
            Self::Hstack | Self::Vstack => FilterSpec::default()
                .numeric("inputs", 2.0, 64.0)
                .one_of("shortest", &["0", "1"]),
            Self::Overlay => FilterSpec::default()
                .optional(["x", "y"])
                .one_of("eof_action", &["repeat", "endall", "pass"]),
            Self::Crop => FilterSpec::new(["w", "h"]).optional(["x", "y", "keep_aspect", "exact"]),
            Self::ColorChannelMixer => {
                let mut spec = FilterSpec::default();
                for p in [
                    "rr", "rg", "rb", "ra", "gr", "gg", "gb", "ga", "br", "bg", "bb", "ba", "ar",
                    "ag", "ab", "aa",
                ] {
                    spec = spec.numeric(p, -2.0, 2.0);
                }
                spec
            }
            Self::Hue => FilterSpec::default()
                .numeric("s", 0.0, 10.0)
                .optional(["h", "H", "b"]),
            Self::Fps => {
                FilterSpec::new(["fps"]).one_of("round", &["zero", "inf", "down", "up", "near"])
            }
        }
    }
}

/// Name → [`FilterSpec`] table. Lookups are O(1).
#[derive(Clone, Debug, Default)]
pub struct FilterRegistry {
    specs: HashMap<String, FilterSpec>,
}

static GLOBAL: OnceLock<FilterRegistry> = OnceLock::new();

impl FilterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for filter in BuiltinFilter::ALL {
            registry.register(filter.name(), filter.spec());
        }
        registry
    }

    /// Inserts or replaces the spec for `name`.
    pub fn register(&mut self, name: impl Into<String>, spec: FilterSpec) {
        self.specs.insert(name.into(), spec);
    }

    pub fn get_spec(&self, name: &str) -> Option<&FilterSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Registered names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Installs `registry` as the process-wide instance.
    ///
    /// Must run before the first call to [`FilterRegistry::global`]; afterwards the global is
    /// frozen and this returns an error.
    pub fn install_global(registry: FilterRegistry) -> FfgraphResult<()> {
        GLOBAL.set(registry).map_err(|_| {
            FfgraphError::config(
                "the global filter registry is already initialized; install extensions before first use",
            )
        })
    }

    /// The process-wide registry: the installed one, or the built-ins if none was installed.
    pub fn global() -> &'static FilterRegistry {
        GLOBAL.get_or_init(FilterRegistry::builtin)
    }
}
