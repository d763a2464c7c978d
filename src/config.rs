//! JSON configuration: registry extensions, custom accelerator profiles and the accelerator
//! choice.
//!
//! ```json
//! {
//!   "filters": { "drawbox": { "required_params": ["w", "h"] } },
//!   "profiles": [ { "name": "cuda", "video_codec": "hevc_nvenc" } ],
//!   "accelerator": "auto"
//! }
//! ```

use std::{fmt, path::Path, str::FromStr};

use anyhow::Context;
use indexmap::IndexMap;

use crate::accel::{AcceleratorProfile, Backend, HardwareProbe, select_profile};
use crate::foundation::error::{FfgraphError, FfgraphResult};
use crate::registry::{FilterRegistry, FilterSpec};

/// Which accelerator profile to retarget to.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccelChoice {
    /// No retargeting.
    #[default]
    None,
    /// Probe backends in priority order and take the first available.
    Auto,
    /// A backend (`cuda`, `qsv`, `vaapi`) or a configured profile, used without probing.
    Named(String),
}

impl FromStr for AccelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("accelerator name cannot be empty".to_owned());
        }
        Ok(if s.eq_ignore_ascii_case("none") {
            Self::None
        } else if s.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Named(s.to_owned())
        })
    }
}

impl TryFrom<String> for AccelChoice {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccelChoice> for String {
    fn from(value: AccelChoice) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AccelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Auto => f.write_str("auto"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Added to (or replacing) the built-in filter specs.
    #[serde(default)]
    pub filters: IndexMap<String, FilterSpec>,
    /// Custom profiles; one named after a backend replaces that backend's built-in profile.
    #[serde(default)]
    pub profiles: Vec<AcceleratorProfile>,
    #[serde(default)]
    pub accelerator: AccelChoice,
}

impl AnalyzerConfig {
    pub fn from_json_str(text: &str) -> FfgraphResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| FfgraphError::config(format!("invalid configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> FfgraphResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        Self::from_json_str(&text).map_err(|e| match e {
            FfgraphError::Config(msg) => FfgraphError::config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> FfgraphResult<()> {
        for (name, spec) in &self.filters {
            if name.trim().is_empty() {
                return Err(FfgraphError::config("filter names must not be empty"));
            }
            spec.validate_shape(name)?;
        }

        for profile in &self.profiles {
            if profile.name.trim().is_empty() {
                return Err(FfgraphError::config("accelerator profile names must not be empty"));
            }
            if profile.video_codec.trim().is_empty() {
                return Err(FfgraphError::config(format!(
                    "accelerator profile '{}' has an empty video_codec",
                    profile.name
                )));
            }
            if let Some((filter, _)) = profile
                .supported_filters
                .iter()
                .find(|(_, m)| m.vendor_impl.trim().is_empty())
            {
                return Err(FfgraphError::config(format!(
                    "accelerator profile '{}' maps '{filter}' to an empty vendor filter",
                    profile.name
                )));
            }
        }

        if let AccelChoice::Named(name) = &self.accelerator {
            self.named_profile(name)?;
        }
        Ok(())
    }

    /// Built-in specs plus the configured `filters`.
    pub fn build_registry(&self) -> FilterRegistry {
        let mut registry = FilterRegistry::builtin();
        for (name, spec) in &self.filters {
            registry.register(name.clone(), spec.clone());
        }
        registry
    }

    /// The profile selected by `accelerator`.
    pub fn resolve_profile(
        &self,
        probe: &dyn HardwareProbe,
    ) -> FfgraphResult<Option<AcceleratorProfile>> {
        self.profile_for(&self.accelerator, probe)
    }

    /// The profile for `choice`, which may override the configured one.
    pub fn profile_for(
        &self,
        choice: &AccelChoice,
        probe: &dyn HardwareProbe,
    ) -> FfgraphResult<Option<AcceleratorProfile>> {
        match choice {
            AccelChoice::None => Ok(None),
            AccelChoice::Auto => Ok(select_profile(probe, &self.profiles)),
            AccelChoice::Named(name) => self.named_profile(name).map(Some),
        }
    }

    fn named_profile(&self, name: &str) -> FfgraphResult<AcceleratorProfile> {
        if let Some(profile) = self
            .profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Ok(profile.clone());
        }
        Backend::from_name(name).map(Backend::profile).ok_or_else(|| {
            FfgraphError::config(format!(
                "unknown accelerator '{name}'; expected none, auto, cuda, qsv, vaapi or a configured profile name"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::StaticProbe;
    use crate::registry::ParamRange;

    #[test]
    fn empty_object_is_the_default() {
        let cfg = AnalyzerConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, AnalyzerConfig::default());
        assert_eq!(cfg.accelerator, AccelChoice::None);
    }

    #[test]
    fn filters_extend_the_builtins() {
        let cfg = AnalyzerConfig::from_json_str(
            r#"{"filters":{"drawbox":{"required_params":["w","h"],"param_ranges":{"t":{"numeric":{"min":0,"max":100}}}}}}"#,
        )
        .unwrap();
        let registry = cfg.build_registry();
        assert!(registry.contains("scale"));
        let spec = registry.get_spec("drawbox").unwrap();
        assert_eq!(spec.required_params.iter().collect::<Vec<_>>(), vec!["w", "h"]);
        assert_eq!(
            spec.param_ranges.get("t"),
            Some(&ParamRange::Numeric {
                min: 0.0,
                max: 100.0
            })
        );
    }

    #[test]
    fn rejects_bad_documents() {
        for text in [
            "not json",
            r#"{"unknown_key":1}"#,
            r#"{"filters":{"":{}}}"#,
            r#"{"filters":{"x":{"param_ranges":{"a":{"numeric":{"min":5,"max":1}}}}}}"#,
            r#"{"profiles":[{"name":"lab","video_codec":""}]}"#,
            r#"{"accelerator":"metal"}"#,
            r#"{"accelerator":""}"#,
        ] {
            assert!(
                matches!(AnalyzerConfig::from_json_str(text), Err(FfgraphError::Config(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn choices_parse_case_insensitively() {
        assert_eq!("AUTO".parse::<AccelChoice>(), Ok(AccelChoice::Auto));
        assert_eq!("none".parse::<AccelChoice>(), Ok(AccelChoice::None));
        assert_eq!(
            "cuda".parse::<AccelChoice>(),
            Ok(AccelChoice::Named("cuda".to_owned()))
        );
        assert_eq!(AccelChoice::Auto.to_string(), "auto");
    }

    #[test]
    fn resolves_named_auto_and_none() {
        let cfg = AnalyzerConfig::from_json_str(
            r#"{"profiles":[{"name":"lab","video_codec":"av1_nvenc"}],"accelerator":"lab"}"#,
        )
        .unwrap();
        let probe = StaticProbe::none();
        assert_eq!(cfg.resolve_profile(&probe).unwrap().unwrap().video_codec, "av1_nvenc");
        assert_eq!(
            cfg.profile_for(&AccelChoice::Named("vaapi".to_owned()), &probe)
                .unwrap()
                .unwrap()
                .name,
            "vaapi"
        );
        assert!(cfg.profile_for(&AccelChoice::Auto, &probe).unwrap().is_none());
        assert!(cfg.profile_for(&AccelChoice::None, &probe).unwrap().is_none());
        assert!(matches!(
            cfg.profile_for(&AccelChoice::Named("metal".to_owned()), &probe),
            Err(FfgraphError::Config(_))
        ));
    }

    #[test]
    fn missing_file_keeps_the_path_in_context() {
        let err = AnalyzerConfig::from_json_file("/nonexistent/ffgraph.json").unwrap_err();
        assert!(matches!(err, FfgraphError::Other(_)));
        assert!(format!("{:#}", err).contains("/nonexistent/ffgraph.json"));
    }
}
