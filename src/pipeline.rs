use crate::accel::{AcceleratorProfile, RewriteReport, rewrite};
use crate::analyze::{SemanticAnalyzer, Validation};
use crate::command::generate::{generate, generate_args};
use crate::command::ir::ParsedCommand;
use crate::command::parser::parse_command;
use crate::foundation::error::{Diagnostic, FfgraphResult};
use crate::registry::FilterRegistry;

/// Outcome of a successful [`Pipeline::analyze`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Analysis {
    /// The final command, retargeted when a profile was set.
    pub command: ParsedCommand,
    pub canonical: String,
    pub warnings: Vec<Diagnostic>,
    pub rewrite: Option<RewriteReport>,
}

impl Analysis {
    /// Argument vector for a process executor.
    pub fn args(&self) -> Vec<String> {
        generate_args(&self.command)
    }
}

/// Lex → parse → validate → (retarget → re-check labels) → generate.
///
/// Holds no per-run state; one pipeline may serve any number of commands, and independent
/// pipelines may run on separate threads.
#[derive(Clone, Debug)]
pub struct Pipeline<'r> {
    registry: &'r FilterRegistry,
    profile: Option<AcceleratorProfile>,
}

impl Pipeline<'static> {
    /// Pipeline over the process-wide registry.
    pub fn global() -> Self {
        Self::new(FilterRegistry::global())
    }
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r FilterRegistry) -> Self {
        Self {
            registry,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: AcceleratorProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_optional_profile(mut self, profile: Option<AcceleratorProfile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn registry(&self) -> &'r FilterRegistry {
        self.registry
    }

    pub fn profile(&self) -> Option<&AcceleratorProfile> {
        self.profile.as_ref()
    }

    pub fn parse(&self, text: &str) -> FfgraphResult<ParsedCommand> {
        parse_command(text, self.registry)
    }

    pub fn validate(&self, cmd: &ParsedCommand) -> FfgraphResult<Validation> {
        Ok(SemanticAnalyzer::new(self.registry).validate(cmd)?)
    }

    #[tracing::instrument(
        skip_all,
        fields(len = text.len(), profile = self.profile.as_ref().map(|p| p.name.as_str()))
    )]
    pub fn analyze(&self, text: &str) -> FfgraphResult<Analysis> {
        let analyzer = SemanticAnalyzer::new(self.registry);
        let parsed = self.parse(text)?;
        let validation = analyzer.validate(&parsed)?;

        let (command, report) = match &self.profile {
            Some(profile) => {
                let (rewritten, report) = rewrite(&parsed, profile);
                analyzer.validate_graph(&rewritten)?;
                (rewritten, Some(report))
            }
            None => (parsed, None),
        };

        let canonical = generate(&command);
        tracing::debug!(
            warnings = validation.warnings.len(),
            canonical_len = canonical.len(),
            "analysis complete"
        );
        Ok(Analysis {
            command,
            canonical,
            warnings: validation.warnings,
            rewrite: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::Backend;
    use crate::foundation::error::{ErrorKind, FfgraphError, SemanticError};

    #[test]
    fn analyze_without_profile_regenerates() {
        let registry = FilterRegistry::builtin();
        let a = Pipeline::new(&registry)
            .analyze("[0:v]scale=1280:720[out]")
            .unwrap();
        assert_eq!(
            a.canonical,
            r#"-filter_complex "[0:v]scale=width=1280:height=720[out]""#
        );
        assert!(a.rewrite.is_none());
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn analyze_with_profile_retargets() {
        let registry = FilterRegistry::builtin();
        let a = Pipeline::new(&registry)
            .with_profile(Backend::Cuda.profile())
            .analyze("-i in.mp4 -filter_complex \"[0:v]scale=1280:720[v]\" -map [v] -c:v libx264 out.mp4")
            .unwrap();
        assert_eq!(
            a.canonical,
            r#"-hwaccel cuda -i in.mp4 -filter_complex "[0:v]scale_cuda=w=1280:h=720[v]" -map [v] -c:v h264_nvenc out.mp4"#
        );
        assert_eq!(a.rewrite.as_ref().map(|r| r.codec_changes), Some(1));
        assert_eq!(a.args()[0], "-hwaccel");
    }

    #[test]
    fn range_checks_run_before_retargeting() {
        let registry = FilterRegistry::builtin();
        let err = Pipeline::new(&registry)
            .with_profile(Backend::Qsv.profile())
            .analyze("[0:v]scale=0:720[v]")
            .unwrap_err();
        assert!(matches!(
            err,
            FfgraphError::Semantic(SemanticError::ParamRange { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::ParamRange);
    }

    #[test]
    fn global_pipeline_uses_builtins() {
        let p = Pipeline::global();
        assert!(p.registry().contains("scale"));
        assert!(p.profile().is_none());
    }
}
