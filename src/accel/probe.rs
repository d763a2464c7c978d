use std::sync::OnceLock;

use crate::accel::profile::{AcceleratorProfile, Backend};

/// Answers whether a hardware backend can be used on this machine.
pub trait HardwareProbe {
    fn is_available(&self, backend: Backend) -> bool;
}

/// Fixed answers, for tests and for configuration that already knows the target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticProbe {
    available: Vec<Backend>,
}

impl StaticProbe {
    pub fn new(available: impl IntoIterator<Item = Backend>) -> Self {
        Self {
            available: available.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl HardwareProbe for StaticProbe {
    fn is_available(&self, backend: Backend) -> bool {
        self.available.contains(&backend)
    }
}

/// Asks the ffmpeg binary which hwaccel methods it was built with.
///
/// The binary runs at most once per probe; a missing or failing binary reports no backends.
#[derive(Debug)]
pub struct FfmpegHwaccelProbe {
    program: String,
    methods: OnceLock<Vec<String>>,
}

impl Default for FfmpegHwaccelProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegHwaccelProbe {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            methods: OnceLock::new(),
        }
    }

    pub fn methods(&self) -> &[String] {
        self.methods.get_or_init(|| query_hwaccels(&self.program))
    }
}

impl HardwareProbe for FfmpegHwaccelProbe {
    fn is_available(&self, backend: Backend) -> bool {
        self.methods().iter().any(|m| m == backend.name())
    }
}

fn query_hwaccels(program: &str) -> Vec<String> {
    let out = match std::process::Command::new(program)
        .args(["-hide_banner", "-hwaccels"])
        .output()
    {
        Ok(out) => out,
        Err(e) => {
            tracing::debug!(program, error = %e, "failed to run ffmpeg for hwaccel probe");
            return Vec::new();
        }
    };
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        tracing::debug!(
            program,
            status = %out.status,
            stderr = %stderr.trim(),
            "ffmpeg -hwaccels failed"
        );
        return Vec::new();
    }
    let methods = parse_hwaccels_output(&String::from_utf8_lossy(&out.stdout));
    tracing::debug!(program, ?methods, "probed hwaccel methods");
    methods
}

/// Method names listed after the `Hardware acceleration methods:` header.
pub fn parse_hwaccels_output(text: &str) -> Vec<String> {
    text.lines()
        .skip_while(|line| !line.trim_start().starts_with("Hardware acceleration methods"))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// First available backend in priority order; a configured profile named after the backend
/// replaces the built-in one.
pub fn select_profile(
    probe: &dyn HardwareProbe,
    profiles: &[AcceleratorProfile],
) -> Option<AcceleratorProfile> {
    for backend in Backend::PRIORITY {
        let available = probe.is_available(backend);
        tracing::debug!(backend = backend.name(), available, "probed backend");
        if available {
            let profile = profiles
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(backend.name()))
                .cloned()
                .unwrap_or_else(|| backend.profile());
            return Some(profile);
        }
    }
    None
}
