//! Retargeting validated commands to vendor hardware filters and encoders.

pub mod probe;
pub mod profile;
pub mod rewrite;

pub use probe::{FfmpegHwaccelProbe, HardwareProbe, StaticProbe, select_profile};
pub use profile::{AcceleratorProfile, Backend, FilterMapping};
pub use rewrite::{RewriteReport, rewrite};
