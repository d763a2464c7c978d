//! ffgraph turns a raw FFmpeg command line (or a bare `-filter_complex` graph) into a validated,
//! optionally hardware-retargeted, canonical command line.
//!
//! The stages run strictly in sequence:
//!
//! - [`command::lexer::lex`] splits text into tokens
//! - [`command::parser::parse_command`] builds a [`ParsedCommand`]
//! - [`SemanticAnalyzer`] checks stream-label lifecycle, parameters and acyclicity
//! - [`accel::rewrite`] retargets filters to a vendor [`AcceleratorProfile`] (optional)
//! - [`command::generate::generate`] serializes the result back to text
//!
//! [`Pipeline`] wires them together.
#![forbid(unsafe_code)]

pub mod accel;
pub mod analyze;
pub mod command;
pub mod config;
mod foundation;
pub mod pipeline;
pub mod registry;

pub use crate::accel::{
    AcceleratorProfile, Backend, FfmpegHwaccelProbe, FilterMapping, HardwareProbe, RewriteReport,
    StaticProbe,
};
pub use crate::analyze::{SemanticAnalyzer, Validation};
pub use crate::command::ir::{
    FilterApplication, FilterChain, OutputSpec, ParsedCommand, Stream, StreamKind,
};
pub use crate::config::{AccelChoice, AnalyzerConfig};
pub use crate::foundation::error::{
    Diagnostic, ErrorKind, FfgraphError, FfgraphResult, LexError, ParseError, SemanticError,
    Severity,
};
pub use crate::pipeline::{Analysis, Pipeline};
pub use crate::registry::{BuiltinFilter, FilterRegistry, FilterSpec, ParamRange};
