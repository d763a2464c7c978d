use std::fmt;

pub type FfgraphResult<T> = Result<T, FfgraphError>;

#[derive(thiserror::Error, Debug)]
pub enum FfgraphError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FfgraphError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lex(_) => ErrorKind::LexError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Semantic(e) => e.kind(),
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Other(_) => ErrorKind::InternalError,
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            Self::Lex(e) => e.suggestion(),
            Self::Parse(e) => e.suggestion(),
            Self::Semantic(e) => e.suggestion(),
            Self::Config(_) => {
                "check the configuration file against the documented schema".to_owned()
            }
            Self::Other(_) => "inspect the error chain for the underlying cause".to_owned(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// Structured form of this error for callers outside the pipeline.
    pub fn diagnostic(&self) -> Diagnostic {
        let message = match self {
            Self::Lex(e) => e.to_string(),
            Self::Parse(e) => e.to_string(),
            Self::Semantic(e) => e.to_string(),
            Self::Config(msg) => msg.clone(),
            Self::Other(e) => format!("{e:#}"),
        };
        Diagnostic {
            kind: self.kind(),
            message,
            suggestion: self.suggestion(),
            severity: self.severity(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Every failure or advisory the pipeline can report, as one tagged enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    LexError,
    ParseError,
    UnknownFilter,
    UnusedLabel,
    MissingParam,
    ParamRange,
    DuplicateLabel,
    UndefinedLabel,
    CircularDependency,
    OutputMapping,
    ConfigError,
    InternalError,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::LexError => "LEX_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::UnknownFilter => "UNKNOWN_FILTER",
            Self::UnusedLabel => "UNUSED_LABEL",
            Self::MissingParam => "MISSING_PARAM",
            Self::ParamRange => "PARAM_RANGE",
            Self::DuplicateLabel => "DUPLICATE_LABEL",
            Self::UndefinedLabel => "UNDEFINED_LABEL",
            Self::CircularDependency => "CIRCULAR_DEPENDENCY",
            Self::OutputMapping => "OUTPUT_MAPPING",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::LexError | Self::ParseError | Self::InternalError => Severity::Critical,
            Self::UnknownFilter | Self::UnusedLabel => Severity::Warning,
            Self::MissingParam
            | Self::ParamRange
            | Self::DuplicateLabel
            | Self::UndefinedLabel
            | Self::CircularDependency
            | Self::OutputMapping
            | Self::ConfigError => Severity::Error,
        }
    }
}

/// `{kind, message, suggestion, severity}` as handed to callers and serialized for `--json`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}\nsuggestion: {}",
            self.kind.code(),
            self.message,
            self.suggestion
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("empty command text")]
    EmptyInput,

    #[error("unrecognized character '{found}' at byte {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated quoted string starting at byte {offset}")]
    UnterminatedString { offset: usize },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            Self::EmptyInput => 0,
            Self::UnexpectedChar { offset, .. } | Self::UnterminatedString { offset } => *offset,
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            Self::EmptyInput => "provide an ffmpeg command line or a filter graph".to_owned(),
            Self::UnexpectedChar { found, .. } => format!(
                "check the syntax near '{found}'; wrap values containing special characters in double quotes"
            ),
            Self::UnterminatedString { .. } => "close the string with a matching '\"'".to_owned(),
        }
    }

    pub(crate) fn shifted(self, base: usize) -> Self {
        match self {
            Self::EmptyInput => Self::EmptyInput,
            Self::UnexpectedChar { found, offset } => Self::UnexpectedChar {
                found,
                offset: offset + base,
            },
            Self::UnterminatedString { offset } => Self::UnterminatedString {
                offset: offset + base,
            },
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unterminated stream label starting at byte {offset}")]
    UnterminatedBracket { offset: usize },

    #[error("empty stream label at byte {offset}")]
    EmptyLabel { offset: usize },

    #[error("expected a filter name at byte {offset}, found {found}")]
    MissingFilterName { offset: usize, found: String },

    #[error("malformed parameter '{segment}' for filter '{filter}': {reason}")]
    MalformedParameter {
        filter: String,
        segment: String,
        reason: String,
    },

    #[error("unexpected {found} at byte {offset}")]
    UnexpectedToken { offset: usize, found: String },

    #[error("chain already writes to '{existing}', second output label '{label}' at byte {offset}")]
    MultipleOutputLabels {
        existing: String,
        label: String,
        offset: usize,
    },

    #[error("option '-{flag}' expects a value")]
    MissingOptionValue { flag: String },

    #[error("output options {pending} are not followed by a destination path")]
    MissingOutputPath { pending: String },
}

impl ParseError {
    pub fn suggestion(&self) -> String {
        match self {
            Self::UnterminatedBracket { .. } => "close the stream label with ']'".to_owned(),
            Self::EmptyLabel { .. } => "give the stream label a name, e.g. [v0]".to_owned(),
            Self::MissingFilterName { .. } => {
                "every chain needs at least one filter, e.g. [0:v]null[out]".to_owned()
            }
            Self::MalformedParameter { filter, .. } => {
                format!("write parameters for '{filter}' as key=value separated by ':'")
            }
            Self::UnexpectedToken { .. } => {
                "separate filter chains with ';' after an output label".to_owned()
            }
            Self::MultipleOutputLabels { .. } => {
                "give each chain a single output label; split the stream in a separate chain"
                    .to_owned()
            }
            Self::MissingOptionValue { flag } => format!("add a value after '-{flag}'"),
            Self::MissingOutputPath { .. } => {
                "end the command with the output file those options apply to".to_owned()
            }
        }
    }

    pub(crate) fn shifted(self, base: usize) -> Self {
        match self {
            Self::UnterminatedBracket { offset } => Self::UnterminatedBracket {
                offset: offset + base,
            },
            Self::EmptyLabel { offset } => Self::EmptyLabel {
                offset: offset + base,
            },
            Self::MissingFilterName { offset, found } => Self::MissingFilterName {
                offset: offset + base,
                found,
            },
            Self::UnexpectedToken { offset, found } => Self::UnexpectedToken {
                offset: offset + base,
                found,
            },
            Self::MultipleOutputLabels {
                existing,
                label,
                offset,
            } => Self::MultipleOutputLabels {
                existing,
                label,
                offset: offset + base,
            },
            other @ (Self::MalformedParameter { .. }
            | Self::MissingOptionValue { .. }
            | Self::MissingOutputPath { .. }) => other,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("unknown filter '{name}'")]
    UnknownFilter { name: String },

    #[error("stream label '{label}' is produced but never consumed")]
    UnusedLabel { label: String },

    #[error("filter '{filter}' is missing required parameter '{param}'")]
    MissingParam { filter: String, param: String },

    #[error("filter '{filter}' parameter '{param}' = '{value}' is out of range (expected {expected})")]
    ParamRange {
        filter: String,
        param: String,
        value: String,
        expected: String,
    },

    #[error("stream label '{label}' is defined more than once")]
    DuplicateLabel { label: String },

    #[error("stream label '{label}' is used but never defined")]
    UndefinedLabel { label: String },

    #[error("circular stream dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("output '{path}' maps undefined stream '{label}'")]
    OutputMapping { label: String, path: String },
}

impl SemanticError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownFilter { .. } => ErrorKind::UnknownFilter,
            Self::UnusedLabel { .. } => ErrorKind::UnusedLabel,
            Self::MissingParam { .. } => ErrorKind::MissingParam,
            Self::ParamRange { .. } => ErrorKind::ParamRange,
            Self::DuplicateLabel { .. } => ErrorKind::DuplicateLabel,
            Self::UndefinedLabel { .. } => ErrorKind::UndefinedLabel,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::OutputMapping { .. } => ErrorKind::OutputMapping,
        }
    }

    /// Advisories are collected next to a successful validation instead of aborting it.
    pub fn is_advisory(&self) -> bool {
        self.kind().severity() == Severity::Warning
    }

    pub fn suggestion(&self) -> String {
        match self {
            Self::UnknownFilter { .. } => {
                "check the filter name or register its spec; it is passed through unchecked"
                    .to_owned()
            }
            Self::UnusedLabel { label } => {
                format!("consume [{label}] in a later chain, map it with -map, or drop the label")
            }
            Self::MissingParam { param, .. } => format!("add the parameter '{param}=...'"),
            Self::ParamRange { expected, .. } => format!("use a value within {expected}"),
            Self::DuplicateLabel { label } => {
                format!("rename one of the chains writing to [{label}]")
            }
            Self::UndefinedLabel { label } => format!(
                "define [{label}] as the output of a chain, or reference an input stream such as [0:v]"
            ),
            Self::CircularDependency { .. } => {
                "break the loop so that no chain consumes its own output".to_owned()
            }
            Self::OutputMapping { label, .. } => {
                format!("map a label produced by the filter graph or an input stream instead of '{label}'")
            }
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        let kind = self.kind();
        Diagnostic {
            kind,
            message: self.to_string(),
            suggestion: self.suggestion(),
            severity: kind.severity(),
        }
    }
}
