//! Intermediate representation produced by the parser and consumed by every later stage.

use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Unknown,
}

impl StreamKind {
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'v' => Some(Self::Video),
            'a' => Some(Self::Audio),
            's' => Some(Self::Subtitle),
            _ => None,
        }
    }
}

/// Splits an implicit input-stream label `<index>:<kind-letter>` (`0:v`, `12:a`).
pub fn parse_implicit(label: &str) -> Option<(usize, StreamKind)> {
    let (index, kind) = label.split_once(':')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut letters = kind.chars();
    let kind = StreamKind::from_letter(letters.next()?)?;
    if letters.next().is_some() {
        return None;
    }
    Some((index.parse().ok()?, kind))
}

/// File index of an input stream specifier as `-map` takes it (`0`, `1:a:0`, `-0:s?`).
pub fn stream_specifier_index(map: &str) -> Option<usize> {
    let spec = map.strip_prefix('-').unwrap_or(map);
    let spec = spec.strip_suffix('?').unwrap_or(spec);
    let mut parts = spec.split(':');
    let index = parts.next()?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !parts.all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_alphanumeric())) {
        return None;
    }
    index.parse().ok()
}

/// A named edge of the filter graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Stream {
    pub label: String,
    pub kind: StreamKind,
}

impl Stream {
    /// Classifies `label`: implicit input streams take their kind from the letter, explicit
    /// chain outputs are [`StreamKind::Unknown`].
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let kind = parse_implicit(&label).map_or(StreamKind::Unknown, |(_, k)| k);
        Self { label, kind }
    }

    pub fn is_implicit(&self) -> bool {
        parse_implicit(&self.label).is_some()
    }

    pub fn input_index(&self) -> Option<usize> {
        parse_implicit(&self.label).map(|(i, _)| i)
    }
}

/// One filter invocation: `name=key=value:...`.
///
/// Parameters keep insertion order. Bare values that could not be bound to a named parameter
/// are stored under their ordinal position (`"0"`, `"1"`, ...).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FilterApplication {
    pub name: String,
    pub params: IndexMap<String, String>,
}

impl FilterApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// True for the ordinal keys used for positional parameters.
pub fn is_positional_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FilterChain {
    pub inputs: Vec<Stream>,
    /// Never empty for a parsed chain.
    pub applications: Vec<FilterApplication>,
    pub output: Option<Stream>,
}

/// Option keys that carry an output's video codec.
pub const VIDEO_CODEC_KEYS: [&str; 3] = ["c:v", "codec:v", "vcodec"];

/// One destination file with the `-map` selections and options that precede it.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct OutputSpec {
    pub path: String,
    /// `-map` selections with brackets stripped: filter-graph labels or input stream specifiers.
    pub maps: Vec<String>,
    /// Option name without the leading dash → value (`"c:v" → "libx264"`).
    pub codec_options: IndexMap<String, String>,
}

impl OutputSpec {
    pub fn video_codec(&self) -> Option<&str> {
        VIDEO_CODEC_KEYS
            .iter()
            .find_map(|k| self.codec_options.get(*k))
            .map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParsedCommand {
    pub inputs: Vec<String>,
    /// Option name without the leading dash → value (`""` for value-less flags).
    pub global_options: IndexMap<String, String>,
    pub chains: Vec<FilterChain>,
    pub outputs: Vec<OutputSpec>,
}

impl ParsedCommand {
    pub fn applications(&self) -> impl Iterator<Item = &FilterApplication> {
        self.chains.iter().flat_map(|c| c.applications.iter())
    }
}
