//! Serializes a [`ParsedCommand`] back to canonical command text.
//!
//! Output re-parses to an equal command: values the lexer would split or mangle are wrapped in
//! double quotes with `\` and `"` escaped.

use std::collections::HashSet;

use crate::command::ir::{
    FilterApplication, FilterChain, ParsedCommand, is_positional_key, stream_specifier_index,
};
use crate::command::lexer::{is_drive_path, is_expr_char};
use crate::command::parser::is_valueless_flag;

const PROGRAM: &str = "ffmpeg";

/// Canonical single-line text for `cmd`.
///
/// Starts with the `ffmpeg` program word when the first argument is not a flag, so the text is
/// not read back as a bare filter graph.
pub fn generate(cmd: &ParsedCommand) -> String {
    let args = command_args(cmd);
    let mut words = Vec::with_capacity(args.len() + 1);
    if matches!(args.first(), Some(Arg::Value(_))) {
        words.push(PROGRAM.to_owned());
    }
    words.extend(args.iter().map(|arg| match arg {
        Arg::Flag(flag) => flag.clone(),
        Arg::Value(value) => quote_word(value),
        Arg::Graph(graph) => quote(graph),
    }));
    words.join(" ")
}

/// The argument vector an executor would receive, without shell quoting.
pub fn generate_args(cmd: &ParsedCommand) -> Vec<String> {
    command_args(cmd)
        .into_iter()
        .map(|arg| match arg {
            Arg::Flag(s) | Arg::Value(s) | Arg::Graph(s) => s,
        })
        .collect()
}

enum Arg {
    Flag(String),
    Value(String),
    Graph(String),
}

fn command_args(cmd: &ParsedCommand) -> Vec<Arg> {
    let mut args = Vec::new();

    for (flag, value) in &cmd.global_options {
        push_option(&mut args, flag, value);
    }
    for input in &cmd.inputs {
        args.push(Arg::Flag("-i".to_owned()));
        args.push(Arg::Value(input.clone()));
    }
    if !cmd.chains.is_empty() {
        args.push(Arg::Flag("-filter_complex".to_owned()));
        args.push(Arg::Graph(render_filter_graph(&cmd.chains)));
    }
    // A map naming a chain output is a graph label even when it looks like a specifier.
    let graph_labels: HashSet<&str> = cmd
        .chains
        .iter()
        .filter_map(|c| c.output.as_ref())
        .map(|s| s.label.as_str())
        .collect();
    for output in &cmd.outputs {
        for map in &output.maps {
            args.push(Arg::Flag("-map".to_owned()));
            if graph_labels.contains(map.as_str()) || stream_specifier_index(map).is_none() {
                args.push(Arg::Value(format!("[{map}]")));
            } else {
                args.push(Arg::Value(map.clone()));
            }
        }
        for (flag, value) in &output.codec_options {
            push_option(&mut args, flag, value);
        }
        args.push(Arg::Value(output.path.clone()));
    }

    args
}

fn push_option(args: &mut Vec<Arg>, flag: &str, value: &str) {
    args.push(Arg::Flag(format!("-{flag}")));
    if !(value.is_empty() && is_valueless_flag(flag)) {
        args.push(Arg::Value(value.to_owned()));
    }
}

/// `[in]name=k=v:...,name2[out];...`
pub fn render_filter_graph(chains: &[FilterChain]) -> String {
    chains.iter().map(render_chain).collect::<Vec<_>>().join(";")
}

fn render_chain(chain: &FilterChain) -> String {
    let mut s = String::new();
    for input in &chain.inputs {
        s.push_str(&render_label(&input.label));
    }
    let apps: Vec<String> = chain.applications.iter().map(render_application).collect();
    s.push_str(&apps.join(","));
    if let Some(output) = &chain.output {
        s.push_str(&render_label(&output.label));
    }
    s
}

fn render_label(label: &str) -> String {
    if label.chars().all(is_expr_char) {
        format!("[{label}]")
    } else {
        format!("[{}]", quote(label))
    }
}

fn render_application(app: &FilterApplication) -> String {
    if app.params.is_empty() {
        return app.name.clone();
    }
    let params: Vec<String> = app
        .params
        .iter()
        .map(|(key, value)| {
            if is_positional_key(key) {
                render_value(value, false)
            } else {
                format!("{key}={}", render_value(value, true))
            }
        })
        .collect();
    format!("{}={}", app.name, params.join(":"))
}

// A named value may carry `=`: only the first one separates the key.
fn render_value(value: &str, allow_equals: bool) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| (is_expr_char(c) && c != ':') || (allow_equals && c == '='));
    if plain { value.to_owned() } else { quote(value) }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn quote_word(word: &str) -> String {
    let mut chars = word.chars();
    let looks_like_flag =
        chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let lexable = word
        .chars()
        .all(|c| is_expr_char(c) || matches!(c, '=' | ',' | ';' | '[' | ']'));
    if !word.is_empty() && !looks_like_flag && (lexable || is_drive_path(word)) {
        word.to_owned()
    } else {
        quote(word)
    }
}
