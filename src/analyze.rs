use std::collections::{BTreeSet, HashSet};

use indexmap::IndexSet;

use crate::command::ir::{
    FilterApplication, ParsedCommand, is_positional_key, parse_implicit, stream_specifier_index,
};
use crate::foundation::error::{Diagnostic, SemanticError};
use crate::registry::FilterRegistry;

/// Result of a successful validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Validation {
    /// Advisories (`UNKNOWN_FILTER`, `UNUSED_LABEL`); never fatal.
    pub warnings: Vec<Diagnostic>,
    /// Every label in dependency order; ties keep first appearance in the command.
    pub label_order: Vec<String>,
}

/// Checks stream-label lifecycle, filter parameters, acyclicity and output mappings.
///
/// The analyzer holds no per-call state; every call builds its label scope from scratch, so one
/// analyzer can validate any number of commands.
#[derive(Clone, Copy, Debug)]
pub struct SemanticAnalyzer<'r> {
    registry: &'r FilterRegistry,
}

impl<'r> SemanticAnalyzer<'r> {
    pub fn new(registry: &'r FilterRegistry) -> Self {
        Self { registry }
    }

    /// Full validation. Stops at the first fatal error; advisories accumulate in the result.
    #[tracing::instrument(skip_all, fields(chains = cmd.chains.len(), outputs = cmd.outputs.len()))]
    pub fn validate(&self, cmd: &ParsedCommand) -> Result<Validation, SemanticError> {
        self.run(cmd, true)
    }

    /// Label, cycle and mapping checks only. Used after retargeting, when filter and parameter
    /// names belong to a vendor and no longer match the registry.
    pub fn validate_graph(&self, cmd: &ParsedCommand) -> Result<Validation, SemanticError> {
        self.run(cmd, false)
    }

    fn run(&self, cmd: &ParsedCommand, check_filters: bool) -> Result<Validation, SemanticError> {
        let mut warnings = Vec::new();
        let mut scope = LabelScope::new(cmd);

        for chain in &cmd.chains {
            if let Some(out) = &chain.output {
                if scope.is_defined(&out.label) {
                    return Err(SemanticError::DuplicateLabel {
                        label: out.label.clone(),
                    });
                }
                scope.defined.insert(&out.label);
            }
        }

        let mut unknown = HashSet::new();
        for chain in &cmd.chains {
            for input in &chain.inputs {
                if !scope.is_defined(&input.label) {
                    return Err(SemanticError::UndefinedLabel {
                        label: input.label.clone(),
                    });
                }
            }
            if !check_filters {
                continue;
            }
            for app in &chain.applications {
                if self.check_application(app)? || !unknown.insert(app.name.as_str()) {
                    continue;
                }
                tracing::warn!(filter = %app.name, "unknown filter passed through unchecked");
                warnings.push(
                    SemanticError::UnknownFilter {
                        name: app.name.clone(),
                    }
                    .diagnostic(),
                );
            }
        }

        let label_order = topo_order(cmd)?;

        for output in &cmd.outputs {
            for map in &output.maps {
                let from_input = stream_specifier_index(map).is_some_and(|i| i < cmd.inputs.len());
                if !scope.is_defined(map) && !from_input {
                    return Err(SemanticError::OutputMapping {
                        label: map.clone(),
                        path: output.path.clone(),
                    });
                }
            }
        }

        if !cmd.outputs.is_empty() {
            let consumed: HashSet<&str> = cmd
                .chains
                .iter()
                .flat_map(|c| c.inputs.iter().map(|s| s.label.as_str()))
                .chain(cmd.outputs.iter().flat_map(|o| o.maps.iter().map(String::as_str)))
                .collect();
            for label in cmd.chains.iter().filter_map(|c| c.output.as_ref()) {
                if !consumed.contains(label.label.as_str()) {
                    tracing::warn!(label = %label.label, "stream label is never consumed");
                    warnings.push(
                        SemanticError::UnusedLabel {
                            label: label.label.clone(),
                        }
                        .diagnostic(),
                    );
                }
            }
        }

        Ok(Validation {
            warnings,
            label_order,
        })
    }

    // Ok(false) when the filter is not registered.
    fn check_application(&self, app: &FilterApplication) -> Result<bool, SemanticError> {
        let Some(spec) = self.registry.get_spec(&app.name) else {
            return Ok(false);
        };

        if let Some(param) = spec
            .required_params
            .iter()
            .find(|p| !app.params.contains_key(p.as_str()))
        {
            return Err(SemanticError::MissingParam {
                filter: app.name.clone(),
                param: param.clone(),
            });
        }

        for (key, value) in &app.params {
            if is_positional_key(key) {
                continue;
            }
            if let Some(range) = spec.param_ranges.get(key)
                && !range.contains(value)
            {
                return Err(SemanticError::ParamRange {
                    filter: app.name.clone(),
                    param: key.clone(),
                    value: value.clone(),
                    expected: range.to_string(),
                });
            }
        }
        Ok(true)
    }
}

struct LabelScope<'c> {
    defined: HashSet<&'c str>,
    input_count: usize,
    // No inputs declared: every implicit-looking label is taken as a real input stream.
    bare: bool,
}

impl<'c> LabelScope<'c> {
    fn new(cmd: &'c ParsedCommand) -> Self {
        Self {
            defined: HashSet::new(),
            input_count: cmd.inputs.len(),
            bare: cmd.inputs.is_empty(),
        }
    }

    fn is_defined(&self, label: &str) -> bool {
        self.defined.contains(label)
            || parse_implicit(label).is_some_and(|(i, _)| self.bare || i < self.input_count)
    }
}

// `-map` also accepts input stream specifiers: `0`, `1:a:0`, `-0:s`, `0:v?`.
// Kahn's algorithm over labels; an edge runs from every chain input to that chain's output.
fn topo_order(cmd: &ParsedCommand) -> Result<Vec<String>, SemanticError> {
    let mut nodes: IndexSet<&str> = IndexSet::new();
    for chain in &cmd.chains {
        for input in &chain.inputs {
            nodes.insert(input.label.as_str());
        }
        if let Some(out) = &chain.output {
            nodes.insert(out.label.as_str());
        }
    }

    let n = nodes.len();
    let mut indeg = vec![0u32; n];
    let mut outs: Vec<Vec<usize>> = vec![Vec::new(); n];
    for chain in &cmd.chains {
        let Some(to) = chain.output.as_ref().and_then(|o| nodes.get_index_of(o.label.as_str()))
        else {
            continue;
        };
        for input in &chain.inputs {
            if let Some(from) = nodes.get_index_of(input.label.as_str()) {
                outs[from].push(to);
                indeg[to] = indeg[to].saturating_add(1);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        if let Some(label) = nodes.get_index(i) {
            order.push((*label).to_owned());
        }
        for &j in &outs[i] {
            let dj = &mut indeg[j];
            *dj = dj.saturating_sub(1);
            if *dj == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() != n {
        let cycle = find_cycle(&outs)
            .into_iter()
            .filter_map(|i| nodes.get_index(i).map(|l| (*l).to_owned()))
            .collect();
        return Err(SemanticError::CircularDependency { cycle });
    }
    Ok(order)
}

fn find_cycle(outs: &[Vec<usize>]) -> Vec<usize> {
    let n = outs.len();
    let mut state = vec![0u8; n]; // 0=unvisited,1=visiting,2=done
    let mut stack: Vec<usize> = Vec::new();

    fn dfs(
        v: usize,
        outs: &[Vec<usize>],
        state: &mut [u8],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        state[v] = 1;
        stack.push(v);
        for &to in &outs[v] {
            match state[to] {
                0 => {
                    if let Some(c) = dfs(to, outs, state, stack) {
                        return Some(c);
                    }
                }
                1 => {
                    let pos = stack.iter().position(|&x| x == to).unwrap_or(0);
                    let mut cycle = stack[pos..].to_vec();
                    cycle.push(to);
                    return Some(cycle);
                }
                _ => {}
            }
        }
        stack.pop();
        state[v] = 2;
        None
    }

    for i in 0..n {
        if state[i] == 0
            && let Some(c) = dfs(i, outs, &mut state, &mut stack)
        {
            return c;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parser::parse_command;
    use crate::foundation::error::ErrorKind;

    fn check(src: &str) -> Result<Validation, SemanticError> {
        let registry = FilterRegistry::builtin();
        let cmd = parse_command(src, &registry).unwrap();
        SemanticAnalyzer::new(&registry).validate(&cmd)
    }

    #[test]
    fn valid_graph_orders_labels() {
        let v = check("[0:v]scale=640:360[a];[a]hflip[b];[b][1:v]overlay[out]").unwrap();
        assert!(v.warnings.iter().all(|w| w.kind == ErrorKind::UnknownFilter));
        assert_eq!(v.label_order, vec!["0:v", "a", "b", "1:v", "out"]);
    }

    #[test]
    fn forward_references_are_allowed() {
        let v = check("[a]hflip[b];[0:v]null[a]").unwrap();
        assert_eq!(v.label_order, vec!["0:v", "a", "b"]);
    }

    #[test]
    fn duplicate_output_label() {
        assert_eq!(
            check("[0:v]null[a];[1:v]null[a]"),
            Err(SemanticError::DuplicateLabel {
                label: "a".to_owned()
            })
        );
    }

    #[test]
    fn undefined_input_label() {
        assert_eq!(
            check("[missing]null[a]"),
            Err(SemanticError::UndefinedLabel {
                label: "missing".to_owned()
            })
        );
    }

    #[test]
    fn implicit_labels_are_limited_to_declared_inputs() {
        assert_eq!(
            check("-i a.mp4 -filter_complex \"[1:v]null[v]\" -map [v] out.mp4"),
            Err(SemanticError::UndefinedLabel {
                label: "1:v".to_owned()
            })
        );
        let audio = "-i a.mp4 -filter_complex \"[0:a]volume=volume=0.5[a]\" -map [a] out.mp4";
        assert!(check(audio).is_ok());
    }

    #[test]
    fn cycles_report_their_path() {
        assert_eq!(
            check("[b]null[a];[a]null[b]"),
            Err(SemanticError::CircularDependency {
                cycle: vec!["b".to_owned(), "a".to_owned(), "b".to_owned()]
            })
        );
        assert!(matches!(
            check("[a]null[a]"),
            Err(SemanticError::CircularDependency { .. })
        ));
    }

    #[test]
    fn missing_required_param() {
        assert_eq!(
            check("[0:v]scale=1280[v]"),
            Err(SemanticError::MissingParam {
                filter: "scale".to_owned(),
                param: "height".to_owned()
            })
        );
    }

    #[test]
    fn positional_values_do_not_satisfy_required_params() {
        assert!(matches!(
            check("[0:v]scale=iw/2:ih/2[v]"),
            Err(SemanticError::MissingParam { .. })
        ));
    }

    #[test]
    fn numeric_and_enumerated_ranges() {
        assert!(matches!(
            check("[0:v]scale=width=99999:height=720[v]"),
            Err(SemanticError::ParamRange { ref param, .. }) if param == "width"
        ));
        assert!(matches!(
            check("[0:v]scale=width=iw:height=720[v]"),
            Err(SemanticError::ParamRange { .. })
        ));
        assert!(matches!(
            check("[0:v]scale=1280:720:flags=cubic[v]"),
            Err(SemanticError::ParamRange { ref param, .. }) if param == "flags"
        ));
        assert!(check("[0:v]scale=1280:720:flags=lanczos[v]").is_ok());
    }

    #[test]
    fn unknown_filters_warn_once_per_name() {
        let v = check("[0:v]frobnicate,frobnicate[v]").unwrap();
        assert_eq!(v.warnings.len(), 1);
        assert_eq!(v.warnings[0].kind, ErrorKind::UnknownFilter);
    }

    #[test]
    fn output_maps_must_resolve() {
        assert_eq!(
            check("-i a.mp4 -filter_complex \"[0:v]null[v]\" -map [w] out.mp4"),
            Err(SemanticError::OutputMapping {
                label: "w".to_owned(),
                path: "out.mp4".to_owned()
            })
        );
        let mixed = "-i a.mp4 -filter_complex \"[0:v]null[v]\" -map [v] -map 0:a:0 out.mp4";
        assert!(check(mixed).is_ok());
        assert!(matches!(
            check("-i a.mp4 -map 3 out.mp4"),
            Err(SemanticError::OutputMapping { .. })
        ));
    }

    #[test]
    fn unconsumed_outputs_warn_when_outputs_exist() {
        let v = check("-i a.mp4 -filter_complex \"[0:v]split[x];[0:v]null[v]\" -map [v] out.mp4")
            .unwrap();
        let unused: Vec<_> = v
            .warnings
            .iter()
            .filter(|w| w.kind == ErrorKind::UnusedLabel)
            .collect();
        assert_eq!(unused.len(), 1);
        assert!(unused[0].message.contains("'x'"));

        let bare = check("[0:v]null[x]").unwrap();
        assert!(!bare.warnings.iter().any(|w| w.kind == ErrorKind::UnusedLabel));
    }

    #[test]
    fn graph_only_validation_skips_filter_checks() {
        let registry = FilterRegistry::builtin();
        let cmd = parse_command("[0:v]scale_cuda=w=1:h=2[v]", &registry).unwrap();
        let v = SemanticAnalyzer::new(&registry).validate_graph(&cmd).unwrap();
        assert!(v.warnings.is_empty());
    }
}
