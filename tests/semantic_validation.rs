use ffgraph::{
    ErrorKind, FfgraphError, FilterRegistry, FilterSpec, ParsedCommand, Pipeline,
    SemanticAnalyzer, SemanticError, Severity,
};

#[derive(serde::Deserialize)]
struct Case {
    command: String,
    expect: String,
}

#[test]
fn fixture_cases_report_expected_codes() {
    let cases: Vec<Case> =
        serde_json::from_str(include_str!("data/semantic_cases.json")).unwrap();
    let registry = FilterRegistry::builtin();
    let pipeline = Pipeline::new(&registry);
    for case in cases {
        let got = match pipeline.analyze(&case.command) {
            Ok(_) => "OK".to_owned(),
            Err(e) => e.kind().code().to_owned(),
        };
        assert_eq!(got, case.expect, "{:?}", case.command);
    }
}

#[test]
fn failures_carry_severity_and_suggestion() {
    let registry = FilterRegistry::builtin();
    let pipeline = Pipeline::new(&registry);

    let lex = pipeline.analyze("a|b").unwrap_err().diagnostic();
    assert_eq!(lex.severity, Severity::Critical);
    assert!(!lex.suggestion.is_empty());

    let dup = pipeline
        .analyze("[0:v]null[a];[0:v]null[a]")
        .unwrap_err()
        .diagnostic();
    assert_eq!(dup.kind, ErrorKind::DuplicateLabel);
    assert_eq!(dup.severity, Severity::Error);
    assert!(dup.suggestion.contains("[a]"));
}

#[test]
fn unknown_filters_are_warnings_not_failures() {
    let registry = FilterRegistry::builtin();
    let analysis = Pipeline::new(&registry)
        .analyze("[0:v]frobnicate=level=3[f]")
        .unwrap();
    assert_eq!(analysis.warnings.len(), 1);
    let w = &analysis.warnings[0];
    assert_eq!(w.kind, ErrorKind::UnknownFilter);
    assert_eq!(w.severity, Severity::Warning);
    assert!(w.message.contains("frobnicate"));
}

#[test]
fn registered_extensions_are_enforced() {
    let mut registry = FilterRegistry::builtin();
    registry.register(
        "drawbox",
        FilterSpec::new(["w", "h"]).numeric("t", 0.0, 100.0),
    );
    let pipeline = Pipeline::new(&registry);
    assert!(pipeline.analyze("[0:v]drawbox=10:20[b]").is_ok());
    let err = pipeline.analyze("[0:v]drawbox=10:20:t=500[b]").unwrap_err();
    assert!(matches!(
        err,
        FfgraphError::Semantic(SemanticError::ParamRange { ref param, ref expected, .. })
            if param == "t" && expected == "[0, 100]"
    ));
}

#[test]
fn validation_is_stateless_across_calls() {
    let registry = FilterRegistry::builtin();
    let analyzer = SemanticAnalyzer::new(&registry);
    let pipeline = Pipeline::new(&registry);
    let first = pipeline.parse("[0:v]null[a]").unwrap();
    let second = pipeline.parse("[0:v]null[a];[a]null[b]").unwrap();
    assert!(analyzer.validate(&first).is_ok());
    assert!(analyzer.validate(&second).is_ok());
    assert!(analyzer.validate(&first).is_ok());
}

#[test]
fn independent_pipelines_run_concurrently() {
    let registry = FilterRegistry::builtin();
    let outputs: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = &registry;
                s.spawn(move || {
                    let text = format!("[0:v]scale={}:720[v{i}]", 640 + i);
                    Pipeline::new(registry).analyze(&text).unwrap().canonical
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(
        outputs[3],
        "-filter_complex \"[0:v]scale=width=643:height=720[v3]\""
    );
}

#[test]
fn label_order_is_topological() {
    let registry = FilterRegistry::builtin();
    let cmd: ParsedCommand = Pipeline::new(&registry)
        .parse("[mid]hflip[out];[0:v]scale=640:360[mid]")
        .unwrap();
    let v = SemanticAnalyzer::new(&registry).validate(&cmd).unwrap();
    assert_eq!(v.label_order, vec!["0:v", "mid", "out"]);
}
