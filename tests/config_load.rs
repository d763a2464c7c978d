use ffgraph::{AccelChoice, AnalyzerConfig, Backend, FfgraphError, Pipeline, StaticProbe};

fn fixture_path() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/config.json").to_owned()
}

#[test]
fn fixture_loads_from_file_and_string_alike() {
    let from_file = AnalyzerConfig::from_json_file(fixture_path()).unwrap();
    let from_str = AnalyzerConfig::from_json_str(include_str!("data/config.json")).unwrap();
    assert_eq!(from_file, from_str);
    assert_eq!(from_file.accelerator, AccelChoice::Auto);
    assert_eq!(from_file.profiles.len(), 1);
}

#[test]
fn configured_filters_reach_the_analyzer() {
    let cfg = AnalyzerConfig::from_json_file(fixture_path()).unwrap();
    let registry = cfg.build_registry();
    let pipeline = Pipeline::new(&registry);

    assert!(pipeline.analyze("[0:v]drawbox=10:20:color=red[b]").is_ok());
    assert!(matches!(
        pipeline.analyze("[0:v]drawbox=10:20:color=mauve[b]"),
        Err(FfgraphError::Semantic(_))
    ));
    assert!(matches!(
        pipeline.analyze("[0:v]drawbox=w=10[b]"),
        Err(FfgraphError::Semantic(_))
    ));
}

#[test]
fn auto_uses_the_configured_profile_for_the_probed_backend() {
    let cfg = AnalyzerConfig::from_json_file(fixture_path()).unwrap();
    let registry = cfg.build_registry();

    let profile = cfg
        .resolve_profile(&StaticProbe::new([Backend::Cuda, Backend::Qsv]))
        .unwrap()
        .unwrap();
    assert_eq!(profile.video_codec, "hevc_nvenc");

    let analysis = Pipeline::new(&registry)
        .with_profile(profile)
        .analyze("-i a.mp4 -filter_complex \"[0:v]scale=1280:720[v]\" -map [v] -c:v libx264 out.mp4")
        .unwrap();
    assert_eq!(
        analysis.canonical,
        "-hwaccel cuda -i a.mp4 -filter_complex \"[0:v]scale_npp=w=1280:h=720[v]\" -map [v] -c:v hevc_nvenc out.mp4"
    );

    let qsv_only = cfg
        .resolve_profile(&StaticProbe::new([Backend::Qsv]))
        .unwrap()
        .unwrap();
    assert_eq!(qsv_only, Backend::Qsv.profile());
}

#[test]
fn unreadable_or_invalid_files_fail_cleanly() {
    let missing = AnalyzerConfig::from_json_file("tests/data/does_not_exist.json").unwrap_err();
    assert!(missing.to_string().contains("does_not_exist.json"));

    let dir = std::path::PathBuf::from("target").join("config_load");
    std::fs::create_dir_all(&dir).unwrap();
    let bad = dir.join("bad.json");
    std::fs::write(&bad, r#"{"accelerator": "metal"}"#).unwrap();
    let err = AnalyzerConfig::from_json_file(&bad).unwrap_err();
    assert!(
        matches!(err, FfgraphError::Config(ref msg) if msg.contains("bad.json") && msg.contains("metal"))
    );
}
