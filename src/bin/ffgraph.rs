use std::{io::Read as _, path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ffgraph::{
    AccelChoice, Analysis, AnalyzerConfig, Diagnostic, FfgraphError, FfmpegHwaccelProbe, Pipeline,
};

#[derive(Parser, Debug)]
#[command(name = "ffgraph", version)]
struct Cli {
    /// JSON configuration (filter extensions, accelerator profiles).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results and diagnostics as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log pipeline stages to stderr (`RUST_LOG` refines the filter).
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a command and print its canonical form.
    Check(CheckArgs),
    /// Validate, retarget to a hardware accelerator, and print the result.
    Rewrite(RewriteArgs),
    /// List the filters the analyzer knows.
    Filters,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// ffmpeg command line or bare filter graph; `-` reads it from stdin.
    #[arg(allow_hyphen_values = true)]
    command: String,
}

#[derive(Parser, Debug)]
struct RewriteArgs {
    /// ffmpeg command line or bare filter graph; `-` reads it from stdin.
    #[arg(allow_hyphen_values = true)]
    command: String,

    /// none, auto, cuda, qsv, vaapi or a configured profile name. Defaults to the config value.
    #[arg(long)]
    accel: Option<AccelChoice>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        init_tracing();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let diagnostic = match err.downcast::<FfgraphError>() {
                Ok(e) => e.diagnostic(),
                Err(other) => FfgraphError::Other(other).diagnostic(),
            };
            report_failure(&diagnostic, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ffgraph=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_failure(diagnostic: &Diagnostic, json: bool) {
    if json {
        let value = serde_json::json!({ "ok": false, "error": diagnostic });
        println!("{value}");
    } else {
        eprintln!("{}: {diagnostic}", diagnostic.severity);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AnalyzerConfig::from_json_file(path)?,
        None => AnalyzerConfig::default(),
    };
    let registry = config.build_registry();

    match &cli.cmd {
        Command::Check(args) => {
            let text = read_command(&args.command)?;
            let analysis = Pipeline::new(&registry).analyze(&text)?;
            print_analysis(&analysis, cli.json)
        }
        Command::Rewrite(args) => {
            let text = read_command(&args.command)?;
            let choice = args.accel.as_ref().unwrap_or(&config.accelerator);
            let probe = FfmpegHwaccelProbe::new();
            let profile = config.profile_for(choice, &probe)?;
            if profile.is_none() {
                tracing::info!(accel = %choice, "no accelerator selected; staying on the CPU");
            }
            let analysis = Pipeline::new(&registry)
                .with_optional_profile(profile)
                .analyze(&text)?;
            print_analysis(&analysis, cli.json)
        }
        Command::Filters => {
            if cli.json {
                let mut specs = serde_json::Map::new();
                for name in registry.names() {
                    if let Some(spec) = registry.get_spec(name) {
                        let value = serde_json::to_value(spec).context("serialize filter spec")?;
                        specs.insert(name.to_owned(), value);
                    }
                }
                println!("{}", serde_json::Value::Object(specs));
            } else {
                for name in registry.names() {
                    let required = registry
                        .get_spec(name)
                        .map(|spec| {
                            spec.required_params
                                .iter()
                                .map(String::as_str)
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    if required.is_empty() {
                        println!("{name}");
                    } else {
                        println!("{name} (requires {required})");
                    }
                }
            }
            Ok(())
        }
    }
}

fn read_command(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_owned());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("read command from stdin")?;
    Ok(text)
}

fn print_analysis(analysis: &Analysis, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({ "ok": true, "analysis": analysis });
        println!("{value}");
        return Ok(());
    }

    println!("{}", analysis.canonical);
    for warning in &analysis.warnings {
        eprintln!("{}: {warning}", warning.severity);
    }
    if let Some(report) = &analysis.rewrite {
        if !report.changed() {
            eprintln!("accelerator {}: nothing to retarget", report.profile);
            return Ok(());
        }
        eprintln!(
            "accelerator {}: {} filter(s) retargeted, {} software fallback(s), {} encoder change(s)",
            report.profile,
            report.retargeted.len(),
            report.fallbacks.len(),
            report.codec_changes
        );
    }
    Ok(())
}
