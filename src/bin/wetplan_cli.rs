use serde::Serialize;
use std::env;
use std::fs;
use wetplan::compiler::{self, CompiledPlan};
use wetplan::config::ExperimentConfig;
use wetplan::dilution;
use wetplan::handler::{self, CommandLog, replay};

fn usage() {
    eprintln!(
        "Usage:\n  \
  wetplan_cli --version\n  \
  wetplan_cli capabilities\n  \
  wetplan_cli compile '<config-json>'\n  \
  wetplan_cli gradient '<config-json>'\n  \
  wetplan_cli plan-json '<config-json>'\n  \
  wetplan_cli table '<config-json>'\n  \
  wetplan_cli layout REPLICATES\n\n  \
  Tip: pass @file.json instead of inline JSON"
    );
}

fn load_json_arg(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("Could not read JSON file '{path}': {e}"))
    } else {
        Ok(value.to_string())
    }
}

fn load_config_arg(value: &str) -> Result<ExperimentConfig, String> {
    let json = load_json_arg(value)?;
    serde_json::from_str(&json).map_err(|e| format!("Invalid config JSON: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn print_transcript(compiled: &CompiledPlan) {
    for warning in &compiled.warnings {
        eprintln!("WARNING: {warning}");
    }
    for message in &compiled.messages {
        println!("# {message}");
    }
    let mut log = CommandLog::new();
    replay(&compiled.plan, &mut log);
    for line in log.lines() {
        println!("{line}");
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        return Err("Missing command".to_string());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("wetplan {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let command = &args[1];
    match command.as_str() {
        "capabilities" => print_json(&handler::capabilities()),
        "compile" | "gradient" | "plan-json" | "table" => {
            if args.len() <= 2 {
                usage();
                return Err(format!("Missing config JSON for {command}"));
            }
            let config = load_config_arg(&args[2])?;
            match command.as_str() {
                "compile" => {
                    let compiled = compiler::compile(&config).map_err(|e| e.to_string())?;
                    print_transcript(&compiled);
                    Ok(())
                }
                "gradient" => {
                    let compiled =
                        compiler::compile_gradient(&config).map_err(|e| e.to_string())?;
                    print_transcript(&compiled);
                    Ok(())
                }
                "plan-json" => {
                    let compiled = compiler::compile(&config).map_err(|e| e.to_string())?;
                    print_json(&compiled)
                }
                "table" => {
                    let rows = dilution::compute_dilutions(
                        config.stock_conc_um,
                        config.total_vol_ul,
                        &config.targets_um,
                    );
                    for warning in
                        dilution::unachievable_targets(&rows, config.total_vol_ul)
                    {
                        eprintln!("WARNING: {warning}");
                    }
                    dilution::write_csv(&rows, std::io::stdout()).map_err(|e| e.to_string())
                }
                _ => unreachable!(),
            }
        }
        "layout" => {
            if args.len() <= 2 {
                usage();
                return Err("Missing replicate count for layout".to_string());
            }
            let replicates: u32 = args[2]
                .parse()
                .map_err(|e| format!("Invalid replicate count '{}': {e}", args[2]))?;
            let layout = wetplan::allocation::resolve(replicates).map_err(|e| e.to_string())?;
            print_json(&layout)
        }
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}
