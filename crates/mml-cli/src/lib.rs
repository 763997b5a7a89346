use std::ffi::OsString;
use std::sync::Arc;

use clap::Parser;
use mml_core::MmlError;
use mml_parser::{lex, parse};
use mml_runtime::{run_script, RunOptions, RunReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod config;
mod error_map;
mod source_loader;
mod store;

pub(crate) use cli_args::{Cli, FileArgs, Mode, NewArgs, RunArgs};
pub(crate) use config::{load_config, CliConfig};
pub(crate) use error_map::{
    emit_error, map_cli_config_invalid, map_cli_config_read, map_cli_json, map_cli_source_path,
    map_cli_source_read, map_cli_source_scan, map_cli_source_write, map_store_read,
    map_store_write,
};
pub(crate) use source_loader::{
    absolute_path, create_script, list_scripts, read_script_file, resolve_script_file,
    resolve_scripts_dir, script_exists, DirSourceResolver,
};
pub(crate) use store::FsDocumentStore;

const DEFAULT_LOG_FILTER: &str = "warn,mml_runtime=info,mml_cli=info";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

// Logs go to stderr; stdout carries only the RESULT protocol.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { DEFAULT_LOG_FILTER };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<i32, MmlError> {
    let config = load_config(cli.config.as_deref())?.apply_overrides(&cli);
    match cli.command {
        Mode::Run(args) => run_named(&config, args),
        Mode::Exec(args) => run_file(&config, args),
        Mode::Check(args) => check_file(args),
        Mode::Tokens(args) => print_tokens(args),
        Mode::List => print_scripts(&config),
        Mode::New(args) => new_script(&config, args),
    }
}

fn run_named(config: &CliConfig, args: RunArgs) -> Result<i32, MmlError> {
    let scripts_root = resolve_scripts_dir(&config.scripts_dir)?;
    if !script_exists(&scripts_root, &args.name) {
        return Err(MmlError::new(
            "CLI_SCRIPT_NOT_FOUND",
            format!(
                "Script '{}' not found under {}",
                args.name,
                scripts_root.display()
            ),
        ));
    }
    execute(config, DirSourceResolver::for_script(&scripts_root, &args.name))
}

fn run_file(config: &CliConfig, args: FileArgs) -> Result<i32, MmlError> {
    let file = resolve_script_file(&args.file)?;
    execute(config, DirSourceResolver::for_file(&file))
}

fn execute(config: &CliConfig, resolver: DirSourceResolver) -> Result<i32, MmlError> {
    let entry = resolver.entry_name().to_string();
    let store = FsDocumentStore::new(&config.files_dir, &config.media_dir);
    info!(
        script = %entry,
        files_dir = %config.files_dir,
        media_dir = %config.media_dir,
        "run"
    );
    let options = RunOptions::new(Arc::new(resolver), Arc::new(store));
    let report = run_script(&entry, &options)?;
    emit_report(&report);
    Ok(0)
}

fn emit_report(report: &RunReport) {
    println!("RESULT:OK");
    for diagnostic in &report.diagnostics {
        println!("DIAGNOSTIC:{}", diagnostic);
    }
}

fn check_file(args: FileArgs) -> Result<i32, MmlError> {
    let source = read_script_file(&args.file)?;
    let tokens = lex(&source)?;
    let script = parse(&tokens)?;
    println!("RESULT:OK");
    println!("TOKENS:{}", tokens.len());
    println!("STATEMENTS:{}", script.body.len());
    Ok(0)
}

fn print_tokens(args: FileArgs) -> Result<i32, MmlError> {
    let source = read_script_file(&args.file)?;
    let tokens = lex(&source)?;
    let payload = serde_json::to_string(&tokens).map_err(map_cli_json)?;
    println!("RESULT:OK");
    println!("TOKENS_JSON:{}", payload);
    Ok(0)
}

fn print_scripts(config: &CliConfig) -> Result<i32, MmlError> {
    let scripts_root = resolve_scripts_dir(&config.scripts_dir)?;
    let scripts = list_scripts(&scripts_root)?;
    println!("RESULT:OK");
    for script in scripts {
        let description = serde_json::to_string(&script.description).map_err(map_cli_json)?;
        println!("SCRIPT:{}|{}", script.name, description);
    }
    Ok(0)
}

fn new_script(config: &CliConfig, args: NewArgs) -> Result<i32, MmlError> {
    let scripts_root = absolute_path(&config.scripts_dir)?;
    let entry = create_script(&scripts_root, &args.name, args.description.as_deref())?;
    info!(entry = %entry.display(), "script created");
    println!("RESULT:OK");
    println!("CREATED:{}", entry.display());
    Ok(0)
}

#[cfg(test)]
mod cli_test_support;
#[cfg(test)]
mod tests;
