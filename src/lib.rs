//! Compile a hand-authored contacts source file into a model, cache
//! the compiled model beside the source, and render filtered reports.
//!
//! The pipeline is strictly sequential: resolve the cache (load or
//! rebuild), compile the query predicate, resolve the reference place,
//! dispatch the report.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, FromArgMatches};

pub mod cli;
pub mod domain;
pub mod error;
pub mod reports;
pub mod services;
pub mod source;

use cli::Cli;
use error::{Error, Result};
use reports::ReportCtx;

pub const PROG_NAME: &str = "six";

/// Names the source file; required.
pub const SOURCE_VAR: &str = "SIX_SOURCE";

pub fn run(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let args: Vec<OsString> = args.into_iter().collect();
    let lossy: Vec<String> = args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    // The report is picked out of the raw arguments first, so that it
    // can register its own options before the real parse happens.
    let entry = reports::find(&reports::requested_name(&lossy)?)?;
    let mut cmd = Cli::command();
    if let Some(register) = entry.register {
        cmd = register(cmd);
    }
    let matches = match cmd.try_get_matches_from(&args) {
        Ok(matches) => matches,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return Ok(());
        }
        Err(err) => return Err(Error::argument(render_clap_error(&err))),
    };
    let cli = Cli::from_arg_matches(&matches)
        .map_err(|err| Error::argument(render_clap_error(&err)))?;

    let source_path = source_path_from_env()?;
    let model = services::cache::obtain_model(&source_path, cli.force)?;

    let predicate = if cli.query.is_empty() {
        None
    } else {
        Some(
            services::query::compile(&model, &cli.query)
                .map_err(|e| Error::argument(e.to_string()))?,
        )
    };
    let local = services::local::resolve(cli.local.as_deref(), &model)?;
    let mut out = services::output::writer(cli.output.as_deref())?;

    let mut ctx = ReportCtx {
        matches: &matches,
        model: &model,
        predicate: predicate.as_ref(),
        local,
        out: out.as_mut(),
    };
    (entry.run)(&mut ctx)?;
    Ok(())
}

fn source_path_from_env() -> Result<PathBuf> {
    let value = match env::var(SOURCE_VAR) {
        Ok(value) if !value.is_empty() => value,
        _ => return Err(Error::environment(SOURCE_VAR, "not set")),
    };
    let path = PathBuf::from(&value);
    if !path.is_file() {
        return Err(Error::environment(
            SOURCE_VAR,
            format!("no such file \"{value}\""),
        ));
    }
    Ok(path)
}

/// First line of a clap error, without the "error: " prefix, so it
/// fits the uniform `six: <message>` presentation.
fn render_clap_error(err: &clap::Error) -> String {
    let text = err.to_string();
    let first = text.lines().next().unwrap_or("invalid arguments");
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}
