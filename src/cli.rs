use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "six",
    version,
    about = "Text-compiled database of personal contacts",
    after_help = "The source file is named by the SIX_SOURCE environment variable.\n\
                  Remaining arguments form a selection expression: bare words match\n\
                  names, =KEYWORD, in:PLACE and work:ORG match attributes, combined\n\
                  with -and, -or, -not and parentheses."
)]
pub struct Cli {
    #[arg(
        short = 'r',
        long = "report",
        default_value = crate::reports::DEFAULT_REPORT,
        help = "Report to render"
    )]
    pub report: String,

    #[arg(
        short = 'l',
        long = "local",
        value_name = "PLACE",
        help = "Reference place for relative phone numbers (overrides SIX_LOCAL)"
    )]
    pub local: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Write the report to PATH instead of standard output"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'f',
        long = "force",
        help = "Recompile the source even if the cached model is fresh"
    )]
    pub force: bool,

    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "QUERY",
        help = "Selection expression; empty selects everything"
    )]
    pub query: Vec<String>,
}
