use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mml")]
#[command(about = "MML script runner for patching XML game files")]
pub(crate) struct Cli {
    #[arg(long = "config", global = true)]
    pub(crate) config: Option<String>,
    #[arg(long = "scripts-dir", global = true)]
    pub(crate) scripts_dir: Option<String>,
    #[arg(long = "files-dir", global = true)]
    pub(crate) files_dir: Option<String>,
    #[arg(long = "media-dir", global = true)]
    pub(crate) media_dir: Option<String>,
    #[arg(long = "verbose", short = 'v', global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Run a script from the scripts directory.
    Run(RunArgs),
    /// Run a standalone .mml file; includes resolve next to it.
    Exec(FileArgs),
    /// Lex and parse a file without evaluating it.
    Check(FileArgs),
    /// Print the token stream of a file as JSON.
    Tokens(FileArgs),
    /// List scripts in the scripts directory.
    List,
    /// Create a new script skeleton.
    New(NewArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    pub(crate) name: String,
}

#[derive(Debug, Args)]
pub(crate) struct FileArgs {
    pub(crate) file: String,
}

#[derive(Debug, Args)]
pub(crate) struct NewArgs {
    pub(crate) name: String,
    #[arg(long = "description")]
    pub(crate) description: Option<String>,
}
