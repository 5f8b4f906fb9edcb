use anyhow::Result;
use clap::{Parser, Subcommand};
use snoo_sync::cli::{self, Workspace};
use snoo_sync::config::SyncConfig;
use snoo_sync::telemetry;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Local reddit object store and comment tree inspector")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a saved API response (thing, listing, comments page or things response)
    Import { file: PathBuf },
    /// Print the stored comment threads of a post
    Thread {
        /// Post identifier, without the t3_ prefix
        post: String,
        /// Display depth; deeper branches end in a continuation row
        #[arg(long)]
        depth: Option<usize>,
        /// Comment identifier to fold; may be repeated
        #[arg(long = "collapse")]
        collapse: Vec<String>,
    },
    /// Print one stored record by fullname, e.g. t1_abc123
    Show { fullname: String },
    /// Evict expired records
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = SyncConfig::from_env()?;
    telemetry::init_tracing(Some(&config.paths.logs_dir));

    let workspace = Workspace::open(config)?;
    tracing::info!(
        db = %workspace.config.paths.db_path.display(),
        "workspace ready"
    );

    match args.command {
        Command::Import { file } => cli::import(&workspace, &file).await,
        Command::Thread {
            post,
            depth,
            collapse,
        } => cli::print_thread(&workspace, &post, depth, &collapse),
        Command::Show { fullname } => cli::show(&workspace, &fullname),
        Command::Sweep => cli::sweep(&workspace),
    }
}
