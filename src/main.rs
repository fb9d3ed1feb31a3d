use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use force_upload::config::{DEFAULT_BASE_URL, DEFAULT_BRANCH, DEFAULT_COMMIT_MESSAGE};
use force_upload::forge::gitlab::GitLabClient;
use force_upload::{Engine, PushOutcome, SyncConfig, SyncError, SyncReport, Token, TracingSink};

const LEGAL: &str = "\
gitlab-force-upload: force-upload a folder to a GitLab project

Licensed under the MIT License. Distributed WITHOUT ANY WARRANTY.
The upload DISCARDS any existing git history in the folder and OVERWRITES
the destination branch on the remote.

Built on libgit2 (git2), reqwest, clap, serde and tracing; see each crate
for its own license.";

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Force-upload a local folder to a GitLab project as a single commit", long_about = None)]
struct Cli {
    /// GitLab access token (api + write_repository scopes)
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true, required_unless_present = "legal")]
    token: Option<String>,

    /// GitLab URL to connect to
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Folder to upload
    #[arg(long, default_value = ".")]
    folder: PathBuf,

    /// Destination project path, e.g. group/project
    #[arg(long, required_unless_present = "legal")]
    dest: Option<String>,

    /// Commit message for the uploaded snapshot
    #[arg(long, default_value = DEFAULT_COMMIT_MESSAGE)]
    message: String,

    /// Branch to push when the project has no default branch yet
    #[arg(long, default_value = DEFAULT_BRANCH)]
    branch: String,

    /// Send approvals_before_merge=0 when creating a project (needed on some plan tiers)
    #[arg(long)]
    approvals_workaround: bool,

    /// Log more verbose
    #[arg(short, long)]
    verbose: bool,

    /// Print license and warranty information and exit
    #[arg(long)]
    legal: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.legal {
        println!("{}", LEGAL);
        return;
    }

    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(report) => print_report(&report),
        Err(err) => {
            let code = match err.downcast_ref::<SyncError>() {
                Some(sync) => {
                    eprintln!("❌ {} stage failed: {}", sync.stage(), sync);
                    sync.kind().exit_code()
                }
                None => {
                    eprintln!("❌ {:#}", err);
                    1
                }
            };
            std::process::exit(code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "force_upload=debug,gitlab_force_upload=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(cli: &Cli) -> Result<SyncReport> {
    let token = Token::new(cli.token.clone().context("Missing --token argument")?);
    if token.is_empty() {
        anyhow::bail!("--token must not be empty");
    }
    let dest = cli.dest.as_deref().context("Missing --dest argument")?;

    let config = SyncConfig::new(&cli.url, &cli.folder, dest)
        .context("Invalid arguments")?
        .with_message(cli.message.clone())
        .with_branch(&cli.branch)
        .context("Invalid --branch")?
        .with_approvals_workaround(cli.approvals_workaround)
        .with_verbose(cli.verbose);

    println!(
        "🚀 Uploading {} to {}{}",
        config.folder.display(),
        config.base_url,
        config.destination
    );

    let client = GitLabClient::new(&config.base_url, token.clone())
        .context("Failed to create HTTP client")?;
    let engine = Engine::standard(config.verbose);

    Ok(force_upload::run(
        &config,
        &token,
        &client,
        &engine,
        &TracingSink,
    )?)
}

fn print_report(report: &SyncReport) {
    if report.created {
        println!("✓ Created project {}", report.project);
    }
    if !report.fallbacks.is_empty() {
        let ops: Vec<String> = report.fallbacks.iter().map(|op| op.to_string()).collect();
        println!("ℹ️  git not available, used built-in {}", ops.join(", "));
    }
    match report.push {
        PushOutcome::Updated => println!(
            "✓ Pushed {} to {}",
            &report.commit[..report.commit.len().min(10)],
            report.branch
        ),
        PushOutcome::UpToDate => println!("✓ {} already up to date", report.branch),
    }
    println!("✅ Uploaded to {}", report.push_uri);
}
