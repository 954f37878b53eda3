mod adapters;
mod config;
mod core;
mod providers;

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{CliOverrides, Config, Credentials};
use crate::core::{DiffBundle, PullRequestInfo, RevisionRange};
use crate::providers::Service;

const EXIT_SENTINEL: &str = "exit";

#[derive(Parser)]
#[command(name = "prometh")]
#[command(about = "Prometh Review - AI Pull Request Reviewer Companion", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Slug of the repo")]
    repo: String,

    #[arg(long, visible_alias = "id", help = "ID for the pull request")]
    pull_request_id: u64,

    #[arg(long, help = "Host (or URL) of the Stash/Bitbucket server")]
    base_url: Option<String>,

    #[arg(short, long, help = "Project key")]
    project_key: Option<String>,

    #[arg(long, help = "LLM type [default: gpt-3.5-turbo]")]
    llm_type: Option<String>,

    #[arg(long, help = "URL for a self-hosted LLM. Not required when using OpenAI")]
    llm_url: Option<String>,

    #[arg(
        short = 'c',
        long,
        help = "Lines to include before and after a changed line [default: 10]"
    )]
    nb_context_lines: Option<u32>,

    #[arg(short = 'd', long, help = "Show diff only, no AI checks")]
    show_diff_only: bool,

    #[arg(short, long, help = "Continue to chat about the PR with the AI")]
    interactive: bool,

    #[arg(
        short,
        long,
        help = "Also include newly added (whole) files in the analysis"
    )]
    exhaustive_analysis: bool,

    #[arg(long, help = "Print the prompt sent to the AI")]
    show_prompt: bool,

    #[arg(short = 'x', long, num_args = 1.., help = "File types excluded from the analysis")]
    exclude_file_types: Option<Vec<String>>,

    #[arg(short, long, value_enum, help = "Where the PR lives [default: stash]")]
    service: Option<Service>,

    #[arg(long, help = "Read defaults from this file instead of the usual locations")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            base_url: self.base_url.clone(),
            project_key: self.project_key.clone(),
            llm_type: self.llm_type.clone(),
            llm_url: self.llm_url.clone(),
            nb_context_lines: self.nb_context_lines,
            exclude_file_types: self.exclude_file_types.clone(),
            service: self.service,
            exhaustive_analysis: self.exhaustive_analysis,
            interactive: self.interactive,
            show_prompt: self.show_prompt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable defaults file: {:#}", e);
            Config::default()
        }),
    };
    config.merge_with_cli(cli.overrides());
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let credentials = Credentials::from_env();

    if cli.show_diff_only {
        let (_, bundle) = fetch_pr_diff(&cli.repo, cli.pull_request_id, &config, &credentials).await?;
        println!("Showing only the git diff output:\n");
        println!("{}", bundle.render());
        return Ok(());
    }

    review_command(&cli.repo, cli.pull_request_id, config, credentials).await
}

async fn review_command(
    repo: &str,
    pull_request_id: u64,
    config: Config,
    credentials: Credentials,
) -> Result<()> {
    // Resolve the backend first so a missing key or URL fails before any request.
    let adapter = adapters::llm::create_adapter(&config.model_config(&credentials))?;
    info!(
        "Using model {} ({:?})",
        adapter.model_name(),
        adapters::llm::ModelKind::for_model(adapter.model_name())
    );

    let (info, bundle) = fetch_pr_diff(repo, pull_request_id, &config, &credentials).await?;

    let conversation = core::PromptBuilder::new(config.prompt_config()).build(&info, &bundle);
    if config.show_prompt {
        println!("{}\n", conversation.render());
    }

    let mut session = core::ReviewSession::new(adapter, conversation);
    let review = session.start().await?;
    debug!("Review produced by {}", review.model);

    if let Some(usage) = review.usage {
        println!("Usage Metrics");
        println!("{:>18}  {}", "completion_tokens", usage.completion_tokens);
        println!("{:>18}  {}", "prompt_tokens", usage.prompt_tokens);
        println!("{:>18}  {}", "total_tokens", usage.total_tokens);
        println!();
    }

    println!("------ Analysis: ------\n");
    println!("{}\n", review.content);

    if config.interactive {
        println!("------ Interactive chatting: ------\n");
        println!("You can chat with the AI about the PR");
        println!("Press `CTRL+C` or type '{EXIT_SENTINEL}' to exit the interactive chatting\n");

        let input = BufReader::new(tokio::io::stdin());
        interactive_chat(&mut session, input, interrupted()).await?;
    } else {
        session.close();
    }

    Ok(())
}

async fn fetch_pr_diff(
    repo: &str,
    pull_request_id: u64,
    config: &Config,
    credentials: &Credentials,
) -> Result<(PullRequestInfo, DiffBundle)> {
    let provider = providers::create_provider(config.service, &config.provider_config(credentials))?;
    let pr = config.pull_request_ref(repo, pull_request_id);

    info!("Fetching PR #{} of {}/{}", pr.id, pr.project_key, pr.repo_slug);
    let (info, range) = provider.fetch(&pr).await?;
    print_info(&info, &range);

    let git = core::GitIntegration::new(".")?;
    if let Ok(branch) = git.get_current_branch() {
        debug!("Current branch: {}", branch);
    }
    if let Ok(Some(remote)) = git.get_remote_url() {
        debug!("Remote URL: {}", remote);
    }

    let bundle = git.collect(&range, &config.diff_options())?;
    if bundle.body.is_empty() {
        info!("No file modifications in the PR. But new and deleted files might be present.");
    }

    Ok((info, bundle))
}

fn print_info(info: &PullRequestInfo, range: &RevisionRange) {
    println!("Info");
    println!("{:>14}  {}", "to_commit", range.to);
    println!("{:>14}  {}", "from_commit", range.from);
    println!("{:>14}  {}", "pr_title", info.title);
    println!("{:>14}  {}", "pr_description", info.description);
    println!("{:>14}  {}", "pr_link", info.link);
    println!();
}

/// Resolves on the first Ctrl+C. Never resolves if no handler can be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Chat until the exit sentinel, end of input or `interrupt` resolves.
///
/// The interrupt future lives across turns, so a Ctrl+C pressed while a
/// reply is pending ends the chat before the next prompt is read.
async fn interactive_chat<R, I>(
    session: &mut core::ReviewSession,
    input: R,
    interrupt: I,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(interrupt);
    let mut turns = 0;

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input == EXIT_SENTINEL {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let reply = session
            .turn(input)
            .await
            .context("Interactive session ended")?;
        turns += 1;
        println!("\nAI: {}\n", reply.content);
    }

    session.close();
    info!(
        "Chat {:?} after {} turns, {} messages",
        session.state(),
        turns,
        session.conversation().len()
    );
    Ok(turns)
}
