use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use reposcout_core::config::{Config, resolve_config_path};
use reposcout_core::session::repo_name_from_url;
use reposcout_core::{LoadSummary, Session};
use reposcout_index::format::render_amalgamation;
use reposcout_index::indexer::IndexReport;
use reposcout_index::languages::detect_language;
use reposcout_llm::openai::OpenAiEmbeddings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(
    name = "repo",
    version,
    about = "Index source repositories and answer semantic queries over their structure"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a repository and make it active
    Index {
        /// Repository name or clone URL
        repo: String,
        /// Working copy location (defaults to the repo cache)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Query an indexed repository
    Search {
        /// Repository name or clone URL
        repo: String,
        query: String,
        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Load a repository, then answer one query per stdin line until EOF
    Repl {
        /// Repository name or clone URL
        repo: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the metadata amalgamation of a single source file
    Extract { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.log_file.as_deref());

    if let Command::Extract { file } = &cli.command {
        println!("{}", extract_file(file).await?);
        return Ok(());
    }

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let session = Session::from_config(config)?.with_shutdown(shutdown_rx);

    match cli.command {
        Command::Index { repo, path } => {
            let summary = load(&session, &repo, path.as_deref()).await?;
            print_report(&summary.report);
            println!("{summary}");
        }
        Command::Search { repo, query, k } => {
            let k = k.unwrap_or(session.config().search.top_k);
            let result = session
                .search_repository(&repo_name_from_url(&repo), &query, k)
                .await?;
            println!("{result}");
        }
        Command::Repl { repo, path } => {
            let summary = load(&session, &repo, path.as_deref()).await?;
            println!("{summary}");
            run_repl(&session).await?;
        }
        // handled before configuration is loaded
        Command::Extract { .. } => {}
    }

    Ok(())
}

async fn load(
    session: &Session<OpenAiEmbeddings>,
    repo: &str,
    path: Option<&Path>,
) -> anyhow::Result<LoadSummary> {
    let name = repo_name_from_url(repo);
    session
        .load_repository(&name, path)
        .await
        .with_context(|| format!("failed to load repository {name}"))
}

async fn run_repl(session: &Session<OpenAiEmbeddings>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        match session.search(query).await {
            Ok(result) => println!("{result}"),
            Err(e) => eprintln!("search failed: {e}"),
        }
    }
    Ok(())
}

async fn extract_file(file: &Path) -> anyhow::Result<String> {
    let lang = detect_language(file)
        .with_context(|| format!("unsupported file type: {}", file.display()))?;
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let record = lang.extractor().extract(&content)?;
    let file_name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(render_amalgamation(
        &file_name,
        &file.display().to_string(),
        &record,
    ))
}

fn print_report(report: &IndexReport) {
    println!(
        "files: {} scanned, {} indexed, {} empty, {} failed extraction",
        report.files_scanned, report.files_indexed, report.files_empty, report.extraction_failures
    );
    println!(
        "chunks: {} embedded, {} already indexed, {} failed ({} ms)",
        report.chunks_created, report.chunks_skipped, report.chunks_failed, report.duration_ms
    );
    for error in &report.errors {
        eprintln!("  {error}");
    }
}

fn init_subscriber(log_file: Option<&Path>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(path) = log_file {
        match std::fs::File::create(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .init();
                return;
            }
            Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_with_k() {
        let cli = Cli::try_parse_from(["repo", "search", "flask", "routing", "-k", "5"]).unwrap();
        match cli.command {
            Command::Search { repo, query, k } => {
                assert_eq!(repo, "flask");
                assert_eq!(query, "routing");
                assert_eq!(k, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["repo", "index", "demo", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("custom.toml")));
    }

    #[tokio::test]
    async fn extract_renders_python_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.py");
        std::fs::write(&path, "def add(a, b):\n    return a + b\n\nMAX = 10\n").unwrap();

        let out = extract_file(&path).await.unwrap();
        assert!(out.starts_with("##calc.py("));
        assert!(out.contains("add(a, b)"));
        assert!(out.contains("MAX=10"));
    }

    #[tokio::test]
    async fn extract_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(extract_file(&path).await.is_err());
    }
}
