//! Command implementations.
//!
//! Each command returns its rendered output; `main` prints it. Errors are
//! reported through `anyhow` at this layer.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::prompt::PromptSet;
use crate::chat::{ChatReply, ConversationTurn, InboundRequest, Orchestrator};
use crate::cli::output::{OutputFormat, format_knowledge_bases, format_providers};
use crate::cli::parser::{Cli, Commands, KbCommands, ProviderCommands};
use crate::rag::SqliteStore;

/// Arguments of the `chat` command.
struct ChatArgs<'a> {
    message: &'a str,
    kb: Option<i64>,
    model: &'a str,
    family: &'a str,
    stream: bool,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Serve { host, port } => cmd_serve(&db_path, host, *port),
        Commands::Kb(sub) => execute_kb(sub, &db_path, format),
        Commands::Provider(sub) => execute_provider(sub, &db_path, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        Commands::Chat {
            message,
            kb,
            model,
            family,
            stream,
        } => cmd_chat(
            &db_path,
            &ChatArgs {
                message,
                kb: *kb,
                model,
                family,
                stream: *stream,
            },
            format,
        ),
    }
}

fn execute_kb(sub: &KbCommands, db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    match sub {
        KbCommands::Create { name, provider } => {
            let kb = store.create_knowledge_base(name, *provider)?;
            match format {
                OutputFormat::Text => Ok(format!(
                    "Created knowledge base '{}' (id {}).\n",
                    kb.name, kb.id
                )),
                OutputFormat::Json => Ok(format.to_json(&kb)),
            }
        }
        KbCommands::List => Ok(format_knowledge_bases(
            &store.list_knowledge_bases()?,
            format,
        )),
    }
}

fn execute_provider(
    sub: &ProviderCommands,
    db_path: &Path,
    format: OutputFormat,
) -> Result<String> {
    let store = open_store(db_path)?;
    match sub {
        ProviderCommands::Add {
            name,
            model,
            base_url,
        } => {
            if model.trim().is_empty() {
                bail!("--model must not be empty");
            }
            let provider = store.add_embedding_provider(name, model, base_url.as_deref())?;
            match format {
                OutputFormat::Text => Ok(format!(
                    "Added embedding provider '{}' (id {}).\n",
                    provider.name, provider.id
                )),
                OutputFormat::Json => Ok(format.to_json(&provider)),
            }
        }
        ProviderCommands::List => Ok(format_providers(
            &store.list_embedding_providers()?,
            format,
        )),
    }
}

/// Opens an existing, initialized store.
fn open_store(db_path: &Path) -> Result<SqliteStore> {
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run `ragline init` first.",
            db_path.display()
        );
    }
    let store = SqliteStore::open(db_path)?;
    if !store.is_initialized()? {
        bail!("Database is not initialized. Run `ragline init` first.");
    }
    Ok(store)
}

fn cmd_init(db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        bail!("Database already exists. Use --force to reinitialize.");
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).context("Failed to create directory")?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
    }

    let store = SqliteStore::open(db_path)?;
    store.init()?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Initialized ragline database at: {}\n",
            db_path.display()
        )),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "success": true,
            "path": db_path.to_string_lossy(),
            "force": force
        }))),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .context("Could not determine home directory for default prompt path")?;

    let written =
        PromptSet::write_defaults(&target_dir).context("Failed to write prompt templates")?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str("  ");
                output.push_str(name);
                output.push('\n');
            }
            output.push_str("\nSet RAGLINE_PROMPT_DIR to this directory to use them.\n");
            Ok(output)
        }
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "directory": target_dir.to_string_lossy(),
            "written": written
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            "count": written.len()
        }))),
    }
}

fn build_orchestrator(db_path: &Path) -> Result<Orchestrator> {
    let store = Arc::new(open_store(db_path)?);
    let config = AgentConfig::from_env()?;
    debug!(
        max_rounds = config.max_rounds,
        top_k = config.retrieval_top_k,
        reranker = config.reranker.is_enabled(),
        "configuration loaded"
    );
    Ok(Orchestrator::from_config(config, store)?)
}

fn cmd_serve(db_path: &Path, host: &str, port: u16) -> Result<String> {
    let orchestrator = Arc::new(build_orchestrator(db_path)?);
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(crate::server::serve(orchestrator, host, port))?;
    Ok(String::new())
}

fn cmd_chat(db_path: &Path, args: &ChatArgs<'_>, format: OutputFormat) -> Result<String> {
    let orchestrator = build_orchestrator(db_path)?;
    let request = InboundRequest {
        knowledgebase_id: args.kb,
        model: args.model.to_string(),
        family: args.family.to_string(),
        messages: vec![ConversationTurn::user(args.message)],
        stream: args.stream,
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(chat_once(&orchestrator, request, format))
}

async fn chat_once(
    orchestrator: &Orchestrator,
    request: InboundRequest,
    format: OutputFormat,
) -> Result<String> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match orchestrator.respond(request, cancel).await? {
        ChatReply::Complete(body) => match format {
            OutputFormat::Text => {
                let mut out = body.message.content.clone();
                out.push('\n');
                if let Some(docs) = &body.message.relevant_docs {
                    let _ = writeln!(out, "\n[{} relevant document(s)]", docs.len());
                }
                Ok(out)
            }
            OutputFormat::Json => Ok(format.to_json(&body)),
        },
        ChatReply::Stream(mut events) => {
            // Events go out as they arrive; nothing is left to return.
            let mut stdout = std::io::stdout();
            while let Some(event) = events.next().await {
                stdout.write_all(event.to_ndjson().as_bytes())?;
                stdout.flush()?;
            }
            Ok(String::new())
        }
    }
}
