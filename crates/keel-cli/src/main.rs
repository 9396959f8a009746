//! keel - multi-agent coding assistant CLI

mod commands;
mod config;
mod history;
mod index;
mod prompts;
mod tools;

use anyhow::Context as _;
use clap::Parser;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use keel_agent::{AgentProfile, BoxedTool, ContextCompressor, IntentClassifier, TaskAgent, TaskType};
use keel_ai::{AnthropicProvider, ChatOptions, ChatProvider, Model};
use keel_graph::{MemorySaver, TurnGraph, TurnOutcome};

use commands::ReplInput;
use config::Config;
use history::HistoryLog;
use index::{CodeIndex, IndexHandle};
use tools::{
    CodeSearchTool, GitTool, GlobTool, GrepTool, IndexStatsTool, ListTool, ReadTool, ShellTool,
    WebSearchTool, WriteTool,
};

/// keel - routes coding requests to specialized agents
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run a single request and exit instead of starting the REPL
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Force a task type (code, plan, search, ask) instead of classifying
    #[arg(short, long)]
    task: Option<String>,

    /// Working directory (defaults to the current directory)
    #[arg(short, long)]
    working_dir: Option<String>,

    /// Print an example config file and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        println!("{}", config::example_config());
        return Ok(());
    }

    let working_dir = match &args.working_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let config = Config::load(&working_dir);

    let api_key = config
        .anthropic_api_key()
        .context("no API key found; set ANTHROPIC_API_KEY or [api_keys] in the config")?;
    let provider: Arc<dyn ChatProvider> = Arc::new(AnthropicProvider::new(api_key));

    let index_handle = index::new_handle();
    let graph = build_graph(provider.clone(), &config, index_handle.clone(), &working_dir);
    let mut compressor =
        ContextCompressor::new(provider, Model::anthropic(&config.models.fast));

    let task_override = match &args.task {
        Some(t) => TaskType::parse(t)
            .with_context(|| format!("unknown task type '{}'; use code, plan, search, or ask", t))?,
        None => TaskType::Auto,
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut history = if config.history.enabled {
        HistoryLog::new(
            &config.history_dir(),
            &session_id,
            &working_dir.display().to_string(),
        )
    } else {
        HistoryLog::disabled()
    };

    if let Some(request) = args.command {
        run_turn(
            &graph,
            &mut compressor,
            &mut history,
            &session_id,
            &request,
            task_override,
        )
        .await;
        return Ok(());
    }

    repl(
        graph,
        compressor,
        history,
        session_id,
        config,
        index_handle,
        working_dir,
        task_override,
    )
    .await
}

/// Wire the classifier, the four agents, and the checkpoint store.
fn build_graph(
    provider: Arc<dyn ChatProvider>,
    config: &Config,
    index_handle: IndexHandle,
    working_dir: &PathBuf,
) -> TurnGraph {
    let fast = Model::anthropic(&config.models.fast);
    let capable = Model::anthropic(&config.models.capable);

    let read: BoxedTool = Arc::new(ReadTool::new(working_dir.clone()));
    let write: BoxedTool = Arc::new(WriteTool::new(
        working_dir.clone(),
        config.safety.confine_writes,
    ));
    let list: BoxedTool = Arc::new(ListTool::new(working_dir.clone()));
    let glob: BoxedTool = Arc::new(GlobTool::new(working_dir.clone()));
    let grep: BoxedTool = Arc::new(GrepTool::new(working_dir.clone()));
    let shell: BoxedTool = Arc::new(ShellTool::new(
        working_dir.clone(),
        config.safety.allowed_commands.clone(),
        config.safety.command_timeout_secs,
    ));
    let git: BoxedTool = Arc::new(GitTool::new(working_dir.clone()));
    let code_search: BoxedTool = Arc::new(CodeSearchTool::new(index_handle.clone()));
    let index_stats: BoxedTool = Arc::new(IndexStatsTool::new(index_handle));
    let web_search: BoxedTool = Arc::new(WebSearchTool::new());

    let specs: [(TaskType, &str, &Model, Vec<BoxedTool>); 4] = [
        (
            TaskType::Code,
            prompts::CODE_PROMPT,
            &capable,
            vec![
                read.clone(),
                write,
                list.clone(),
                glob.clone(),
                grep.clone(),
                shell,
                git,
                code_search.clone(),
                index_stats.clone(),
            ],
        ),
        (
            TaskType::Plan,
            prompts::PLAN_PROMPT,
            &capable,
            vec![
                read.clone(),
                list.clone(),
                glob.clone(),
                grep.clone(),
                code_search.clone(),
                index_stats,
            ],
        ),
        (
            TaskType::Search,
            prompts::SEARCH_PROMPT,
            &fast,
            vec![read.clone(), grep.clone(), glob, code_search, web_search],
        ),
        (TaskType::Ask, prompts::ASK_PROMPT, &fast, vec![read, list, grep]),
    ];

    let mut agents = HashMap::new();
    for (task, prompt, model, agent_tools) in specs {
        let profile = AgentProfile {
            name: format!("{}_agent", task),
            system_prompt: prompt.to_string(),
            model: model.clone(),
            options: ChatOptions::default(),
        };
        agents.insert(
            task,
            Arc::new(TaskAgent::new(profile, provider.clone(), agent_tools)),
        );
    }

    let classifier = IntentClassifier::new(provider, fast);
    TurnGraph::new(
        classifier,
        agents,
        Arc::new(MemorySaver::new()),
        working_dir.display().to_string(),
    )
}

/// Drive one turn and print the result. Returns whether the thread is
/// now suspended on a question.
async fn run_turn(
    graph: &TurnGraph,
    compressor: &mut ContextCompressor,
    history: &mut HistoryLog,
    thread_id: &str,
    text: &str,
    task_override: TaskType,
) -> bool {
    history.message("user", text, None);
    let outcome = graph
        .invoke(thread_id, text, task_override, CancellationToken::new())
        .await;

    match &outcome {
        TurnOutcome::Completed(state) => {
            let reply = state.last_reply().unwrap_or_else(|| "(no reply)".to_string());
            history.message("assistant", &reply, Some(state.task_type.as_str()));
            compressor.add_interaction(text, &reply).await;
            graph.set_context(thread_id, compressor.summary());
            println!("\n{}\n", reply);
            false
        }
        TurnOutcome::Suspended { question, .. } => {
            history.clarification(question);
            println!("\n? {}\n", question);
            true
        }
    }
}

async fn repl(
    graph: TurnGraph,
    mut compressor: ContextCompressor,
    mut history: HistoryLog,
    session_id: String,
    config: Config,
    index_handle: IndexHandle,
    working_dir: PathBuf,
    default_override: TaskType,
) -> anyhow::Result<()> {
    println!("keel - type a request, /help for commands, /quit to exit");
    let mut thread_id = session_id;
    let mut suspended = false;

    loop {
        let prompt = if suspended { "clarify> " } else { "> " };
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if suspended {
            match graph.resume(&thread_id, line) {
                Ok(_) => {
                    history.message("user", line, None);
                    println!("Noted. What would you like to do next?");
                    suspended = false;
                }
                Err(e) => eprintln!("resume failed: {}", e),
            }
            continue;
        }

        match commands::parse(line) {
            ReplInput::Message { text, task_override } => {
                if text.is_empty() {
                    continue;
                }
                let forced = if task_override.is_auto() {
                    default_override
                } else {
                    task_override
                };
                suspended = run_turn(
                    &graph,
                    &mut compressor,
                    &mut history,
                    &thread_id,
                    &text,
                    forced,
                )
                .await;
            }
            ReplInput::Index => {
                match CodeIndex::build(&working_dir, &config.index) {
                    Ok(built) => {
                        let stats = built.stats();
                        *index_handle.write() = Some(built);
                        graph.mark_indexed(&thread_id);
                        println!("Indexed {} files ({} terms)", stats.files, stats.terms);
                    }
                    Err(e) => eprintln!("indexing failed: {}", e),
                }
            }
            ReplInput::New => {
                graph.discard(&thread_id);
                compressor.clear();
                thread_id = uuid::Uuid::new_v4().to_string();
                suspended = false;
                println!("Started a new conversation");
            }
            ReplInput::Help => println!("{}", commands::HELP_TEXT),
            ReplInput::Quit => break,
            ReplInput::Unknown(cmd) => {
                println!("Unknown command: /{} (try /help)", cmd)
            }
        }
    }

    Ok(())
}
