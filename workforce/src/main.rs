//! Workforce demo CLI
//!
//! Runs a two-agent workforce against a web research task: a planning
//! agent decomposes the task, a browsing search agent executes the
//! sub-tasks, both share a messaging hub, and the run ends with a log
//! tree, KPIs, and a JSON dump.
//!
//! Usage:
//!   workforce --task "Find a vegetarian lasagna recipe..."
//!   workforce -m gpt-4o-mini --headless -vv

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent::toolkit::browser::BridgeCommand;
use agent::toolkit::{
    send_message_to_user_tool, AgentCommunicationToolkit, BrowserToolkit, BrowserToolkitConfig,
    HumanToolkit, SnapshotTruncator, TaskPlanningToolkit, ToolkitMessageIntegration,
};
use agent::toolkit::message_integration::console_message_handler;
use agent::{ChatAgent, ModelConfig, ModelFactory, ModelPlatform, Tool, Toolkit};

use workforce::config::WorkforceFileConfig;
use workforce::{prompts, working_directory, Task, Workforce, WorkforceConfig};

const DEFAULT_TASK: &str = "Look into the website https://www.allrecipes.com/ Provide a recipe \
     for vegetarian lasagna with more than 100 reviews and a rating of at least 4.5 stars \
     suitable for 6 people.";

const SEARCH_AGENT_ID: &str = "Search_Agent";
const PLANNER_AGENT_ID: &str = "Task_Planner";

const SEARCH_WORKER_DESCRIPTION: &str = "Search Agent: An expert web researcher that can browse \
     websites, perform searches, and extract information to support other agents.";

/// Browser tools exposed to the search agent
const ENABLED_BROWSER_TOOLS: &[&str] = &[
    "browser_open",
    "browser_close",
    "browser_back",
    "browser_forward",
    "browser_click",
    "browser_type",
    "browser_enter",
    "browser_switch_tab",
    "browser_visit_page",
    "browser_get_som_screenshot",
];

#[derive(Parser)]
#[command(name = "workforce")]
#[command(about = "Multi-agent workforce demo with a browsing search agent")]
struct Cli {
    /// Task for the workforce to solve
    #[arg(long, default_value = DEFAULT_TASK)]
    task: String,

    /// Model to use
    #[arg(short = 'm', long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Command used to launch the browser bridge process
    #[arg(long)]
    bridge_cmd: Option<String>,

    /// Where to dump the run logs
    #[arg(long, default_value = "eigent_logs.json")]
    log_file: PathBuf,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // Allow RUST_LOG to override if set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

/// Build the browsing search agent with browser, human, and messaging tools
fn build_search_agent(
    cli: &Cli,
    file_config: &WorkforceFileConfig,
    working_dir: &Path,
    session_id: &str,
    comm: &AgentCommunicationToolkit,
    integration: &ToolkitMessageIntegration,
) -> Result<ChatAgent> {
    let model = create_model(cli, file_config)?;

    let bridge_command = BridgeCommand {
        command: cli
            .bridge_cmd
            .clone()
            .unwrap_or_else(|| file_config.browser.bridge_command.clone()),
        ..BridgeCommand::default()
    };

    let browser_config = BrowserToolkitConfig::new(session_id)
        .with_headless(cli.headless || file_config.browser.headless)
        .with_stealth(true)
        .with_viewport_limit(false)
        .with_log_to_file(true)
        .with_cache_dir(working_dir)
        .with_default_start_url(&file_config.browser.start_url)
        .with_enabled_tools(ENABLED_BROWSER_TOOLS.iter().copied())
        .with_bridge_command(bridge_command);
    let browser = BrowserToolkit::new(browser_config)?;

    // Browser tool calls get announced to the user as they happen
    let browser = integration.register_toolkits(browser);

    let mut tools: Vec<Arc<dyn Tool>> = browser.get_tools();
    tools.push(HumanToolkit::new().ask_human_via_console());
    tools.push(send_message_to_user_tool(console_message_handler()));
    tools.extend(comm.get_tools());

    Ok(ChatAgent::new(SEARCH_AGENT_ID, model)
        .with_system_message(prompts::search_agent_system_message(working_dir))
        .with_tools(tools)
        .with_prune_tool_calls(true)
        .with_snapshot_truncator(SnapshotTruncator::default()))
}

/// Build the planning agent that coordinates the workforce
fn build_planner_agent(
    cli: &Cli,
    file_config: &WorkforceFileConfig,
    comm: &AgentCommunicationToolkit,
    integration: &ToolkitMessageIntegration,
) -> Result<ChatAgent> {
    let model = create_model(cli, file_config)?;

    // Planning tool calls get announced to the user like browser calls
    let planning = integration.register_toolkits(TaskPlanningToolkit::new());
    let mut tools: Vec<Arc<dyn Tool>> = planning.get_tools();
    tools.push(HumanToolkit::new().ask_human_via_console());
    tools.push(send_message_to_user_tool(console_message_handler()));
    tools.extend(comm.get_tools());

    Ok(ChatAgent::new(PLANNER_AGENT_ID, model)
        .with_system_message(prompts::planner_system_message())
        .with_tools(tools)
        .with_prune_tool_calls(true))
}

fn create_model(cli: &Cli, file_config: &WorkforceFileConfig) -> Result<agent::ModelBackend> {
    let model_name = cli
        .model
        .clone()
        .unwrap_or_else(|| file_config.llm.model.clone());
    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| file_config.llm.base_url.clone());

    let config = ModelConfig::new(ModelPlatform::Openai, model_name).with_base_url(base_url);
    Ok(ModelFactory::create(config)?)
}

fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = WorkforceFileConfig::load()?;
    let working_dir = working_directory()?;
    tracing::info!(dir = %working_dir.display(), "Working directory ready");

    let session_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    // Messaging hub shared by both agents
    let comm = AgentCommunicationToolkit::new(100);
    comm.register_agent(SEARCH_AGENT_ID);
    comm.register_agent(PLANNER_AGENT_ID);

    let integration = ToolkitMessageIntegration::new(console_message_handler());

    let search_agent = build_search_agent(
        &cli,
        &file_config,
        &working_dir,
        &session_id,
        &comm,
        &integration,
    )?;
    let planner_agent = build_planner_agent(&cli, &file_config, &comm, &integration)?;

    let workforce_config = WorkforceConfig::default()
        .with_graceful_shutdown_timeout(Duration::from_secs(
            file_config.workforce.graceful_shutdown_seconds,
        ))
        .with_task_timeout(Duration::from_secs(file_config.workforce.task_timeout_seconds))
        .with_share_memory(file_config.workforce.share_memory)
        .with_max_task_retries(file_config.workforce.max_task_retries);

    let mut workforce = Workforce::new("A workforce", Box::new(planner_agent), workforce_config);
    workforce.add_single_agent_worker(SEARCH_WORKER_DESCRIPTION, search_agent);

    print_banner("TASK");
    println!("{}", cli.task);

    let task = Task::new(cli.task.clone(), "0");
    let result = workforce.process_task_async(task).await?;

    print_banner("RESULT");
    println!("{}", result);

    print_banner("TASK TREE");
    println!("{}", workforce.log_tree());

    print_banner("KPIs");
    for (name, value) in workforce.kpis() {
        println!("  {}: {}", name, value);
    }

    workforce.dump_logs(&cli.log_file)?;
    println!("\nWorkforce logs dumped to {}", cli.log_file.display());

    workforce.shutdown().await;
    Ok(())
}
