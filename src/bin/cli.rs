//! NeuroRun - LLM-guided Android automation
//!
//! This is the CLI entry point for the neurorun tool.
//! Run with: cargo run --bin neurorun -- <command>

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use neuro_run::adb::ADBConnection;
use neuro_run::memory::ProfileCategory;
use neuro_run::missions::commerce::{self, CommerceTask};
use neuro_run::missions::events::{self, DEFAULT_MESSAGING_APP};
use neuro_run::missions::rides::{self, DEFAULT_RIDE_APPS};
use neuro_run::{
    AdbDevice, AgentConfig, AppSettings, ChatModel, ContextManager, Device, InsightHarvester,
    MissionRunner, ModelClient, NeuroPlanner, PlanBridge, PromptEngine, SmartAgent,
};

#[derive(Parser, Debug)]
#[command(name = "neurorun", version, about = "LLM-guided Android automation over ADB")]
struct Cli {
    /// ADB device serial (defaults to the first online device)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Chat model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Step budget for each agent run
    #[arg(long, global = true)]
    max_steps: Option<u32>,

    /// Directory for the user profile and vector memory
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Attach screenshots to decision requests
    #[arg(long, global = true)]
    vision: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the observe-decide-act loop for one goal
    Act {
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,
    },
    /// Print the plan generated for a goal
    Plan {
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,
        /// Print a plain step list planned from the profile instead
        #[arg(long)]
        steps: bool,
    },
    /// Interactive mode: learn, plan and execute each request
    Run,
    /// Compare prices across shopping or food apps
    Shop {
        #[arg(long, default_value = "shopping")]
        task: CommerceTask,
        #[arg(long)]
        query: String,
    },
    /// Compare ride-hailing fares
    Ride {
        #[arg(long, default_value = "Current Location")]
        pickup: String,
        #[arg(long)]
        drop: String,
        /// Comma-separated app names
        #[arg(long, value_delimiter = ',')]
        apps: Vec<String>,
    },
    /// Send an event invitation to each contact
    Invite {
        /// Comma-separated contact names
        #[arg(long)]
        contacts: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value = DEFAULT_MESSAGING_APP)]
        app: String,
    },
    /// List connected devices, optionally managing remote ones first
    Devices {
        /// Connect to a device over TCP/IP (port 5555 when omitted)
        #[arg(long, value_name = "ADDR")]
        connect: Option<String>,
        /// Disconnect a remote device
        #[arg(long, value_name = "ADDR", conflicts_with = "connect")]
        disconnect: Option<String>,
        /// Restart the adb server before listing
        #[arg(long)]
        restart_server: bool,
    },
    /// Vector memory
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
    /// User profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Show the effective settings, optionally persisting them
    Config {
        #[arg(long)]
        save: bool,
        /// Also write the API key to the settings file
        #[arg(long, requires = "save")]
        keep_api_key: bool,
    },
    /// Check adb, the device and the model
    Check,
}

#[derive(Subcommand, Debug)]
enum MemoryCommand {
    /// Store a memory
    Add {
        text: String,
        /// Metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Find the memories closest to a query
    Query {
        text: String,
        #[arg(short, long, default_value_t = 3)]
        n: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Print the profile as JSON
    Show,
    /// Set a value: `profile set preferences food_app Swiggy`
    /// or `profile set habits "orders late at night"`
    Set {
        category: String,
        /// Key for map categories, or the value for list categories
        first: String,
        /// Value, parsed as JSON when possible
        value: Option<String>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

/// JSON when the text parses as JSON, otherwise a plain string.
fn json_or_string(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = AppSettings::load();
    settings.apply_env();
    apply_flags(&cli, &mut settings);

    match cli.command {
        Command::Act { ref goal } => act(&settings, &goal.join(" ")).await,
        Command::Plan { ref goal, steps } => plan(&settings, &goal.join(" "), steps).await,
        Command::Run => repl(&settings).await,
        Command::Shop { task, ref query } => shop(&settings, task, query).await,
        Command::Ride {
            ref pickup,
            ref drop,
            ref apps,
        } => ride(&settings, pickup, drop, apps).await,
        Command::Invite {
            ref contacts,
            ref event,
            ref date,
            ref time,
            ref location,
            ref app,
        } => {
            let message = events::build_invite_message(event, date, time, location);
            invite(&settings, contacts, &message, app).await
        }
        Command::Devices {
            ref connect,
            ref disconnect,
            restart_server,
        } => devices(connect.as_deref(), disconnect.as_deref(), restart_server).await,
        Command::Memory { ref action } => memory(&settings, action).await,
        Command::Profile { ref action } => profile(&settings, action).await,
        Command::Config { save, keep_api_key } => show_config(&settings, save, keep_api_key),
        Command::Check => check(&settings).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "neuro_run=debug,info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_flags(cli: &Cli, settings: &mut AppSettings) {
    if let Some(device) = &cli.device {
        settings.device_id = device.clone();
    }
    if let Some(model) = &cli.model {
        settings.model_name = model.clone();
    }
    if let Some(url) = &cli.base_url {
        settings.base_url = url.clone();
    }
    if let Some(n) = cli.max_steps {
        settings.max_steps = n;
    }
    if let Some(dir) = &cli.storage_dir {
        settings.storage_dir = dir.to_string_lossy().into_owned();
    }
    if cli.vision {
        settings.vision = true;
    }
}

fn print_banner(settings: &AppSettings) {
    println!("🤖 NeuroRun - LLM-guided Android Automation");
    println!("================================================");
    println!("Model: {} @ {}", settings.model_name, settings.base_url);
    println!(
        "Retry: max {} attempts, {}s delay",
        settings.max_retries, settings.retry_delay
    );
    println!("Max steps: {}", settings.max_steps);
    if settings.vision {
        println!("Vision: enabled");
    }
    println!("================================================\n");
}

fn agent_config(settings: &AppSettings) -> AgentConfig {
    AgentConfig::default()
        .with_max_steps(settings.max_steps)
        .with_vision(settings.vision)
}

async fn connect_device(settings: &AppSettings) -> anyhow::Result<Arc<dyn Device>> {
    let mut device = AdbDevice::new(settings.device_id());
    let id = device
        .connect()
        .await
        .context("No Android device available; check `neurorun devices`")?;
    println!("Device: {}", id);
    Ok(Arc::new(device))
}

fn optional_model(settings: &AppSettings) -> Option<Arc<dyn ChatModel>> {
    let config = settings.model_config();
    if !config.has_api_key() {
        return None;
    }
    Some(Arc::new(ModelClient::new(config)))
}

fn require_model(settings: &AppSettings) -> anyhow::Result<Arc<dyn ChatModel>> {
    match optional_model(settings) {
        Some(model) => Ok(model),
        None => bail!("No API key found. Set GEMINI_API_KEY (or MODEL_API_KEY) in the environment or .env"),
    }
}

fn open_context(settings: &AppSettings) -> anyhow::Result<ContextManager> {
    ContextManager::open(&settings.storage_dir, settings.embedder())
        .with_context(|| format!("Failed to open storage at {}", settings.storage_dir))
}

fn mission_runner(
    settings: &AppSettings,
    device: Arc<dyn Device>,
    model: Arc<dyn ChatModel>,
) -> MissionRunner {
    MissionRunner::new(device, model, agent_config(settings))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn act(settings: &AppSettings, goal: &str) -> anyhow::Result<()> {
    let model = require_model(settings)?;
    print_banner(settings);
    let device = connect_device(settings).await?;

    println!("📝 Task: {}\n", goal);
    let mut agent = SmartAgent::new(device, model, agent_config(settings));
    let outcome = agent.run(goal).await;
    println!("\n✅ Result: {}", outcome);
    Ok(())
}

async fn plan(settings: &AppSettings, goal: &str, steps: bool) -> anyhow::Result<()> {
    let context = Arc::new(open_context(settings)?);
    let planner = match optional_model(settings) {
        Some(model) => NeuroPlanner::new(model).with_prompt_engine(PromptEngine::new(Arc::clone(&context))),
        None => NeuroPlanner::unavailable(),
    };

    if steps {
        let profile = serde_json::to_value(context.profile_snapshot().await)?;
        for (i, step) in planner.plan_steps(goal, &profile).await.iter().enumerate() {
            println!("{}. {}", i + 1, step);
        }
        return Ok(());
    }

    let plan = planner.generate_plan(goal).await?;
    print_json(&plan)
}

async fn repl(settings: &AppSettings) -> anyhow::Result<()> {
    println!("Welcome to NeuroRun (Adaptive Agent Core)");
    let model = optional_model(settings);
    let context = Arc::new(open_context(settings)?);
    let harvester = InsightHarvester::new(model.clone(), context.profile());

    let planner = match model {
        Some(model) => NeuroPlanner::new(model).with_prompt_engine(PromptEngine::new(Arc::clone(&context))),
        None => bail!("No API key found. Set GEMINI_API_KEY (or MODEL_API_KEY) to plan requests"),
    };
    let bridge = PlanBridge::new(connect_device(settings).await?);

    println!("System Ready. Type 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nUser> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Goodbye! 👋");
            break;
        }

        // Learning runs alongside planning
        harvester.spawn(input);

        println!("Thinking...");
        let plan = match planner.generate_plan(input).await {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!("Planning failed: {}", e);
                continue;
            }
        };

        println!("Executing Plan...");
        let report = bridge.execute_sequence(&plan).await;
        println!(
            "Done: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
    }
    Ok(())
}

async fn shop(settings: &AppSettings, task: CommerceTask, query: &str) -> anyhow::Result<()> {
    let model = require_model(settings)?;
    print_banner(settings);
    let runner = mission_runner(settings, connect_device(settings).await?, model);

    let report = commerce::compare(&runner, task, query).await;
    println!("\n=== {} comparison for '{}' ===", task, query);
    print_json(&report)?;
    match report.cheapest {
        Some(platform) => println!("\n🏆 Cheapest: {}", platform),
        None => println!("\nNo comparable prices found."),
    }
    Ok(())
}

async fn ride(settings: &AppSettings, pickup: &str, drop: &str, apps: &[String]) -> anyhow::Result<()> {
    let model = require_model(settings)?;
    print_banner(settings);
    let runner = mission_runner(settings, connect_device(settings).await?, model);

    let apps: Vec<String> = if apps.is_empty() {
        DEFAULT_RIDE_APPS.iter().map(|a| a.to_string()).collect()
    } else {
        apps.to_vec()
    };
    let report = rides::compare_rides(&runner, &apps, pickup, drop).await;
    print_json(&report)?;
    if let Some(app) = report.cheapest {
        println!("\n🏆 Cheapest ride: {}", app);
    }
    Ok(())
}

async fn invite(settings: &AppSettings, contacts: &str, message: &str, app: &str) -> anyhow::Result<()> {
    let contacts = events::parse_contacts(contacts);
    if contacts.is_empty() {
        bail!("No contacts given");
    }
    let model = require_model(settings)?;
    print_banner(settings);
    let runner = mission_runner(settings, connect_device(settings).await?, model);

    println!("Message: {}", message);
    let results = events::send_invites(&runner, &contacts, message, app).await;
    print_json(&results)
}

async fn devices(
    connect: Option<&str>,
    disconnect: Option<&str>,
    restart_server: bool,
) -> anyhow::Result<()> {
    let adb = ADBConnection::new();
    if restart_server {
        if let Err(e) = adb.kill_server().await {
            tracing::debug!("kill-server: {}", e);
        }
        adb.start_server().await?;
        println!("adb server restarted");
    }
    if let Some(address) = connect {
        println!("{}", adb.connect(address).await?);
    }
    if let Some(address) = disconnect {
        let output = adb.disconnect(Some(address)).await?;
        println!("{}", output);
    }

    let devices = adb.list_devices().await?;
    if devices.is_empty() {
        println!("No devices connected.");
    }
    for device in devices {
        println!(
            "{}\t{}\t{:?}\t{}",
            device.device_id,
            device.status,
            device.connection_type,
            device.model.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn memory(settings: &AppSettings, action: &MemoryCommand) -> anyhow::Result<()> {
    let mut context = open_context(settings)?;
    match action {
        MemoryCommand::Add { text, metadata } => {
            let metadata: BTreeMap<String, String> = metadata.iter().cloned().collect();
            let id = context.add_memory(text, metadata).await?;
            println!("Stored memory {}", id);
        }
        MemoryCommand::Query { text, n } => {
            let hits = context.query_memory(text, *n).await?;
            if hits.is_empty() {
                println!("No memories stored.");
            }
            for hit in hits {
                println!("{:.3}  {}", hit.score, hit.text);
            }
        }
    }
    Ok(())
}

async fn profile(settings: &AppSettings, action: &ProfileCommand) -> anyhow::Result<()> {
    let context = open_context(settings)?;
    match action {
        ProfileCommand::Show => print_json(&context.profile_snapshot().await),
        ProfileCommand::Set {
            category,
            first,
            value,
        } => {
            let category: ProfileCategory = match category.parse() {
                Ok(category) => category,
                Err(never) => match never {},
            };
            let (key, raw) = match value {
                Some(value) => (Some(first.as_str()), value.as_str()),
                None => (None, first.as_str()),
            };
            context
                .update_profile(&category, key, json_or_string(raw))
                .await?;
            println!("Updated {}", category);
            Ok(())
        }
    }
}

fn show_config(settings: &AppSettings, save: bool, keep_api_key: bool) -> anyhow::Result<()> {
    let mut shown = settings.without_api_key();
    if !settings.api_key.is_empty() {
        shown.api_key = "***".to_string();
    }
    print_json(&shown)?;
    if save {
        let to_save = if keep_api_key {
            settings.clone()
        } else {
            settings.without_api_key()
        };
        let path = to_save.save()?;
        println!("Saved to {}", path.display());
        if !keep_api_key && !settings.api_key.is_empty() {
            println!("API key not saved; pass --keep-api-key to store it");
        }
    }
    Ok(())
}

async fn check(settings: &AppSettings) -> anyhow::Result<()> {
    println!("--- NeuroRun diagnostics ---");
    let adb = ADBConnection::new();
    if !adb.is_running().await {
        println!("❌ adb: not reachable");
    } else {
        println!("✅ adb: reachable");
        match AdbDevice::new(settings.device_id()).connect().await {
            Ok(id) => println!("✅ device: {}", id),
            Err(e) => println!("❌ device: {}", e),
        }
    }

    match optional_model(settings) {
        None => println!("❌ model: no API key"),
        Some(model) => match model.prompt("Hello").await {
            Ok(reply) => println!("✅ model {}: {}", settings.model_name, reply.trim()),
            Err(e) => println!("❌ model {}: {}", settings.model_name, e),
        },
    }
    Ok(())
}
