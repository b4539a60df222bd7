mod config;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use forge_agents::{default_agents, AgentRegistry};
use forge_core::ProposalRequest;
use forge_gateway::GatewayServer;
use forge_llm::LlmGateway;
use forge_orchestrator::{JobFacade, JobStatus, SchedulerConfig};
use forge_sources::{HttpSourceConnector, SourceConnector};
use forge_store::{InMemoryStateStore, RemoteStateStore, StateStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "forge", about = "Research proposal orchestration service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "forge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and serve requests until interrupted.
    Serve {
        /// Overrides `[server].host`.
        #[arg(long)]
        host: Option<String>,
        /// Overrides `[server].port`.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one proposal to completion and print the result to stdout,
    /// bypassing the HTTP layer entirely.
    Run {
        /// The research topic (minimum 10 characters).
        #[arg(long)]
        topic: String,
        /// A hint the agents should weave in. May be repeated.
        #[arg(long = "key-point")]
        key_points: Vec<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Run { topic, key_points, author, institution, department } => {
            run_direct(config, topic, key_points, author, institution, department).await
        }
    }
}

fn build_store(config: &Config) -> Arc<dyn StateStore> {
    if config::env_forces_memory_store() || !config.store.wants_remote() {
        Arc::new(InMemoryStateStore::new())
    } else {
        let url = config.store.remote_url.clone().unwrap_or_default();
        Arc::new(RemoteStateStore::new(url))
    }
}

fn build_sources(config: &Config, store: Arc<dyn StateStore>) -> Arc<HashMap<String, Arc<dyn SourceConnector>>> {
    let mut sources: HashMap<String, Arc<dyn SourceConnector>> = HashMap::with_capacity(config.sources.len());
    for source in &config.sources {
        let connector = HttpSourceConnector::new(
            source.name.clone(),
            source.base_url.clone(),
            source.requests_per_second,
            source.requests_per_minute,
            store.clone(),
        );
        sources.insert(source.name.clone(), Arc::new(connector));
    }
    Arc::new(sources)
}

fn build_facade(config: &Config) -> (Arc<JobFacade>, Arc<AgentRegistry>, Arc<dyn StateStore>) {
    let registry = Arc::new(AgentRegistry::build(default_agents()).expect("default agents cover every task kind"));
    let store = build_store(config);

    let mut llm_config = config.llm.clone();
    if config::env_forces_llm_mock() {
        llm_config.mock_mode = true;
    }
    let llm = Arc::new(LlmGateway::new(llm_config));

    let sources = build_sources(config, store.clone());
    let scheduler_config = SchedulerConfig {
        max_parallel_tasks: config.scheduler.max_parallel_tasks,
        default_task_timeout_secs: config.scheduler.default_task_timeout_secs,
        default_max_retries: config.scheduler.default_max_retries,
        output_ttl_secs: config.store.default_ttl_secs,
        ..SchedulerConfig::default()
    };

    let facade = Arc::new(JobFacade::new(registry.clone(), store.clone(), llm, sources, scheduler_config));
    (facade, registry, store)
}

async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> ExitCode {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let (facade, registry, store) = build_facade(&config);
    let app = GatewayServer::build(facade, registry, store);

    let addr = format!("{host}:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr, "failed to bind gateway listener");
            return ExitCode::from(2);
        }
    };

    info!(addr, "forge gateway listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "gateway server exited with an error");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

#[allow(clippy::too_many_arguments)]
async fn run_direct(
    config: Config,
    topic: String,
    key_points: Vec<String>,
    author: Option<String>,
    institution: Option<String>,
    department: Option<String>,
) -> ExitCode {
    let (facade, _registry, _store) = build_facade(&config);
    let request = ProposalRequest { topic, key_points, preferences: HashMap::new(), author, institution, department };

    let job_id = match facade.submit(request).await {
        Ok(job_id) => job_id,
        Err(e) => {
            error!(error = %e, "proposal request rejected");
            return ExitCode::from(2);
        }
    };

    match facade.join(job_id).await {
        Ok(JobStatus::Completed { proposal }) => {
            match serde_json::to_writer_pretty(std::io::stdout(), &proposal) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "failed to serialize completed proposal");
                    ExitCode::from(1)
                }
            }
        }
        Ok(other) => {
            error!(status = ?other, "job did not complete successfully");
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "failed to join job");
            ExitCode::from(1)
        }
    }
}
