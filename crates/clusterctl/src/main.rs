use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::admin::{NodeParams, RebalanceParams};
use common::{parse_range_list, AdminRequest, DashboardConfig, Perm, PermAction};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tokio::runtime::Runtime;
use topology::{
    parse_migration_event, spawn_agent, ClusterView, MigrationProgress, MigrationTracker,
    SystemClock,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format =
            std::env::var("CLUSTERCTL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter.clone())
                .with_target(true)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
    });
}

#[derive(Parser)]
#[command(name = "clusterctl")]
#[command(about = "Shard topology dashboard for a sharded key-value cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, Args)]
struct ConfigArgs {
    /// YAML dashboard config (regions, TTLs).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Region every shard should span; repeat for several. Overrides the config file.
    #[arg(long = "region")]
    regions: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay node and migration feeds and print the resulting view
    View {
        /// JSON-lines file of node heartbeats
        #[arg(long)]
        nodes: PathBuf,
        /// JSON-lines file of migration task snapshots
        #[arg(long)]
        migrations: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
        /// Emit the view as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Print per-range progress of migration tasks
    Progress {
        #[arg(long)]
        migrations: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the controller path and JSON body of an administrative request
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PermArg {
    Read,
    Write,
}

impl From<PermArg> for Perm {
    fn from(arg: PermArg) -> Self {
        match arg {
            PermArg::Read => Perm::Read,
            PermArg::Write => Perm::Write,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ActionArg {
    Enable,
    Disable,
}

impl From<ActionArg> for PermAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Enable => PermAction::Enable,
            ActionArg::Disable => PermAction::Disable,
        }
    }
}

#[derive(Subcommand)]
enum RequestCommands {
    /// Move slot ranges from one master to another
    Migrate {
        #[arg(long)]
        source: String,
        #[arg(long)]
        target: String,
        /// Comma separated ranges, e.g. `0-100,200`
        #[arg(long)]
        ranges: String,
    },
    /// Ask the controller to rebalance slots
    Rebalance {
        #[arg(long, default_value = "default")]
        method: String,
        #[arg(long = "target")]
        targets: Vec<String>,
        #[arg(long)]
        plan_only: bool,
    },
    /// Enable or disable read/write traffic on a node
    Perm {
        #[arg(long)]
        node: String,
        #[arg(long, value_enum)]
        action: ActionArg,
        #[arg(long, value_enum)]
        perm: PermArg,
    },
    Meet {
        #[arg(long)]
        node: String,
    },
    /// Forget a node cluster-wide and reset it
    Forget {
        #[arg(long)]
        node: String,
    },
    /// Re-parent a node under another one
    Replicate {
        #[arg(long)]
        child: String,
        #[arg(long)]
        parent: String,
    },
    SetMaster {
        #[arg(long)]
        node: String,
    },
    /// Force a failover takeover onto the node
    Takeover {
        #[arg(long)]
        node: String,
    },
}

fn resolve_config(args: &ConfigArgs) -> Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if !args.regions.is_empty() {
        config.regions = args.regions.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Non-blank lines of a JSON-lines feed file.
fn read_feed(path: &Path) -> Result<Vec<String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading feed {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Push both feeds through a reconcile agent and return its final view.
fn replay(
    config: &DashboardConfig,
    node_lines: Vec<String>,
    migration_lines: Vec<String>,
) -> Result<Arc<ClusterView>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let (senders, handle, task) = spawn_agent(config, SystemClock)?;
        info!(
            nodes = node_lines.len(),
            migrations = migration_lines.len(),
            "replaying feeds"
        );
        for line in node_lines {
            senders.nodes.send(line)?;
        }
        for line in migration_lines {
            senders.migrations.send(line)?;
        }
        drop(senders);
        task.await??;
        Ok::<_, anyhow::Error>(handle.current_view())
    })
}

fn build_request(command: RequestCommands) -> Result<AdminRequest> {
    let node = |node_id: String| NodeParams { node_id };
    let request = match command {
        RequestCommands::Migrate {
            source,
            target,
            ranges,
        } => {
            let ranges = parse_range_list(&ranges)?;
            AdminRequest::create_migration(source, target, &ranges)
        }
        RequestCommands::Rebalance {
            method,
            targets,
            plan_only,
        } => AdminRequest::Rebalance(RebalanceParams {
            method,
            target_ids: targets,
            show_plan_only: plan_only,
        }),
        RequestCommands::Perm { node, action, perm } => {
            AdminRequest::toggle_perm(node, action.into(), perm.into())
        }
        RequestCommands::Meet { node: id } => AdminRequest::Meet(node(id)),
        RequestCommands::Forget { node: id } => AdminRequest::ForgetAndReset(node(id)),
        RequestCommands::Replicate { child, parent } => AdminRequest::replicate(child, parent),
        RequestCommands::SetMaster { node: id } => AdminRequest::SetAsMaster(node(id)),
        RequestCommands::Takeover { node: id } => AdminRequest::FailoverTakeover(node(id)),
    };
    Ok(request)
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            nodes,
            migrations,
            config,
            json,
        } => {
            let config = resolve_config(&config)?;
            let node_lines = read_feed(&nodes)?;
            let migration_lines = match &migrations {
                Some(path) => read_feed(path)?,
                None => Vec::new(),
            };
            let view = replay(&config, node_lines, migration_lines)?;
            if json {
                println!("{}", serde_json::to_string_pretty(view.as_ref())?);
            } else {
                print!("{}", render::render_app_info(&config));
                print!("{}", render::render_view(&view));
            }
        }
        Commands::Progress { migrations, json } => {
            let mut tracker = MigrationTracker::new();
            for line in read_feed(&migrations)? {
                match parse_migration_event(&line) {
                    Ok(task) => {
                        tracker.ingest(task);
                    }
                    Err(e) => warn!(error = %e, "dropping malformed migration message"),
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&tracker.progress())?);
            } else {
                let progress: Vec<MigrationProgress> = tracker
                    .snapshot()
                    .values()
                    .map(MigrationProgress::from)
                    .collect();
                print!("{}", render::render_migrations(&progress));
            }
        }
        Commands::Request { command } => {
            let request = build_request(command)?;
            println!("POST {}", request.path());
            println!("{}", serde_json::to_string_pretty(&request.body()?)?);
        }
    }

    Ok(())
}
