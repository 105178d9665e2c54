//! Repository Social Graph - CLI
//!
//! Builds contributor graphs from mined events, prints network metrics and
//! exports Gephi tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use repo_social_graph::graph::{
    AnalyticsEngine, GraphAnalytics, GraphExport, GraphScope, GraphSet, MetricOutcome,
    NetworkAnalytics, SocialGraphEngine,
};
use repo_social_graph::{gephi, ingest, Config};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "social-graph")]
#[command(about = "Contributor social graph analytics")]
struct Cli {
    /// YAML config file (default: social-graph.yaml)
    #[arg(long, global = true, env = "SOCIAL_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Ignore events before this instant (RFC 3339)
    #[arg(long, global = true)]
    since: Option<DateTime<Utc>>,

    /// Ignore events at or after this instant (RFC 3339)
    #[arg(long, global = true)]
    until: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graphs and print their sizes
    Build {
        /// Events file (.json array or .jsonl)
        #[arg(short, long)]
        events: PathBuf,
    },

    /// Compute metrics and communities
    Analyze {
        /// Events file (.json array or .jsonl)
        #[arg(short, long)]
        events: PathBuf,

        /// all, integrated, comment, closure or review_merge
        #[arg(short, long, default_value = "all")]
        graph: GraphSelection,

        /// Number of actors listed per ranking (default: analytics.top_n)
        #[arg(long)]
        top: Option<usize>,

        /// Print the full analytics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write Gephi node/edge CSV tables
    Export {
        /// Events file (.json array or .jsonl)
        #[arg(short, long)]
        events: PathBuf,

        /// Output prefix; writes <prefix>_nodes.csv and <prefix>_edges.csv
        #[arg(short, long)]
        output: PathBuf,

        /// all, integrated, comment, closure or review_merge
        #[arg(short, long, default_value = "integrated")]
        graph: GraphSelection,
    },
}

/// Which graphs a command applies to.
#[derive(Debug, Clone, Copy)]
enum GraphSelection {
    All,
    One(GraphScope),
}

impl FromStr for GraphSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<GraphScope>().map(Self::One)
    }
}

impl GraphSelection {
    fn scopes(&self, graphs: &GraphSet) -> Vec<GraphScope> {
        match self {
            Self::All => graphs.iter().map(|g| g.scope).collect(),
            Self::One(scope) => vec![*scope],
        }
    }
}

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,repo_social_graph=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration; CLI flags win over the config file
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let top = match cli.command {
        Commands::Analyze { top, .. } => top,
        _ => None,
    };
    config.apply_cli_overrides(cli.since, cli.until, top);

    let engine = SocialGraphEngine::new(config.coefficients.clone(), config.analytics.clone())
        .with_window(config.window);

    match cli.command {
        Commands::Build { events } => run_build(&engine, &events),
        Commands::Analyze {
            events, graph, json, ..
        } => run_analyze(&engine, &events, graph, json),
        Commands::Export {
            events,
            output,
            graph,
        } => run_export(&engine, &events, &output, graph),
    }
}

fn build_graphs(engine: &SocialGraphEngine, events: &Path) -> Result<GraphSet> {
    let events = ingest::load_events(events)?;
    engine
        .build_graphs(&events)
        .context("Failed to build social graphs")
}

fn run_build(engine: &SocialGraphEngine, events: &Path) -> Result<()> {
    let graphs = build_graphs(engine, events)?;
    let weights: Vec<String> = engine
        .coefficients()
        .iter()
        .map(|(kind, c)| format!("{}={}", kind, c))
        .collect();
    println!("coefficients: {}", weights.join(" "));
    println!("{:<14} {:>8} {:>8}", "graph", "actors", "edges");
    for graph in graphs.iter() {
        println!(
            "{:<14} {:>8} {:>8}",
            graph.scope.to_string(),
            graph.node_count(),
            graph.edge_count()
        );
    }
    Ok(())
}

fn run_analyze(
    engine: &SocialGraphEngine,
    events: &Path,
    selection: GraphSelection,
    json: bool,
) -> Result<()> {
    let top = engine.config().top_n;
    let graphs = build_graphs(engine, events)?;
    let analytics = engine.analyze_graphs(&graphs);
    let selected: Vec<&GraphAnalytics> = selection
        .scopes(&graphs)
        .into_iter()
        .filter_map(|scope| analytics.get(scope))
        .collect();

    if json {
        let out = match selection {
            GraphSelection::All => serde_json::to_string_pretty(&analytics)?,
            GraphSelection::One(_) => serde_json::to_string_pretty(&selected)?,
        };
        println!("{}", out);
        return Ok(());
    }

    for report in selected {
        print_report(report, top);
    }
    print_footer(&analytics);
    Ok(())
}

fn print_report(analytics: &GraphAnalytics, top: usize) {
    println!("== {} ==", analytics.scope);
    println!("actors: {}  edges: {}", analytics.node_count, analytics.edge_count);
    println!("density: {:.4}", analytics.density);
    println!("average degree: {:.4}", analytics.average_degree);
    println!(
        "clustering: global {:.4}, average {:.4}",
        analytics.clustering_coefficient, analytics.average_clustering
    );
    match analytics.assortativity {
        Some(r) => println!("assortativity: {:.4}", r),
        None => println!("assortativity: undefined"),
    }
    if let Some(main) = analytics.components.first() {
        println!(
            "components: {} (largest {})",
            analytics.components.len(),
            main.size
        );
    }
    println!(
        "communities: {} (modularity {:.4})",
        analytics.communities.len(),
        analytics.modularity
    );

    for name in [
        "degree_centrality",
        "closeness_centrality",
        "betweenness_centrality",
        "pagerank",
    ] {
        let Some(metric) = analytics.metric(name) else {
            continue;
        };
        println!("top {} by {}:", top, name);
        for (id, score) in metric.top(top) {
            println!("  {:<24} {:.6}", id, score);
        }
    }

    if !analytics.bridges.is_empty() {
        println!("bridging actors:");
        for tie in &analytics.bridges {
            println!("  {:<24} {}", tie.actor, tie.external_links);
        }
    }

    for status in &analytics.statuses {
        match &status.outcome {
            MetricOutcome::Ok => {}
            MetricOutcome::NotConverged { iterations } => {
                println!("note: {} did not converge after {} iterations", status.metric, iterations)
            }
            MetricOutcome::Failed { reason } => {
                println!("note: {} unavailable: {}", status.metric, reason)
            }
        }
    }
    println!();
}

fn print_footer(analytics: &NetworkAnalytics) {
    println!("computed at {}", analytics.computed_at.to_rfc3339());
}

fn run_export(
    engine: &SocialGraphEngine,
    events: &Path,
    output: &Path,
    selection: GraphSelection,
) -> Result<()> {
    let graphs = build_graphs(engine, events)?;
    let analytics = engine.analyze_graphs(&graphs);

    for scope in selection.scopes(&graphs) {
        let (Some(graph), Some(report)) = (graphs.get(scope), analytics.get(scope)) else {
            continue;
        };
        let export = GraphExport::from_analytics(graph, report);
        let prefix = match selection {
            GraphSelection::All => PathBuf::from(format!("{}_{}", output.display(), scope)),
            GraphSelection::One(_) => output.to_path_buf(),
        };
        let (nodes, edges) = gephi::write_csv(&export, &prefix)?;
        println!("{}: {} / {}", scope, nodes.display(), edges.display());
    }
    Ok(())
}
