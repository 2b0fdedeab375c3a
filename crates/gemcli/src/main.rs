// crates/gemcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gemcore::{ExecutableGraph, ExecutionEvent, NodeEvent, NodeRecord};
use gemnodes::{DebugNode, InputDataNode, OutputDataNode, ScaleNode};
use gemruntime::{GemRuntime, NodeRegistry, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gem")]
#[command(about = "Executable node graph CLI", long_about = None)]
struct Cli {
    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a .gem file
    Run {
        /// Path to the .gem file
        #[arg(short, long)]
        file: PathBuf,

        /// Stop the run after this many queue pops
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Decode a .gem file and print it as JSON
    Inspect {
        /// Path to the .gem file
        file: PathBuf,
    },

    /// Encode a JSON graph into a .gem file
    Compile {
        /// Path to the graph JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .gem path
        #[arg(short, long)]
        output: PathBuf,

        /// Slot id width in bytes; picked automatically when omitted
        #[arg(long)]
        uid_size: Option<u8>,
    },

    /// List available node types
    Nodes,

    /// Create a new example graph
    Init {
        /// Output file path
        #[arg(short, long, default_value = "example.gem")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_runtime(config: RuntimeConfig) -> GemRuntime {
    let mut registry = NodeRegistry::new();
    gemnodes::register_all(&mut registry);
    GemRuntime::with_registry(Arc::new(registry), config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { file, max_steps } => {
            run_graph(file, max_steps).await?;
        }

        Commands::Inspect { file } => {
            inspect_graph(file).await?;
        }

        Commands::Compile {
            input,
            output,
            uid_size,
        } => {
            compile_graph(input, output, uid_size).await?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_graph(output).await?;
        }
    }

    Ok(())
}

async fn run_graph(file: PathBuf, max_steps: Option<usize>) -> Result<()> {
    println!("🚀 Loading graph from: {}", file.display());

    let runtime = build_runtime(RuntimeConfig {
        max_steps,
        ..RuntimeConfig::default()
    });

    let graph = runtime
        .load(&file)
        .await
        .with_context(|| format!("failed to load {}", file.display()))?;
    println!("   Nodes: {}", graph.len());
    println!();

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    println!("  … {} events dropped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            print_event(event);
        }
    });

    let result = runtime.execute(&graph).await;

    // Dropping the runtime closes the bus so the listener drains and exits
    drop(runtime);
    event_task.await?;

    let report = result?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", report.execution_id);
    println!("   Executions: {} ({} queue pops)", report.executions, report.steps);

    if !report.warnings.is_empty() {
        println!();
        println!("⚠️  Warnings:");
        for warning in &report.warnings {
            println!("   {}", warning);
        }
    }

    if !report.sink_outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (node, outputs) in &report.sink_outputs {
            println!("   Node {}:", node);
            let mut fields: Vec<_> = outputs.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (field, value) in fields {
                println!("     {}: {}", field, serde_json::to_string_pretty(&value.to_json())?);
            }
        }
    }

    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { nodes, .. } => {
            println!("▶️  Run started ({} nodes)", nodes);
        }
        ExecutionEvent::NodeStarted { node, tag, .. } => {
            println!("  ⚡ Starting node: {} ({})", node, tag);
        }
        ExecutionEvent::NodeCompleted {
            node, duration_ms, ..
        } => {
            println!("  ✅ Node {} completed in {}ms", node, duration_ms);
        }
        ExecutionEvent::NodeFailed { node, error, .. } => {
            println!("  ❌ Node {} failed: {}", node, error);
        }
        ExecutionEvent::Warning { warning, .. } => {
            println!("  ⚠️  {}", warning);
        }
        ExecutionEvent::NodeEvent { node, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node, message);
            }
            NodeEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {}% - {}", node, percent, msg);
                } else {
                    println!("     📊 [{}] {}%", node, percent);
                }
            }
        },
        ExecutionEvent::RunCompleted {
            success,
            duration_ms,
            ..
        } => {
            if success {
                println!("✨ Run completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Run failed after {}ms", duration_ms);
            }
        }
    }
}

async fn inspect_graph(file: PathBuf) -> Result<()> {
    let runtime = build_runtime(RuntimeConfig::default());
    let graph = runtime
        .load(&file)
        .await
        .with_context(|| format!("failed to load {}", file.display()))?;

    for (index, record) in graph.iter() {
        let name = runtime
            .registry()
            .descriptor(&record.tag)
            .map(|d| d.name.as_str())
            .unwrap_or("?");
        tracing::info!(
            "Node {}: {} ({}) inputs={:?} outputs={:?}",
            index,
            record.tag,
            name,
            record.inputs,
            record.outputs
        );
    }

    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

async fn compile_graph(input: PathBuf, output: PathBuf, uid_size: Option<u8>) -> Result<()> {
    println!("🔧 Compiling graph: {}", input.display());

    let json = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let graph: ExecutableGraph = serde_json::from_str(&json)?;

    let runtime = build_runtime(RuntimeConfig {
        uid_size,
        ..RuntimeConfig::default()
    });
    runtime.save(&output, &graph).await?;

    println!("✅ Wrote {} nodes to {}", graph.len(), output.display());
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let mut registry = NodeRegistry::new();
    gemnodes::register_all(&mut registry);

    for tag in registry.list_tags() {
        let Some(descriptor) = registry.descriptor(&tag) else {
            continue;
        };
        println!(
            "  • {} {} ({}, {:?})",
            tag, descriptor.name, descriptor.category, descriptor.role
        );
        println!(
            "    inputs: [{}]  outputs: [{}]",
            descriptor.inputs.join(", "),
            descriptor.outputs.join(", ")
        );
        for field in &descriptor.constants {
            println!(
                "    const {}: {} (default {})",
                field.name,
                field.kind.type_name(),
                field.kind.default_value().to_json()
            );
        }
    }
}

async fn create_example_graph(output: PathBuf) -> Result<()> {
    // 21 -> log -> x2 -> output
    let graph: ExecutableGraph = vec![
        NodeRecord::new(InputDataNode::TAG)
            .with_output([1])
            .with_constant("value", "21"),
        NodeRecord::new(DebugNode::TAG)
            .with_input(1)
            .with_output([2])
            .with_constant("label", "input"),
        NodeRecord::new(ScaleNode::TAG)
            .with_input(2)
            .with_output([3])
            .with_constant("factor", "2"),
        NodeRecord::new(OutputDataNode::TAG)
            .with_input(3)
            .with_output([]),
    ]
    .into();

    let runtime = build_runtime(RuntimeConfig::default());
    runtime.save(&output, &graph).await?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  gem run --file {}", output.display());

    Ok(())
}
