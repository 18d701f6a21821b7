use std::io::{self, Read};
use std::path::{Path, PathBuf};

use agent_tools::output::SizeCriterion;
use agent_tools::{
    LargeOutputTool, OutputDisposition, ToolOutputConfig, ToolOutputHandler,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "tool-output")]
#[command(about = "Inspect and exercise large tool output offloading")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root folder for stored outputs
    #[arg(long, global = true, env = "TOOL_OUTPUT_FOLDER")]
    output_folder: Option<PathBuf>,

    /// Session directory under the output folder
    #[arg(long, global = true, env = "TOOL_OUTPUT_SESSION")]
    session: Option<String>,

    /// Large-output threshold in tokens (TOOL_OUTPUT_THRESHOLD is read by the config layer)
    #[arg(long, global = true)]
    threshold: Option<u32>,

    /// Model id used for token counting
    #[arg(long, global = true, env = "TOOL_OUTPUT_MODEL")]
    model: Option<String>,

    /// Do not advertise or serve the virtual tools
    #[arg(long, global = true, default_value = "false")]
    no_virtual_tools: bool,

    /// Enable debug logging
    #[arg(long, short, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether a payload would be offloaded
    Classify {
        /// Payload file, or - for stdin
        input: PathBuf,
    },
    /// Run a payload through the handler, storing it if large
    Store {
        /// Tool name recorded in the file name
        #[arg(long, default_value = "manual")]
        tool: String,
        /// Store even when below the threshold
        #[arg(long)]
        force: bool,
        /// Payload file, or - for stdin
        input: PathBuf,
    },
    /// List stored outputs in the session
    List,
    /// Read a character range of a stored output
    Read {
        filename: String,
        start: i64,
        end: i64,
    },
    /// Regex search in a stored output
    Search {
        filename: String,
        pattern: String,
        #[arg(long)]
        ignore_case: bool,
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Run a jq query against a stored JSON output
    Query {
        filename: String,
        query: String,
        #[arg(long)]
        compact: bool,
        #[arg(long)]
        raw: bool,
    },
    /// Print the advertised virtual tool schemas
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = build_config(&cli).await?;
    log::debug!("Effective configuration: {:?}", config);

    let handler = ToolOutputHandler::from_config(&config);
    let store = handler.store();

    match cli.command {
        Commands::Classify { input } => {
            let payload = read_input(&input)?;
            let classification = handler.classify(&payload, cli.model.as_deref());
            println!("{}", serde_json::to_string_pretty(&classification)?);

            let criterion = match classification.criterion {
                SizeCriterion::Tokens => "tokens",
                SizeCriterion::Bytes => "bytes",
            };
            let verdict = if classification.is_large {
                "large".yellow()
            } else {
                "inline".green()
            };
            eprintln!("{} (by {})", verdict, criterion);
        }
        Commands::Store { tool, force, input } => {
            let payload = read_input(&input)?;
            if force {
                let stored = store.write(&payload, &tool).await?;
                println!("{}", format!("Stored {}", stored.path.display()).green());
            } else {
                match handler.process(&tool, &payload, cli.model.as_deref()).await? {
                    OutputDisposition::Inline(_) => {
                        println!("{}", "Below threshold, nothing stored".dimmed());
                    }
                    OutputDisposition::Offloaded { message, .. } => println!("{message}"),
                }
            }
        }
        Commands::List => {
            let outputs = store.list().await?;
            if outputs.is_empty() {
                println!("{}", format!("No outputs in {}", store.session_dir().display()).dimmed());
            }
            for output in outputs {
                println!("{:>10}  {}", output.size, output.reference);
            }
        }
        Commands::Read { filename, start, end } => {
            run_virtual(
                &handler,
                LargeOutputTool::Read,
                json!({"filename": filename, "start": start, "end": end}),
            )
            .await?
        }
        Commands::Search {
            filename,
            pattern,
            ignore_case,
            max_results,
        } => {
            let mut args = json!({
                "filename": filename,
                "pattern": pattern,
                "case_sensitive": !ignore_case,
            });
            if let Some(max_results) = max_results {
                args["max_results"] = json!(max_results);
            }
            run_virtual(&handler, LargeOutputTool::Search, args).await?
        }
        Commands::Query {
            filename,
            query,
            compact,
            raw,
        } => {
            run_virtual(
                &handler,
                LargeOutputTool::Query,
                json!({"filename": filename, "query": query, "compact": compact, "raw": raw}),
            )
            .await?
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&handler.router().list_tools())?);
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Defaults, then the config file and environment, then flags.
async fn build_config(cli: &Cli) -> anyhow::Result<ToolOutputConfig> {
    let mut config = match &cli.config {
        Some(path) => ToolOutputConfig::load(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ToolOutputConfig::from_env(),
    };

    if let Some(folder) = &cli.output_folder {
        config.output_folder = folder.clone();
    }
    if let Some(session) = &cli.session {
        config.session_id = Some(session.clone());
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if cli.no_virtual_tools {
        config.virtual_tools_enabled = false;
    }
    // Commands that read back need a stable session directory.
    if config.session_id.is_none() {
        config.session_id = Some("default".to_string());
    }

    Ok(config)
}

async fn run_virtual(
    handler: &ToolOutputHandler,
    tool: LargeOutputTool,
    args: serde_json::Value,
) -> anyhow::Result<()> {
    match handler.router().dispatch(tool.name(), args).await {
        Ok(output) => {
            println!("{}", output.result);
            Ok(())
        }
        Err(error) => {
            eprintln!("{}", format!("{}: {}", tool.name(), error).red());
            Err(error.into())
        }
    }
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut payload = String::new();
        io::stdin()
            .read_to_string(&mut payload)
            .context("failed to read stdin")?;
        return Ok(payload);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}
