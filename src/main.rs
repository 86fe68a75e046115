//! rhetor CLI: argument analysis over first-order logic.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use rhetor::config::PipelineConfig;
use rhetor::error::RhetorResult;
use rhetor::fol::unicode_to_ascii;
use rhetor::pipeline::{AnalysisPipeline, Capabilities};

#[derive(Parser)]
#[command(name = "rhetor", version, about = "First-order argument analysis")]
struct Cli {
    /// Pipeline configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the Ollama completion service for conversion and enrichment.
    #[arg(long, global = true)]
    ollama: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a text and print the result as JSON.
    Analyze {
        /// Text to analyze.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Analysis context as a JSON value.
        #[arg(long)]
        context: Option<String>,
    },

    /// Convert a text to formulas and print the belief set.
    Convert {
        #[arg(long)]
        text: String,
    },

    /// Check whether a conclusion follows from premises.
    Validate {
        /// A premise formula. Repeat for several premises.
        #[arg(long = "premise", required = true)]
        premises: Vec<String>,

        #[arg(long)]
        conclusion: String,
    },

    /// Rewrite Unicode logic symbols into ASCII formula syntax.
    Normalize {
        formula: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Normalize { formula } = &cli.command {
        println!("{}", unicode_to_ascii(formula));
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(run(cli, config))
}

fn load_config(path: Option<&Path>) -> RhetorResult<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

async fn run(cli: Cli, config: PipelineConfig) -> Result<()> {
    let mut capabilities = Capabilities::offline();
    if cli.ollama {
        let llm_config = config.llm.clone().unwrap_or_default();
        capabilities = match capabilities.clone().with_ollama(llm_config).await {
            Ok(with_llm) => with_llm,
            Err(e) => {
                tracing::warn!(error = %e, "ollama not reachable, using rule-based conversion");
                capabilities
            }
        };
    }

    let pipeline = AnalysisPipeline::new(capabilities, config);

    match cli.command {
        Commands::Analyze {
            text,
            file,
            context,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path).into_diagnostic()?,
                (None, None) => miette::bail!("provide --text or --file"),
            };
            let context: Option<serde_json::Value> = context
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .into_diagnostic()?;

            let result = pipeline.analyze(&text, context.as_ref()).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&result).into_diagnostic()?
            );
        }

        Commands::Convert { text } => {
            let conversion = pipeline.converter().convert(&text).await;
            for step in conversion.trace() {
                tracing::info!("{step}");
            }
            println!("{}", conversion.document.render());
        }

        Commands::Validate {
            premises,
            conclusion,
        } => {
            let valid = pipeline.validate_argument(premises.as_slice(), &conclusion).await;
            println!("{}", if valid { "valid" } else { "invalid" });
        }

        Commands::Normalize { .. } => {}
    }

    Ok(())
}
