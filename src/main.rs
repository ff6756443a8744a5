use clap::{Parser, Subcommand};
use layer_review::{Config, ReportFormat, Reporter, Reviewer};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "layer-review")]
#[command(about = "Layer-aware code review for whole projects or single files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a project directory or a single file
    Review {
        /// Directory or file to review
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Source file extension to review (overrides the config file)
        #[arg(short, long)]
        extension: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./review-output")]
        output: PathBuf,

        /// Number of files reviewed concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip LLM-backed classification and validators
        #[arg(long)]
        skip_llm: bool,

        /// Report format to export
        #[arg(long, value_enum, default_value = "all")]
        format: ReportFormat,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.layer-review.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Review {
            path,
            extension,
            config,
            output,
            workers,
            skip_llm,
            format,
            verbose,
        } => {
            init_tracing(verbose);
            review_project(path, extension, config, output, workers, skip_llm, format)?;
        }
        Commands::Config { output } => {
            init_tracing(false);
            generate_config(output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn review_project(
    target_path: PathBuf,
    extension: Option<String>,
    config_path: Option<PathBuf>,
    output_path: PathBuf,
    workers: Option<usize>,
    skip_llm: bool,
    format: ReportFormat,
) -> anyhow::Result<()> {
    println!("🚀 Starting layer review");
    println!("========================");

    let start_time = Instant::now();

    let mut config = match config_path {
        Some(config_path) => Config::from_file(&config_path)?,
        None => Config::load()?,
    };
    if let Some(extension) = extension {
        config.extension = extension;
    }

    println!("🎯 Target: {}", target_path.display());
    println!("📤 Output directory: {}", output_path.display());
    if skip_llm {
        println!("⚡ Skipping LLM-backed checks (local-only mode)");
    }

    let mut reviewer = Reviewer::from_config(&config, skip_llm)?;
    if let Some(workers) = workers {
        reviewer = reviewer.with_workers(workers);
    }

    let report = reviewer.review(&target_path, &config.extension)?;
    let duration = start_time.elapsed();

    report.print_summary();

    println!("\n📊 Generating reports...");
    let exported_files = Reporter::new().export_report(&report, &output_path, format)?;

    println!("\n✅ Review completed in {:.2}s", duration.as_secs_f64());
    println!("📁 Reports exported to:");
    for file in exported_files {
        println!("   - {}", file.display());
    }

    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("layer-review.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());
    std::fs::write(&config_path, Config::create_documented_config())?;

    println!("✅ Configuration file created successfully!");
    println!();
    println!("🔧 Key configuration areas:");
    println!("  • LLM provider settings (OpenAI, Anthropic, Ollama)");
    println!("  • Layers and the keywords that identify them");
    println!("  • Validators, worker count and forbidden dependencies");

    Ok(())
}
