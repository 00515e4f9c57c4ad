//! CLI binary for medscan-report.
//!
//! A thin shim over the library boundaries: each subcommand maps flags to
//! `MedScanConfig`, calls one boundary and prints the payload.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use medscan_report::{
    analyze_upload, export_to_file, health, preview_upload, AnalysisOutput, ExitCleanup,
    ExportRequest, MedScanConfig, RawUpload, DOCX_FILENAME,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview a DICOM slice as a 500 px PNG
  medscan preview chest.dcm -o chest.png

  # Analyse an X-ray and save the markdown
  medscan analyze knee.jpg -o knee.md

  # Analyse and produce the Word report in one go
  medscan analyze chest.dcm --docx chest.docx

  # Keep the JSON payload, export later
  medscan analyze chest.dcm --json > analysis.json
  medscan export --payload analysis.json -o report.docx

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY     Credential for the analysis provider
  GOOGLE_API_KEY     Fallback credential name
  MEDSCAN_PROVIDER   Provider name (default: gemini)
  MEDSCAN_MODEL      Model ID (default: gemini-2.0-flash)
  RUST_LOG           Overrides the log filter
"#;

/// Analyse medical images with a vision LLM and export DOCX reports.
#[derive(Parser, Debug)]
#[command(
    name = "medscan",
    version,
    about = "Analyse medical images (DICOM, PNG, JPEG) with a vision LLM and export DOCX reports",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Width in pixels of the normalised image.
    #[arg(long, global = true, env = "MEDSCAN_WIDTH", default_value_t = 500)]
    width: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MEDSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MEDSCAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode and resize an image, print its PNG data URI.
    Preview {
        /// DICOM (.dcm/.dicom) or raster image file.
        input: PathBuf,

        /// Write the resized PNG here instead of printing the data URI.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the JSON payload.
        #[arg(long)]
        json: bool,
    },

    /// Analyse an image with the vision model.
    Analyze {
        /// DICOM (.dcm/.dicom) or raster image file.
        input: PathBuf,

        /// Write the markdown analysis to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the JSON payload (analysis + image data URI + stats).
        #[arg(long)]
        json: bool,

        /// Also export the report to this DOCX file.
        #[arg(long)]
        docx: Option<PathBuf>,

        /// Model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
        #[arg(long, env = "MEDSCAN_MODEL")]
        model: Option<String>,

        /// Provider: gemini, openai, anthropic or openrouter.
        #[arg(long, env = "MEDSCAN_PROVIDER")]
        provider: Option<String>,

        /// Give up on the model call after this many seconds.
        #[arg(long, env = "MEDSCAN_TIMEOUT")]
        timeout: Option<u64>,
    },

    /// Build the DOCX report from an analysis and its image.
    Export {
        /// Markdown analysis file.
        #[arg(long, conflicts_with = "payload", required_unless_present = "payload")]
        analysis: Option<PathBuf>,

        /// Image file (already-normalised PNG, or any supported image).
        #[arg(long, conflicts_with = "payload", required_unless_present = "payload")]
        image: Option<PathBuf>,

        /// JSON payload from `medscan analyze --json`.
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Output DOCX path.
        #[arg(short, long, default_value = DOCX_FILENAME)]
        output: PathBuf,
    },

    /// Report whether the analysis provider is configured.
    Health {
        /// Print the JSON payload.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _exit_cleanup = ExitCleanup;

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let env = MedScanConfig::from_env();

    match cli.command {
        Command::Preview {
            ref input,
            ref output,
            json,
        } => {
            let config = build_config(env, cli.width, None, None)?;
            run_preview(input, output.as_deref(), json, &config).await
        }
        Command::Analyze {
            ref input,
            ref output,
            json,
            ref docx,
            ref model,
            ref provider,
            timeout,
        } => {
            let config = build_config(env, cli.width, model.as_deref(), provider.as_deref())?;
            let opts = AnalyzeOpts {
                output: output.as_deref(),
                json,
                docx: docx.as_deref(),
                timeout,
                quiet: cli.quiet,
            };
            run_analyze(input, opts, &config).await
        }
        Command::Export {
            ref analysis,
            ref image,
            ref payload,
            ref output,
        } => {
            let request =
                build_export_request(analysis.as_deref(), image.as_deref(), payload.as_deref())
                    .await?;
            let config = build_config(env, cli.width, None, None)?;
            export_to_file(&request, output, &config)
                .await
                .context("Export failed")?;
            if !cli.quiet {
                eprintln!(
                    "{} Report written to {}",
                    green("✔"),
                    bold(&output.display().to_string())
                );
            }
            Ok(())
        }
        Command::Health { json } => {
            let status = health(&env);
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if status.api_configured {
                println!("{} analysis provider configured", green("✔"));
            } else {
                println!(
                    "{} analysis provider not configured (set GEMINI_API_KEY)",
                    red("✘")
                );
            }
            Ok(())
        }
    }
}

/// Layer CLI flags over the environment and validate the result.
fn build_config(
    env: MedScanConfig,
    width: u32,
    model: Option<&str>,
    provider: Option<&str>,
) -> Result<MedScanConfig> {
    let mut builder = MedScanConfig::builder()
        .provider_name(provider.map_or(env.provider_name, str::to_string))
        .model(model.map_or(env.model, str::to_string))
        .preview_width(width);
    if let Some(key) = env.api_key {
        builder = builder.api_key(key);
    }
    builder.build().context("Invalid configuration")
}

async fn read_upload(path: &Path) -> Result<RawUpload> {
    RawUpload::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn run_preview(
    input: &Path,
    output: Option<&Path>,
    json: bool,
    config: &MedScanConfig,
) -> Result<()> {
    let upload = read_upload(input).await?;
    let preview = preview_upload(Some(upload), config)
        .await
        .context("Preview failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else if let Some(path) = output {
        let (_, png) = medscan_report::pipeline::encode::parse_data_uri(&preview.preview)?;
        tokio::fs::write(path, png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        println!("{}", preview.preview);
    }
    Ok(())
}

struct AnalyzeOpts<'a> {
    output: Option<&'a Path>,
    json: bool,
    docx: Option<&'a Path>,
    timeout: Option<u64>,
    quiet: bool,
}

async fn run_analyze(input: &Path, opts: AnalyzeOpts<'_>, config: &MedScanConfig) -> Result<()> {
    let upload = read_upload(input).await?;

    let spinner = (!opts.quiet).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Analysing");
        bar.set_message(input.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let call = analyze_upload(Some(upload), config);
    let result = match opts.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .with_context(|| format!("Analysis timed out after {secs}s"))?,
        None => call.await,
    };
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let output: AnalysisOutput = result.context("Analysis failed")?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(path) = opts.output {
        tokio::fs::write(path, &output.analysis)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.analysis.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if let Some(path) = opts.docx {
        export_to_file(&ExportRequest::from(&output), path, config)
            .await
            .context("Export failed")?;
    }

    if !opts.quiet {
        eprintln!(
            "{} analysed in {}ms   {} tokens in  /  {} tokens out",
            green("✔"),
            output.stats.duration_ms,
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
        );
        if let Some(path) = opts.docx {
            eprintln!("   report → {}", bold(&path.display().to_string()));
        }
    }
    Ok(())
}

/// Assemble the export request from either a JSON payload or two files.
async fn build_export_request(
    analysis: Option<&Path>,
    image: Option<&Path>,
    payload: Option<&Path>,
) -> Result<ExportRequest> {
    if let Some(path) = payload {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&json)
            .with_context(|| format!("{} is not an analysis payload", path.display()));
    }

    let analysis = match analysis {
        Some(p) => Some(
            tokio::fs::read_to_string(p)
                .await
                .with_context(|| format!("Failed to read {}", p.display()))?,
        ),
        None => None,
    };
    let image_base64 = match image {
        Some(p) => {
            let bytes = tokio::fs::read(p)
                .await
                .with_context(|| format!("Failed to read {}", p.display()))?;
            let img = image::load_from_memory(&bytes)
                .with_context(|| format!("{} is not a readable image", p.display()))?;
            Some(medscan_report::pipeline::encode::to_data_uri(&img)?)
        }
        None => None,
    };
    Ok(ExportRequest {
        analysis,
        image_base64,
    })
}
