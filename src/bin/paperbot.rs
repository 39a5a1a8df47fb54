//! CLI binary for paperbot.
//!
//! `serve` runs the Discord bot; the other subcommands run one pipeline step
//! on a local file, which is handy for trying prompts and the PDF pipeline
//! without Discord.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperbot::{
    convert_pdf, render_html, run_bot, summarize_markdown, translate_markdown, BotConfig,
    ConversionJob, ConversionSettings, GeminiClient, PaginationOutcome,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"DISCORD COMMANDS (direct messages only):
  <paper>.pdf + "translate"   english.md, then japanese.md
  <paper>.md  + "translate"   japanese.md
  <paper>.md  + "summary"     result.md (Japanese summary)
  <paper>.md  + "slide"       result.md (English slides)
  <paper>.md  + "html"        result.html (images inlined)
  Replying to a message uses the replied-to message's attachment.

ENVIRONMENT:
  GOOGLE_API_KEY   Gemini API key (translate, summarize, serve)
  DISCORD_TOKEN    Discord bot token (serve)
  PDFIUM_LIB_PATH  Directory containing libpdfium
  RUST_LOG         Overrides --verbose / --quiet
  A .env file in the working directory is loaded first.
"#;

/// Translate and summarise PDF papers over Discord with Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "paperbot",
    version,
    about = "Translate and summarise PDF papers over Discord with Gemini",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, env = "PAPERBOT_GEMINI_BASE_URL", global = true)]
    gemini_base_url: Option<String>,

    /// Model for translation.
    #[arg(long, env = "PAPERBOT_TRANSLATION_MODEL", global = true)]
    translation_model: Option<String>,

    /// Model for summaries and slides.
    #[arg(long, env = "PAPERBOT_SUMMARY_MODEL", global = true)]
    summary_model: Option<String>,

    /// Root directory for images/ and debug/.
    #[arg(long, env = "PAPERBOT_WORKSPACE", default_value = ".", global = true)]
    workspace: PathBuf,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH", global = true)]
    pdfium_lib_path: Option<PathBuf>,

    /// Turns shorter than this many characters end the translation.
    #[arg(long, env = "PAPERBOT_MIN_PROGRESS_CHARS", default_value_t = 500, global = true)]
    min_progress_chars: usize,

    /// Seconds to wait between translation turns.
    #[arg(long, env = "PAPERBOT_CONTINUATION_DELAY", default_value_t = 30, global = true)]
    continuation_delay: u64,

    /// Upper bound on translation turns.
    #[arg(long, env = "PAPERBOT_MAX_TURNS", default_value_t = 64, global = true)]
    max_turns: usize,

    /// Upper bound on upload status polls (one per second).
    #[arg(long, env = "PAPERBOT_MAX_POLL_ATTEMPTS", default_value_t = 600, global = true)]
    max_poll_attempts: u32,

    /// Do not write debug/<job>.txt translation transcripts.
    #[arg(long, env = "PAPERBOT_NO_TRANSCRIPTS", global = true)]
    no_transcripts: bool,

    /// Enable debug logging.
    #[arg(short, long, env = "PAPERBOT_VERBOSE", global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, env = "PAPERBOT_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Discord bot until Ctrl-C.
    Serve {
        /// Discord bot token.
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        discord_token: Option<String>,
    },
    /// Convert a PDF to Markdown.
    Convert {
        input: PathBuf,
        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Translate a Markdown file into Japanese.
    Translate {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarise a Markdown file.
    Summarize {
        input: PathBuf,
        /// ja_summary or en_slide.
        #[arg(long, default_value = "ja_summary")]
        task: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a Markdown file to HTML with local images inlined.
    Html {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

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

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling");
                cancel.cancel();
            }
        });
    }

    match &cli.command {
        Command::Serve { discord_token } => {
            let mut config = build_config(&cli)?;
            config.discord_token = discord_token.clone();
            run_bot(config, cancel).await.context("Discord bot failed")?;
        }
        Command::Convert { input, output } => {
            let pdf = read_bytes(input)?;
            let job = ConversionJob::new(&cli.workspace, &job_id(input));
            let settings = ConversionSettings {
                pdfium_library_path: cli.pdfium_lib_path.clone(),
                ..ConversionSettings::default()
            };
            let markdown = convert_pdf(pdf, &job, &settings)
                .await
                .context("Conversion failed")?;
            write_output(output.as_deref(), &markdown)?;
        }
        Command::Translate { input, output } => {
            let config = build_config(&cli)?;
            let markdown = read_text(input)?;
            let client = GeminiClient::new(&config).context("Failed to create Gemini client")?;
            let translation = translate_markdown(&client, &markdown, &job_id(input), &config, &cancel)
                .await
                .context("Translation failed")?;
            if translation.outcome != PaginationOutcome::Completed {
                warn!(
                    "Translation ended {:?} after {} turns; output may be incomplete",
                    translation.outcome, translation.turns
                );
            }
            write_output(output.as_deref(), &translation.markdown)?;
        }
        Command::Summarize {
            input,
            task,
            output,
        } => {
            let config = build_config(&cli)?;
            let markdown = read_text(input)?;
            let client = GeminiClient::new(&config).context("Failed to create Gemini client")?;
            let summary = summarize_markdown(&client, &markdown, task, &job_id(input), &config, &cancel)
                .await
                .context("Summarisation failed")?;
            write_output(output.as_deref(), &summary)?;
        }
        Command::Html { input, output } => {
            let markdown = read_text(input)?;
            let html = render_html(&markdown, &cli.workspace).context("Rendering failed")?;
            write_output(output.as_deref(), &html)?;
        }
    }

    info!("Done");
    Ok(())
}

fn build_config(cli: &Cli) -> Result<BotConfig> {
    let mut builder = BotConfig::builder()
        .workspace_dir(&cli.workspace)
        .min_progress_chars(cli.min_progress_chars)
        .continuation_delay(Duration::from_secs(cli.continuation_delay))
        .max_turns(cli.max_turns)
        .max_poll_attempts(cli.max_poll_attempts)
        .debug_transcripts(!cli.no_transcripts);

    if let Some(ref key) = cli.api_key {
        builder = builder.gemini_api_key(key);
    }
    if let Some(ref url) = cli.gemini_base_url {
        builder = builder.gemini_base_url(url);
    }
    if let Some(ref model) = cli.translation_model {
        builder = builder.translation_model(model);
    }
    if let Some(ref model) = cli.summary_model {
        builder = builder.summary_model(model);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_library_path(path);
    }

    builder.build().context("Invalid configuration")
}

/// Job id for a local file: its stem.
fn job_id(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
