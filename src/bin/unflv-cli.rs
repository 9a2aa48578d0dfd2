use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use unflv::{
    AudioFormat, ContainerInfo, ExtractOptions, FlvFile, FlvProbe, ProgressCallback,
    ProgressInfo,
};

const CLI_AFTER_HELP: &str = "Examples:\n  unflv extract download.flv\n  unflv extract download.flv --out music/song --progress --overwrite\n  unflv probe download.flv --json\n  unflv completions zsh > _unflv";

#[derive(Debug, Parser)]
#[command(
    name = "unflv",
    version,
    about = "Extract the audio track of FLV files as AAC or MP3",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while extracting.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the audio track next to the input.
    #[command(
        about = "Extract the audio track",
        after_help = "Examples:\n  unflv extract download.flv\n  unflv extract download.flv --out song"
    )]
    Extract {
        /// Input FLV path.
        input: PathBuf,
        /// Output path without extension; `.aac` or `.mp3` is appended.
        /// Defaults to the input path without its extension.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print container information.
    #[command(
        about = "Print container information",
        visible_alias = "info",
        after_help = "Examples:\n  unflv probe download.flv\n  unflv probe download.flv --json"
    )]
    Probe {
        /// Input FLV path.
        input: PathBuf,

        /// Output information as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init();
}

/// The input path with its extension removed.
fn default_output_prefix(input: &Path) -> PathBuf {
    input.with_extension("")
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn probe_json(info: &ContainerInfo) -> serde_json::Value {
    json!({
        "file_size": info.file_size,
        "header_size": info.header_size,
        "has_audio_flag": info.has_audio_flag,
        "has_video_flag": info.has_video_flag,
        "tags": {
            "audio": info.audio_tags,
            "video": info.video_tags,
            "script": info.script_tags,
            "other": info.other_tags,
        },
        "sound_format": info.sound_format.map(|format| format.name()),
        "audio_format": info.audio_format.map(|format| format.to_string()),
        "duration_ms": info.duration_ms,
        "truncated": info.truncated,
    })
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(u64::from(info.percentage));
        self.bar.set_message(format!(
            "{}/{} bytes",
            info.bytes_read, info.total_bytes
        ));
    }
}

fn extract(
    input: &Path,
    out: Option<PathBuf>,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let prefix = out.unwrap_or_else(|| default_output_prefix(input));

    // The extension depends on the codec, so read up to the first audio tag
    // before writing. Unsupported or missing audio is reported by the
    // extraction itself.
    let format = FlvProbe::sound_format(input)?
        .and_then(|sound_format| AudioFormat::from_sound_format(sound_format).ok());
    if let Some(format) = format {
        ensure_writable_path(&format.output_path(&prefix), global.overwrite)?;
    }

    let mut options = ExtractOptions::new();
    let progress = if global.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    let result = FlvFile::open(input)?.extract_audio_with_options(&prefix, &options);
    if let Some(progress) = &progress {
        progress.bar.finish_and_clear();
    }
    let report = result?;

    for warning in &report.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning.to_string().yellow());
    }
    if report.truncated {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "input ends with an incomplete tag".yellow()
        );
    }
    println!(
        "{} {} audio to {}",
        "extracted".green().bold(),
        report.format,
        report.output_path.display()
    );
    if global.verbose {
        println!(
            "{} audio chunks, last timestamp {} ms",
            report.audio_chunks, report.last_timestamp
        );
    }

    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Extract { input, out } => extract(&input, out, &cli.global)?,
        Commands::Probe { input, json } => {
            let info = FlvProbe::probe(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&probe_json(&info))?);
            } else {
                println!("{}", input.display().to_string().bold());
                println!("{info}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "unflv", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn default_prefix_strips_extension() {
        assert_eq!(
            default_output_prefix(Path::new("videos/clip.flv")),
            PathBuf::from("videos/clip")
        );
        assert_eq!(default_output_prefix(Path::new("clip")), PathBuf::from("clip"));
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("clip.aac");
        assert!(ensure_writable_path(&path, false).is_ok());

        fs::write(&path, b"old").unwrap();
        assert!(ensure_writable_path(&path, false).is_err());
        assert!(ensure_writable_path(&path, true).is_ok());
    }

    #[test]
    fn parses_extract_arguments() {
        let cli = Cli::try_parse_from(["unflv", "extract", "in.flv", "--out", "song", "--progress"])
            .unwrap();
        assert!(cli.global.progress);
        match cli.command {
            Commands::Extract { input, out } => {
                assert_eq!(input, PathBuf::from("in.flv"));
                assert_eq!(out, Some(PathBuf::from("song")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
