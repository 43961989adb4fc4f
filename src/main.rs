use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use video_collage::{CollageBuilder, Config, PadColor};

#[derive(Parser)]
#[command(
    name = "video-collage",
    version,
    about = "Stitch three videos into one side-by-side comparison video",
    long_about = "Video-Collage scales three videos to a common height, places them side by side \
                  with optional separators, and encodes the result. Shorter inputs are shown as \
                  solid panels until the longest one ends."
)]
struct Cli {
    /// The three input videos, left to right
    #[arg(num_args = 3, required = true, value_names = ["LEFT", "MIDDLE", "RIGHT"])]
    inputs: Vec<PathBuf>,

    /// Output video file path (parent directories are created)
    #[arg(short, long)]
    output: PathBuf,

    /// Common panel height (default: smallest input height)
    #[arg(long)]
    height: Option<u32>,

    /// Separator width in pixels between panels
    #[arg(short, long)]
    pad: Option<u32>,

    /// Separator and filler color (#RRGGBB or R,G,B)
    #[arg(long)]
    pad_color: Option<PadColor>,

    /// Output frame rate (default: slowest input rate)
    #[arg(long)]
    fps: Option<f64>,

    /// Four-character codec code (mp4v, avc1, mjpg, ...) or ffmpeg encoder name
    #[arg(long)]
    codec: Option<String>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the resolved configuration (file plus overrides) to this TOML file
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Configuration file (or defaults) with command line overrides applied
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => {
                info!("Loading configuration from {:?}", config_path);
                Config::from_file(config_path)
                    .map_err(|e| anyhow::anyhow!(e.user_message()))?
            }
            None => Config::default(),
        };

        if let Some(height) = self.height {
            config.layout.target_height = Some(height);
        }
        if let Some(pad) = self.pad {
            config.layout.pad_px = pad;
        }
        if let Some(color) = self.pad_color {
            config.layout.pad_color = color;
        }
        if let Some(fps) = self.fps {
            config.output.force_fps = Some(fps);
        }
        if let Some(codec) = &self.codec {
            config.output.codec = codec.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the summary
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Video-Collage v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.resolve_config()?;
    if let Some(path) = &cli.save_config {
        config
            .save_to_file(path)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        info!("Configuration saved to {:?}", path);
    }
    let inputs: [PathBuf; 3] = cli
        .inputs
        .clone()
        .try_into()
        .map_err(|_| anyhow::anyhow!("exactly three input videos are required"))?;
    let output = cli.output.clone();

    // The collage loop is blocking and strictly sequential
    let builder = CollageBuilder::new(config);
    let summary = tokio::task::spawn_blocking(move || builder.build(inputs, output))
        .await
        .context("collage worker panicked")?
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_overrides_are_saved_and_reload() {
        let dir = tempdir().unwrap();
        let saved = dir.path().join("collage.toml");

        let cli = Cli::try_parse_from([
            "video-collage", "a.mp4", "b.mp4", "c.mp4",
            "-o", "out.mp4",
            "--pad", "12",
            "--pad-color", "#202020",
            "--fps", "24",
            "--save-config", saved.to_str().unwrap(),
        ])
        .unwrap();

        let config = cli.resolve_config().unwrap();
        config.save_to_file(cli.save_config.as_ref().unwrap()).unwrap();

        let reloaded = Config::from_file(&saved).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.layout.pad_px, 12);
        assert_eq!(reloaded.layout.pad_color, PadColor([32, 32, 32]));
        assert_eq!(reloaded.output.force_fps, Some(24.0));
    }

    #[test]
    fn test_config_file_is_overridden_by_flags() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("base.toml");
        std::fs::write(&file, "[layout]\npad_px = 4\ntarget_height = 480\n").unwrap();

        let cli = Cli::try_parse_from([
            "video-collage", "a.mp4", "b.mp4", "c.mp4",
            "-o", "out.mp4",
            "-c", file.to_str().unwrap(),
            "--pad", "8",
        ])
        .unwrap();

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.layout.pad_px, 8);
        assert_eq!(config.layout.target_height, Some(480));
        assert!(cli.save_config.is_none());
    }

    #[test]
    fn test_exactly_three_inputs_required() {
        assert!(Cli::try_parse_from(["video-collage", "a.mp4", "b.mp4", "-o", "out.mp4"]).is_err());
    }
}
