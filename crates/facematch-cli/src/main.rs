use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facematch_core::gallery::load_rgb;
use facematch_core::{
    default_model_dir, recognize_image, Gallery, GalleryOptions, OnnxBackend, StrategyKind,
    DEFAULT_MATCH_THRESHOLD,
};

#[derive(Parser)]
#[command(name = "facematch", about = "facematch offline tools — inspect galleries, recognize local images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, default_value_os_t = default_model_dir())]
    model_dir: PathBuf,
    /// Skip gallery images that cannot be decoded instead of failing
    #[arg(long)]
    skip_unreadable: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a gallery directory and list the records it yields
    Gallery {
        /// Root directory, one subdirectory per identity
        dir: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Recognize the faces in a local image file
    Recognize {
        /// Image to analyze
        image: PathBuf,
        /// Root directory of the known-faces gallery
        #[arg(short, long)]
        gallery: PathBuf,
        /// Cosine similarity threshold for a positive match
        #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f32,
        /// Match strategy: first or nearest
        #[arg(long, default_value_t = StrategyKind::First)]
        strategy: StrategyKind,
        #[command(flatten)]
        models: ModelArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gallery { dir, models } => {
            let gallery = load_gallery(&dir, &models, &mut load_backend(&models)?)?;
            for record in gallery.records() {
                println!("{:<24} {}", record.label, record.source.display());
            }
            println!(
                "{} records, {} identities",
                gallery.len(),
                gallery.identity_count()
            );
        }
        Commands::Recognize {
            image,
            gallery,
            threshold,
            strategy,
            models,
        } => {
            let mut backend = load_backend(&models)?;
            let known = load_gallery(&gallery, &models, &mut backend)?;
            let strategy = strategy.build(threshold);

            let rgb = load_rgb(&image).with_context(|| format!("loading {}", image.display()))?;
            let faces = recognize_image(&mut backend, &known, strategy.as_ref(), &rgb)?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "faces": faces }))?);
        }
    }

    Ok(())
}

fn load_backend(models: &ModelArgs) -> Result<OnnxBackend> {
    OnnxBackend::load(&models.model_dir)
        .with_context(|| format!("loading models from {}", models.model_dir.display()))
}

fn load_gallery(dir: &Path, models: &ModelArgs, backend: &mut OnnxBackend) -> Result<Gallery> {
    let options = GalleryOptions {
        skip_unreadable: models.skip_unreadable,
    };
    Gallery::scan(dir, backend, options).with_context(|| format!("scanning gallery {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_recognize_defaults() {
        let cli = Cli::parse_from(["facematch", "recognize", "photo.jpg", "--gallery", "known_faces"]);
        match cli.command {
            Commands::Recognize { threshold, strategy, models, .. } => {
                assert_eq!(threshold, DEFAULT_MATCH_THRESHOLD);
                assert_eq!(strategy, StrategyKind::First);
                assert_eq!(models.model_dir, default_model_dir());
                assert!(!models.skip_unreadable);
            }
            Commands::Gallery { .. } => panic!("parsed the wrong subcommand"),
        }
    }
}
