use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod protocol;
mod render;

#[derive(Parser)]
#[command(name = "faceveil", about = "Faceveil demo renderer and catalog tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in target faces.
    Presets,
    /// Render a composited demo sequence to PNG frames.
    Render(render::RenderArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Presets => {
            for face in faceveil_presets::builtin_faces()? {
                println!(
                    "{:<6} {:<6} image {:>6} B  thumbnail {:>5} B",
                    face.id,
                    face.name,
                    face.image_url.len(),
                    face.thumbnail_url.len()
                );
            }
            Ok(())
        }
        Command::Render(args) => render::run(args).await,
    }
}
