//! Model Rasterizer CLI
//!
//! Render resource-pack models to PNG images.

use clap::{Parser, Subcommand};
use model_rasterizer::model::PredicateKey;
use model_rasterizer::{
    DisplaySlot, ModelRenderer, PackType, RenderCache, RenderRequest, ResourceManager,
    RuntimeConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "model-rasterizer")]
#[command(author, version, about = "Render resource pack models to images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a model to a PNG image
    Render {
        /// Model resource location (e.g. "minecraft:item/diamond_sword")
        #[arg(short, long)]
        model: String,

        /// Resource packs in priority order, lowest first (ZIP or directory)
        #[arg(short = 'p', long = "pack", required = true)]
        packs: Vec<PathBuf>,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Output width in pixels
        #[arg(long, default_value = "256")]
        width: u32,

        /// Output height in pixels
        #[arg(long, default_value = "256")]
        height: u32,

        /// Display slot to render for
        #[arg(short, long, default_value = "gui")]
        display: String,

        /// Predicate values as key=value pairs (e.g. "damage=0.5")
        #[arg(long, value_parser = parse_predicate)]
        predicate: Vec<(PredicateKey, f64)>,

        /// Render with the enchantment glint
        #[arg(long)]
        enchanted: bool,

        /// Treat packs as legacy (pre-flattening) format
        #[arg(long)]
        legacy: bool,

        /// Worker threads for face baking
        #[arg(long, default_value = "4")]
        threads: usize,
    },

    /// Show information about resource packs
    Info {
        /// Resource packs in priority order, lowest first (ZIP or directory)
        #[arg(short = 'p', long = "pack", required = true)]
        packs: Vec<PathBuf>,
    },
}

fn parse_predicate(s: &str) -> Result<(PredicateKey, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid predicate format: '{s}'. Use key=value"))?;
    let key: PredicateKey = serde_json::from_value(serde_json::Value::String(key.to_string()))
        .map_err(|_| format!("Unknown predicate key: '{key}'"))?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("Invalid predicate value: '{value}'"))?;
    Ok((key, value))
}

fn parse_display(s: &str) -> Result<DisplaySlot, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("Unknown display slot: '{s}'"))
}

fn load_packs(packs: &[PathBuf]) -> Result<ResourceManager, Box<dyn std::error::Error>> {
    let config = Arc::new(RuntimeConfig::default());
    let mut manager = ResourceManager::new(config);
    manager.register_registry(Arc::new(RenderCache::new()));
    for (i, pack) in packs.iter().enumerate() {
        let pack_type = if i == 0 {
            PackType::BuiltIn
        } else {
            PackType::Local
        };
        let info = manager.load_pack(pack, pack_type, i == 0)?;
        if !info.status {
            eprintln!(
                "warning: pack {} rejected: {}",
                info.name,
                info.rejection_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
    Ok(manager)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            model,
            packs,
            output,
            width,
            height,
            display,
            predicate,
            enchanted,
            legacy,
            threads,
        } => {
            let display = parse_display(&display)?;
            let manager = load_packs(&packs)?;
            let renderer = ModelRenderer::new(manager.config().clone(), move || threads);

            let mut request = RenderRequest::new(width, height, &manager, model, display)
                .with_legacy(legacy)
                .with_enchanted(enchanted);
            for (key, value) in predicate {
                request = request.with_predicate(key, value);
            }

            let result = renderer.render(&request)?;
            renderer.close();
            match result.image() {
                Some(image) => {
                    image.save(&output)?;
                    println!("Rendered to {}", output.display());
                }
                None => {
                    eprintln!(
                        "Render rejected: {}",
                        result.rejection_reason().unwrap_or("unknown")
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Info { packs } => {
            let manager = load_packs(&packs)?;
            for info in manager.pack_infos() {
                let status = if info.status { "ok" } else { "rejected" };
                println!("{} [{status}] format={}", info.name, info.pack_format);
                if let Some(description) = &info.description {
                    println!("  description: {}", description.plain);
                }
                if let Some(reason) = &info.rejection_reason {
                    println!("  reason: {reason}");
                }
                for filter in &info.filters {
                    println!(
                        "  filter: namespace={} path={}",
                        filter.namespace_pattern, filter.path_pattern
                    );
                }
            }
            println!(
                "{} models, {} textures, {} fonts, {} language tables",
                manager.models().len(),
                manager.textures().len(),
                manager.fonts().len(),
                manager.languages().len()
            );
        }
    }

    Ok(())
}
