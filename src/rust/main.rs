use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use carprice::{App, AppConfig, ConfiguredRegistry, FormInput, ModelVariant, PageResponse};
use clap::{Parser, Subcommand};
use log::info;

#[derive(Parser)]
#[command(author, version, about = "Car selling-price predictor", long_about = None)]
struct Args {
    /// Force a fresh download of the registry model
    #[arg(short, long, global = true)]
    fresh: bool,

    /// Directory holding the model and scaler files
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Reference dataset CSV used for similar cars
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Number of similar cars to show
    #[arg(long, global = true)]
    neighbors: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit the form of one prediction page
    Predict {
        /// a1 (old), a2 (new) or a3
        #[arg(long, default_value = "a1")]
        variant: ModelVariant,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        max_power: Option<String>,
        #[arg(long)]
        mileage: Option<String>,
        #[arg(long)]
        engine: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what each page has loaded
    Info,
}

fn print_response(response: &PageResponse) {
    println!("{}", response.message);
    for warning in &response.warnings {
        println!("warning: {}", warning);
    }
    if response.similar.is_empty() {
        return;
    }

    println!("\nSimilar cars:");
    println!(
        "{:<12} {:<40} {:>6} {:>10} {:<10} {:<12} {:<22} {:>14}",
        "brand", "name", "year", "km_driven", "fuel", "transmission", "owner", "selling_price"
    );
    for car in &response.similar {
        let record = &car.record;
        println!(
            "{:<12} {:<40} {:>6} {:>10} {:<10} {:<12} {:<22} {:>14}",
            record.brand,
            record.name,
            record.year,
            record.km_driven.map(|v| v.to_string()).unwrap_or_default(),
            record.fuel,
            record.transmission,
            record.owner,
            record.selling_price.map(carprice::predictor::format_thousands).unwrap_or_default(),
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = args.models_dir {
        config.models_dir = dir;
    }
    if let Some(path) = args.data {
        config.data_path = Some(path);
    }
    if let Some(neighbors) = args.neighbors {
        config.neighbors = neighbors;
    }

    let registry = config.registry.client().context("Failed to set up the model registry")?;
    if args.fresh {
        if let ConfiguredRegistry::Http(http) = &registry {
            info!("Fresh download requested - removing any cached model...");
            http.remove_cached(&config.registry.model_name, config.registry.model_version)?;
        }
    }

    let start_time = Instant::now();
    let app = App::load(&config, &registry)
        .await
        .with_context(|| format!("Failed to load models from {:?}", config.models_dir))?;
    info!("=== Predictors loaded (took {:.2?}) ===", start_time.elapsed());

    match args.command {
        Command::Predict {
            variant,
            year,
            max_power,
            mileage,
            engine,
            brand,
            json,
        } => {
            let form = FormInput {
                year,
                max_power,
                mileage,
                engine,
                brand,
            };
            let response = app.handle(variant, 1, &form);
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Command::Info => {
            for variant in ModelVariant::ALL {
                let details = variant.info();
                let state = app.predictor(variant).info();
                println!("{} ({}) at {}", details.title, details.name, details.path);
                println!("  columns: {}", state.columns.join(", "));
                println!("  scaled:  {}", state.scaler_order.join(", "));
                match state.unavailable_reason {
                    Some(reason) => println!("  model:   unavailable ({})", reason),
                    None => println!("  model:   loaded"),
                }
                println!("  similar: {} of {} reference rows", state.neighbors, state.reference_rows);
            }
        }
    }

    Ok(())
}
