use anyhow::{Context, Result};
use plate_nutri::cli::{parse_args, Command, PlateEdits, PlateSource};
use plate_nutri::config::AppConfig;
use plate_nutri::food_recognizer::{FoodRecognizer, RecognizedFood};
use plate_nutri::plate::{parse_grams, NutritionEngine, PlateState};
use plate_nutri::reference::{self, load_reference_file, ReferenceTable};
use plate_nutri::session::run_session;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the reference table once and installs it for the lifetime of the process.
fn load_reference_table(config: &AppConfig) -> Result<&'static ReferenceTable> {
    match &config.reference_table {
        Some(path) => {
            info!("Loading reference table from {:?}", path);
            let entries = load_reference_file(path)?;
            let table = ReferenceTable::from_entries(entries)
                .with_context(|| format!("Invalid reference table {:?}", path))?;
            Ok(reference::install_global(table))
        }
        None => reference::global_table().context("Failed to load the built-in reference table"),
    }
}

/// Recognizes the photo (if any), appends names given on the command line, and reconciles.
async fn build_plate(engine: &NutritionEngine<'_>, config: &AppConfig, source: &PlateSource) -> Result<PlateState> {
    let mut foods: Vec<RecognizedFood> = Vec::new();

    if let Some(image) = &source.image {
        let recognizer = FoodRecognizer::new(&config.api_key_env_var, &config.vision_model, config.max_image_bytes);
        let recognized = recognizer
            .recognize_image(image)
            .await
            .with_context(|| format!("Food recognition failed for {:?}", image))?;
        foods.extend(recognized);
    }
    foods.extend(source.names.iter().map(RecognizedFood::named));

    Ok(engine.reconcile_detections(foods).with_glucose_balance(source.glucose_balance))
}

/// Applies command-line edits in order: add, resolve, grams, remove.
/// A rejected edit is reported and skipped; the plate keeps its previous state.
fn apply_edits(engine: &NutritionEngine<'_>, plate: &mut PlateState, edits: &PlateEdits) {
    for key in &edits.add {
        if let Err(e) = engine.add_item(plate, key) {
            warn!("Skipping --add {}: {}", key, e);
        }
    }
    for assignment in &edits.resolve {
        if let Err(e) = engine.resolve_unmatched(plate, assignment.id, &assignment.value) {
            warn!("Skipping --resolve {}={}: {}", assignment.id, assignment.value, e);
        }
    }
    for assignment in &edits.grams {
        let result = parse_grams(&assignment.value).and_then(|grams| engine.set_grams(plate, assignment.id, grams));
        if let Err(e) = result {
            warn!("Skipping --grams {}={}: {}", assignment.id, assignment.value, e);
        }
    }
    for id in &edits.remove {
        if let Err(e) = engine.remove_item(plate, *id) {
            warn!("Skipping --remove {}: {}", id, e);
        }
    }
}

fn print_keys(table: &ReferenceTable) {
    println!("{:<16} {:<18} {:>8} {:>9} {:>9}", "KEY", "LABEL", "KCAL", "CARBS_G", "SUGAR_G");
    for entry in table.entries() {
        println!(
            "{:<16} {:<18} {:>8.0} {:>9.1} {:>9.1}",
            entry.key, entry.label, entry.kcal_per_100g, entry.carbs_per_100g, entry.sugar_per_100g
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys and overrides

    let cli = parse_args();
    init_tracing(cli.verbose);

    let mut config = AppConfig::from_env()?;
    config.apply_cli(&cli)?;

    let table = load_reference_table(&config)?;
    let engine = NutritionEngine::with_default_portion(table, config.default_portion_g)?;

    match &cli.command {
        Command::Keys => print_keys(table),
        Command::Analyze { source, edits } => {
            let mut plate = build_plate(&engine, &config, source).await?;
            apply_edits(&engine, &mut plate, edits);
            let report = engine.recompute(&plate);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Session { source } => {
            let plate = build_plate(&engine, &config, source).await?;
            let stdin = BufReader::new(tokio::io::stdin());
            let plate = run_session(&engine, plate, stdin, tokio::io::stdout()).await?;
            info!(
                "Session ended with {} item(s), {} unresolved",
                plate.items().len(),
                plate.unresolved_count()
            );
        }
    }

    Ok(())
}
