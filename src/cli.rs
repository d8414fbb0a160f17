use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::plate::ItemId;

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimate calories (and carbs/sugar) for a photographed meal", long_about = None)]
pub struct Cli {
    /// CSV file replacing the built-in reference table
    #[arg(long, global = true)]
    pub reference_table: Option<PathBuf>,

    /// Grams given to newly created line items
    #[arg(long, global = true)]
    pub default_portion: Option<f64>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the canonical foods of the reference table
    Keys,
    /// Build a plate, apply edits and print the JSON report
    Analyze {
        #[command(flatten)]
        source: PlateSource,
        #[command(flatten)]
        edits: PlateEdits,
    },
    /// Build a plate, then edit it interactively from stdin
    Session {
        #[command(flatten)]
        source: PlateSource,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlateSource {
    /// Photo of the meal to send to the recognition service
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Recognized food name, used instead of (or in addition to) a photo
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Show carbohydrates and sugar (Glucose Balance+)
    #[arg(long)]
    pub glucose_balance: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlateEdits {
    /// Add an item by canonical key
    #[arg(long = "add", value_name = "KEY")]
    pub add: Vec<String>,

    /// Bind an item to a canonical key, e.g. 2=white_rice
    #[arg(long = "resolve", value_name = "ID=KEY", value_parser = parse_assignment)]
    pub resolve: Vec<ItemAssignment>,

    /// Set the grams of an item, e.g. 1=150
    #[arg(long = "grams", value_name = "ID=GRAMS", value_parser = parse_assignment)]
    pub grams: Vec<ItemAssignment>,

    /// Remove an item
    #[arg(long = "remove", value_name = "ID")]
    pub remove: Vec<ItemId>,
}

/// `ID=VALUE` pair from the command line. The value is validated by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAssignment {
    pub id: ItemId,
    pub value: String,
}

fn parse_assignment(raw: &str) -> Result<ItemAssignment, String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", raw))?;
    let id = id
        .trim()
        .parse::<ItemId>()
        .map_err(|_| format!("'{}' is not an item id", id.trim()))?;
    Ok(ItemAssignment {
        id,
        value: value.trim().to_string(),
    })
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
