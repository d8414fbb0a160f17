use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

use super::table::ReferenceEntry;

// Expected column headers
const KEY_COL: &str = "key";
const LABEL_COL: &str = "label";
const KCAL_COL: &str = "kcal_per_100g";
const CARBS_COL: &str = "carbs_per_100g";
const SUGAR_COL: &str = "sugar_per_100g";
const ALIASES_COL: &str = "aliases";

const ALIAS_SEPARATOR: char = '|';

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
}

fn parse_nutrient(record: &StringRecord, idx: usize, column: &str, row: usize) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse::<f64>()
        .map_err(|_| anyhow::anyhow!("Invalid value '{}' in column '{}' at row {}", raw, column, row))
}

/// Reads reference entries from CSV text. Rows with an empty key are skipped.
pub fn load_reference_entries<R: Read>(reader: R) -> Result<Vec<ReferenceEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();

    let key_idx = column_index(&headers, KEY_COL)?;
    let label_idx = column_index(&headers, LABEL_COL)?;
    let kcal_idx = column_index(&headers, KCAL_COL)?;
    let carbs_idx = column_index(&headers, CARBS_COL)?;
    let sugar_idx = column_index(&headers, SUGAR_COL)?;
    // The alias column is optional; every key is always its own alias.
    let aliases_idx = headers.iter().position(|h| h.trim() == ALIASES_COL);

    let mut entries = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let key = record.get(key_idx).unwrap_or("").trim().to_string();
        if key.is_empty() {
            continue;
        }

        let label = match record.get(label_idx).map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => key.replace('_', " "),
        };

        let aliases = aliases_idx
            .and_then(|idx| record.get(idx))
            .map(|raw| {
                raw.split(ALIAS_SEPARATOR)
                    .map(str::trim)
                    .filter(|alias| !alias.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        entries.push(ReferenceEntry {
            kcal_per_100g: parse_nutrient(&record, kcal_idx, KCAL_COL, row_index)?,
            carbs_per_100g: parse_nutrient(&record, carbs_idx, CARBS_COL, row_index)?,
            sugar_per_100g: parse_nutrient(&record, sugar_idx, SUGAR_COL, row_index)?,
            key,
            label,
            aliases,
        });
    }

    if entries.is_empty() {
        return Err(anyhow::anyhow!("No reference entries loaded"));
    }

    Ok(entries)
}

pub fn load_reference_file(csv_path: &Path) -> Result<Vec<ReferenceEntry>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("Reference table file not found at: {:?}", csv_path));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open reference table at {:?}", csv_path))?;
    load_reference_entries(file).with_context(|| format!("Failed to load reference table from {:?}", csv_path))
}
