use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::data_loader::load_reference_entries;
use super::normalize::{key_as_phrase, name_forms, normalize_name};

/// Upper bounds per 100 g: pure fat is about 900 kcal, and no food holds more
/// than 100 g of carbohydrate or sugar.
pub const MAX_KCAL_PER_100G: f64 = 1000.0;
pub const MAX_GRAMS_PER_100G: f64 = 100.0;

/// Reference table compiled into the binary.
static BUILTIN_TABLE_CSV: &str = include_str!("data/reference_table.csv");

/// Nutritional values of one canonical food, per 100 g.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub key: String,
    /// Preferred human-readable name.
    pub label: String,
    pub kcal_per_100g: f64,
    pub carbs_per_100g: f64,
    pub sugar_per_100g: f64,
    /// Extra names as listed in the source, before normalization.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Immutable, ordered table of canonical foods plus the alias index used for matching.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
    by_key: HashMap<String, usize>,
    // Normalized alias -> canonical key. Ordered so substring scans are deterministic.
    aliases: BTreeMap<String, String>,
}

impl ReferenceTable {
    /// Builds the table and its alias index, rejecting anything that would make a
    /// lookup ambiguous or a nutrient value meaningless.
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow::anyhow!("Reference table has no entries"));
        }

        let mut by_key = HashMap::with_capacity(entries.len());
        let mut aliases: BTreeMap<String, String> = BTreeMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if entry.key.trim().is_empty() || entry.key.trim() != entry.key {
                return Err(anyhow::anyhow!("Invalid reference key '{}'", entry.key));
            }
            if by_key.insert(entry.key.clone(), idx).is_some() {
                return Err(anyhow::anyhow!("Duplicate reference key '{}'", entry.key));
            }

            for (name, value, max) in [
                ("kcal_per_100g", entry.kcal_per_100g, MAX_KCAL_PER_100G),
                ("carbs_per_100g", entry.carbs_per_100g, MAX_GRAMS_PER_100G),
                ("sugar_per_100g", entry.sugar_per_100g, MAX_GRAMS_PER_100G),
            ] {
                if !(0.0..=max).contains(&value) {
                    return Err(anyhow::anyhow!(
                        "Reference key '{}' has invalid {} value {}",
                        entry.key,
                        name,
                        value
                    ));
                }
            }

            let candidates = [normalize_name(&entry.key), key_as_phrase(&entry.key), normalize_name(&entry.label)]
                .into_iter()
                .chain(entry.aliases.iter().map(|alias| normalize_name(alias)));

            for alias in candidates.filter(|alias| !alias.is_empty()) {
                match aliases.get(&alias) {
                    Some(owner) if owner != &entry.key => {
                        return Err(anyhow::anyhow!(
                            "Alias '{}' is claimed by both '{}' and '{}'",
                            alias,
                            owner,
                            entry.key
                        ));
                    }
                    Some(_) => {}
                    None => {
                        aliases.insert(alias, entry.key.clone());
                    }
                }
            }
        }

        debug!(entries = entries.len(), aliases = aliases.len(), "reference table built");
        Ok(Self { entries, by_key, aliases })
    }

    /// The table shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_entries(load_reference_entries(BUILTIN_TABLE_CSV.as_bytes())?)
    }

    pub fn lookup(&self, key: &str) -> Option<&ReferenceEntry> {
        self.by_key.get(key).map(|&idx| &self.entries[idx])
    }

    /// Exact alias resolution of a raw name, trying the literal normalized form
    /// before its singular form. Never fails; a miss is `None`.
    pub fn resolve_alias(&self, raw_name: &str) -> Option<&str> {
        let normalized = normalize_name(raw_name);
        name_forms(&normalized)
            .into_iter()
            .find_map(|form| self.aliases.get(form))
            .map(String::as_str)
    }

    /// Canonical keys in table order.
    pub fn all_keys(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.key.as_str()).collect()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// `(normalized alias, canonical key)` pairs in alias order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(alias, key)| (alias.as_str(), key.as_str()))
    }

    pub fn aliases_of(&self, key: &str) -> Vec<&str> {
        self.aliases()
            .filter(|(_, owner)| *owner == key)
            .map(|(alias, _)| alias)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, label: &str, kcal: f64, aliases: &[&str]) -> ReferenceEntry {
        ReferenceEntry {
            key: key.to_string(),
            label: label.to_string(),
            kcal_per_100g: kcal,
            carbs_per_100g: 1.0,
            sugar_per_100g: 0.5,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = ReferenceTable::builtin().unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.lookup("chicken_breast").unwrap().kcal_per_100g, 165.0);
        assert_eq!(table.lookup("white_rice").unwrap().kcal_per_100g, 130.0);
    }

    #[test]
    fn test_every_key_is_its_own_alias() {
        let table = ReferenceTable::builtin().unwrap();
        for key in table.all_keys() {
            let aliases = table.aliases_of(key);
            assert!(aliases.contains(&key), "'{}' missing from its alias set {:?}", key, aliases);
            assert!(aliases.iter().all(|alias| *alias == alias.to_lowercase()));
        }
    }

    #[test]
    fn test_all_keys_keeps_table_order() {
        let table = ReferenceTable::from_entries(vec![
            entry("zucchini", "Zucchini", 17.0, &[]),
            entry("apple", "Apple", 52.0, &[]),
        ])
        .unwrap();
        assert_eq!(table.all_keys(), vec!["zucchini", "apple"]);
    }

    #[test]
    fn test_resolve_alias_variants() {
        let table = ReferenceTable::from_entries(vec![
            entry("chicken_breast", "Chicken breast", 165.0, &["Куриная грудка"]),
            entry("banana", "Banana", 89.0, &[]),
            entry("hummus", "Hummus", 166.0, &[]),
        ])
        .unwrap();

        assert_eq!(table.resolve_alias("  CHICKEN   breast "), Some("chicken_breast"));
        assert_eq!(table.resolve_alias("chicken_breast"), Some("chicken_breast"));
        assert_eq!(table.resolve_alias("куриная грудка"), Some("chicken_breast"));
        assert_eq!(table.resolve_alias("Bananas"), Some("banana"));
        assert_eq!(table.resolve_alias("Hummus"), Some("hummus"));
        assert_eq!(table.resolve_alias("xyzfood123"), None);
        assert_eq!(table.resolve_alias(""), None);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = ReferenceTable::from_entries(vec![
            entry("apple", "Apple", 52.0, &[]),
            entry("apple", "Green apple", 50.0, &[]),
        ]);
        assert!(result.unwrap_err().to_string().contains("Duplicate reference key 'apple'"));
    }

    #[test]
    fn test_negative_nutrient_rejected() {
        let result = ReferenceTable::from_entries(vec![entry("apple", "Apple", -1.0, &[])]);
        assert!(result.unwrap_err().to_string().contains("invalid kcal_per_100g"));
    }

    #[test]
    fn test_out_of_range_nutrient_rejected() {
        let result = ReferenceTable::from_entries(vec![entry("lard", "Lard", 1e308, &[])]);
        assert!(result.unwrap_err().to_string().contains("invalid kcal_per_100g"));

        let mut sugar = entry("sugar", "Sugar", 387.0, &[]);
        sugar.sugar_per_100g = 150.0;
        let result = ReferenceTable::from_entries(vec![sugar]);
        assert!(result.unwrap_err().to_string().contains("invalid sugar_per_100g"));

        let result = ReferenceTable::from_entries(vec![entry("oil", "Oil", f64::NAN, &[])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_alias_rejected() {
        let result = ReferenceTable::from_entries(vec![
            entry("white_rice", "White rice", 130.0, &["rice"]),
            entry("brown_rice", "Brown rice", 123.0, &["Rice"]),
        ]);
        assert!(result.unwrap_err().to_string().contains("Alias 'rice' is claimed by both"));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(ReferenceTable::from_entries(Vec::new()).is_err());
    }
}
