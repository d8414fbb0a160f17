use serde::Serialize;
use std::ops::AddAssign;

use crate::plate::{ItemId, LineItem, PlateState};
use crate::reference::ReferenceTable;

/// Decimal places shown for kcal.
pub const KCAL_DECIMALS: i32 = 0;
/// Decimal places shown for carbohydrates and sugar.
pub const CARB_DECIMALS: i32 = 1;

/// Absolute nutrient amounts in full precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientAmounts {
    pub kcal: f64,
    pub carbs_g: f64,
    pub sugar_g: f64,
}

impl AddAssign for NutrientAmounts {
    fn add_assign(&mut self, rhs: Self) {
        self.kcal += rhs.kcal;
        self.carbs_g += rhs.carbs_g;
        self.sugar_g += rhs.sugar_g;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemNutrients {
    pub id: ItemId,
    pub amounts: NutrientAmounts,
}

/// Everything derived from one plate, unrounded. Carbs and sugar are always
/// computed; hiding them is left to [`PlateReport`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Totals {
    pub items: Vec<ItemNutrients>,
    pub plate: NutrientAmounts,
}

/// Nutrients of one line item. Unmatched items, and keys missing from the
/// table, contribute nothing.
pub fn item_nutrients(table: &ReferenceTable, item: &LineItem) -> NutrientAmounts {
    let Some(entry) = item.reference_key.as_deref().and_then(|key| table.lookup(key)) else {
        return NutrientAmounts::default();
    };
    NutrientAmounts {
        kcal: entry.kcal_per_100g * item.grams / 100.0,
        carbs_g: entry.carbs_per_100g * item.grams / 100.0,
        sugar_g: entry.sugar_per_100g * item.grams / 100.0,
    }
}

/// Recomputes every item and the plate sum from scratch. Pure: same plate, same totals.
pub fn calculate_totals(table: &ReferenceTable, plate: &PlateState) -> Totals {
    let mut totals = Totals::default();
    for item in plate.items() {
        let amounts = item_nutrients(table, item);
        totals.plate += amounts;
        totals.items.push(ItemNutrients { id: item.id, amounts });
    }
    totals
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Rounded nutrients as exposed to the caller. Carbs and sugar are omitted
/// entirely unless Glucose Balance+ is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientView {
    pub kcal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugar_g: Option<f64>,
}

impl NutrientView {
    pub fn from_amounts(amounts: &NutrientAmounts, glucose_balance_enabled: bool) -> Self {
        let carb_field = |value: f64| glucose_balance_enabled.then(|| round_to(value, CARB_DECIMALS));
        Self {
            kcal: round_to(amounts.kcal, KCAL_DECIMALS),
            carbs_g: carb_field(amounts.carbs_g),
            sugar_g: carb_field(amounts.sugar_g),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub id: ItemId,
    pub display_name: String,
    pub reference_key: Option<String>,
    pub grams: f64,
    #[serde(flatten)]
    pub nutrients: NutrientView,
}

/// Line items plus totals, ready for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateReport {
    pub glucose_balance_enabled: bool,
    pub items: Vec<ItemReport>,
    pub totals: NutrientView,
    pub unresolved_items: usize,
}

impl PlateReport {
    /// Rounds only at this point: sums were taken in full precision.
    pub fn build(plate: &PlateState, totals: &Totals) -> Self {
        let enabled = plate.glucose_balance_enabled();
        let items = plate
            .items()
            .iter()
            .zip(&totals.items)
            .map(|(item, computed)| ItemReport {
                id: item.id,
                display_name: item.display_name.clone(),
                reference_key: item.reference_key.clone(),
                grams: item.grams,
                nutrients: NutrientView::from_amounts(&computed.amounts, enabled),
            })
            .collect();

        Self {
            glucose_balance_enabled: enabled,
            items,
            totals: NutrientView::from_amounts(&totals.plate, enabled),
            unresolved_items: plate.unresolved_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceEntry;

    fn table() -> ReferenceTable {
        let entry = |key: &str, kcal: f64, carbs: f64, sugar: f64| ReferenceEntry {
            key: key.to_string(),
            label: key.replace('_', " "),
            kcal_per_100g: kcal,
            carbs_per_100g: carbs,
            sugar_per_100g: sugar,
            aliases: Vec::new(),
        };
        ReferenceTable::from_entries(vec![
            entry("chicken_breast", 165.0, 0.0, 0.0),
            entry("white_rice", 130.0, 28.2, 0.1),
            entry("apple", 52.0, 13.8, 10.4),
        ])
        .unwrap()
    }

    fn plate(items: &[(Option<&str>, f64)]) -> PlateState {
        let mut plate = PlateState::new();
        for (key, grams) in items {
            let name = key.unwrap_or("mystery food").to_string();
            plate.push_item(key.map(str::to_string), name, *grams);
        }
        plate
    }

    #[test]
    fn test_item_nutrients_scale_by_grams() {
        let table = table();
        let plate = plate(&[(Some("white_rice"), 200.0)]);
        let amounts = item_nutrients(&table, &plate.items()[0]);
        assert_eq!(amounts.kcal, 260.0);
        assert!((amounts.carbs_g - 56.4).abs() < 1e-9);
        assert!((amounts.sugar_g - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_item_contributes_zero() {
        let table = table();
        let plate = plate(&[(None, 250.0), (Some("apple"), 100.0)]);
        let totals = calculate_totals(&table, &plate);
        assert_eq!(totals.items[0].amounts, NutrientAmounts::default());
        assert_eq!(totals.plate.kcal, 52.0);
    }

    #[test]
    fn test_plate_sum_is_rounded_once() {
        let table = table();
        let plate = plate(&[(Some("chicken_breast"), 150.0), (Some("white_rice"), 200.0)]);
        let totals = calculate_totals(&table, &plate);
        assert_eq!(totals.plate.kcal, 507.5);

        let report = PlateReport::build(&plate, &totals);
        assert_eq!(report.items[0].nutrients.kcal, 248.0);
        assert_eq!(report.items[1].nutrients.kcal, 260.0);
        assert_eq!(report.totals.kcal, 508.0);
    }

    #[test]
    fn test_plate_total_equals_sum_of_items() {
        let table = table();
        let plate = plate(&[(Some("apple"), 33.0), (None, 10.0), (Some("white_rice"), 77.0), (Some("apple"), 0.0)]);
        let totals = calculate_totals(&table, &plate);
        let mut summed = NutrientAmounts::default();
        for item in &totals.items {
            summed += item.amounts;
        }
        assert_eq!(summed, totals.plate);
    }

    #[test]
    fn test_calculate_totals_is_idempotent() {
        let table = table();
        let plate = plate(&[(Some("apple"), 123.0), (None, 40.0)]);
        assert_eq!(calculate_totals(&table, &plate), calculate_totals(&table, &plate));
    }

    #[test]
    fn test_report_hides_carbs_unless_glucose_balance() {
        let table = table();
        let mut plate = plate(&[(Some("apple"), 150.0)]);
        let totals = calculate_totals(&table, &plate);

        let hidden = PlateReport::build(&plate, &totals);
        assert_eq!(hidden.totals.carbs_g, None);
        let json = serde_json::to_value(&hidden).unwrap();
        assert!(json["totals"].get("carbs_g").is_none());
        assert!(json["items"][0].get("sugar_g").is_none());

        plate.set_glucose_balance(true);
        let shown = PlateReport::build(&plate, &totals);
        assert_eq!(shown.totals.carbs_g, Some(20.7));
        assert_eq!(shown.totals.sugar_g, Some(15.6));
        assert_eq!(shown.totals.kcal, hidden.totals.kcal);
        let json = serde_json::to_value(&shown).unwrap();
        assert_eq!(json["items"][0]["carbs_g"], 20.7);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(247.5, KCAL_DECIMALS), 248.0);
        assert_eq!(round_to(20.74, CARB_DECIMALS), 20.7);
        assert_eq!(round_to(0.0, CARB_DECIMALS), 0.0);
    }
}
