//! Per-session plate state and the engine that edits it.
//!
//! A [`PlateState`] is an explicit context object: every engine operation takes it
//! as an argument, so no session state lives anywhere else. Each action either
//! succeeds and returns a freshly recomputed [`PlateReport`], or fails with a
//! [`PlateError`] and leaves the plate untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PlateError;
use crate::food_recognizer::RecognizedFood;
use crate::nutritional_matcher::{match_recognized_name, MatchOutcome};
use crate::plate_aggregator::{calculate_totals, PlateReport, Totals};
use crate::reference::ReferenceTable;

pub type ItemId = u64;

/// Portion given to a new line item when nothing better is known.
pub const DEFAULT_PORTION_G: f64 = 100.0;

/// Largest accepted portion (100 kg). Together with the reference table's
/// per-100 g caps this keeps every computed amount finite.
pub const MAX_PORTION_G: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ItemId,
    /// `None` until the item is bound to a canonical food.
    pub reference_key: Option<String>,
    pub display_name: String,
    pub grams: f64,
}

impl LineItem {
    pub fn is_matched(&self) -> bool {
        self.reference_key.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlateState {
    items: Vec<LineItem>,
    glucose_balance_enabled: bool,
    next_id: ItemId,
}

impl PlateState {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn glucose_balance_enabled(&self) -> bool {
        self.glucose_balance_enabled
    }

    pub fn unresolved_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_matched()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push_item(&mut self, reference_key: Option<String>, display_name: String, grams: f64) -> ItemId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.items.push(LineItem {
            id,
            reference_key,
            display_name,
            grams,
        });
        id
    }

    pub(crate) fn set_glucose_balance(&mut self, enabled: bool) {
        self.glucose_balance_enabled = enabled;
    }

    /// Sets the initial Glucose Balance+ flag without computing a report.
    pub fn with_glucose_balance(mut self, enabled: bool) -> Self {
        self.glucose_balance_enabled = enabled;
        self
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut LineItem, PlateError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(PlateError::UnknownItem(id))
    }
}

/// Accepts gram values in `0..=MAX_PORTION_G`.
pub fn validate_grams(grams: f64) -> Result<f64, PlateError> {
    if (0.0..=MAX_PORTION_G).contains(&grams) {
        Ok(grams)
    } else {
        Err(PlateError::InvalidGrams(grams))
    }
}

/// Parses user-typed grams, e.g. from a form field or a session command.
pub fn parse_grams(raw: &str) -> Result<f64, PlateError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| PlateError::UnparsableGrams(raw.trim().to_string()))?;
    validate_grams(value)
}

/// Reconciles recognized names into plates and applies user edits, reading
/// nutrition from a table that is never mutated.
#[derive(Debug, Clone, Copy)]
pub struct NutritionEngine<'t> {
    table: &'t ReferenceTable,
    default_portion_g: f64,
}

impl<'t> NutritionEngine<'t> {
    pub fn new(table: &'t ReferenceTable) -> Self {
        Self {
            table,
            default_portion_g: DEFAULT_PORTION_G,
        }
    }

    pub fn with_default_portion(table: &'t ReferenceTable, default_portion_g: f64) -> Result<Self, PlateError> {
        Ok(Self {
            table,
            default_portion_g: validate_grams(default_portion_g)?,
        })
    }

    pub fn table(&self) -> &'t ReferenceTable {
        self.table
    }

    pub fn default_portion_g(&self) -> f64 {
        self.default_portion_g
    }

    /// Builds a plate from recognized names, preserving their order. An empty
    /// sequence gives an empty plate.
    pub fn reconcile<I, S>(&self, names: I) -> PlateState
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plate = PlateState::new();
        for name in names {
            self.push_recognized(&mut plate, name.as_ref(), self.default_portion_g);
        }
        info!("Reconciled plate: {} item(s), {} unmatched", plate.items.len(), plate.unresolved_count());
        plate
    }

    /// Like [`reconcile`](Self::reconcile), but a positive, finite weight estimate
    /// from the recognizer replaces the default portion.
    pub fn reconcile_detections<I>(&self, foods: I) -> PlateState
    where
        I: IntoIterator<Item = RecognizedFood>,
    {
        let mut plate = PlateState::new();
        for food in foods {
            let grams = food
                .estimated_grams
                .filter(|g| *g > 0.0 && validate_grams(*g).is_ok())
                .unwrap_or(self.default_portion_g);
            self.push_recognized(&mut plate, &food.name, grams);
        }
        info!("Reconciled plate: {} item(s), {} unmatched", plate.items.len(), plate.unresolved_count());
        plate
    }

    fn push_recognized(&self, plate: &mut PlateState, raw_name: &str, grams: f64) -> ItemId {
        let outcome = match_recognized_name(self.table, raw_name);
        let matched = match &outcome {
            MatchOutcome::Resolved(key) => self.table.lookup(key),
            MatchOutcome::Ambiguous(candidates) => {
                debug!("'{}' left unmatched, candidates: {:?}", raw_name, candidates);
                None
            }
            MatchOutcome::NotFound => None,
        };
        match matched {
            Some(entry) => plate.push_item(Some(entry.key.clone()), entry.label.clone(), grams),
            None => plate.push_item(None, raw_name.to_string(), grams),
        }
    }

    pub fn totals(&self, plate: &PlateState) -> Totals {
        calculate_totals(self.table, plate)
    }

    /// Recomputes the whole report from scratch.
    pub fn recompute(&self, plate: &PlateState) -> PlateReport {
        PlateReport::build(plate, &self.totals(plate))
    }

    pub fn set_grams(&self, plate: &mut PlateState, id: ItemId, grams: f64) -> Result<PlateReport, PlateError> {
        let grams = validate_grams(grams)?;
        plate.item_mut(id)?.grams = grams;
        debug!(id, grams, "grams updated");
        Ok(self.recompute(plate))
    }

    /// Manual "add item": binds directly to a canonical key with the default portion.
    pub fn add_item(&self, plate: &mut PlateState, key: &str) -> Result<PlateReport, PlateError> {
        let entry = self
            .table
            .lookup(key)
            .ok_or_else(|| PlateError::UnknownKey(key.to_string()))?;
        let id = plate.push_item(Some(entry.key.clone()), entry.label.clone(), self.default_portion_g);
        debug!(id, key, "item added");
        Ok(self.recompute(plate))
    }

    pub fn remove_item(&self, plate: &mut PlateState, id: ItemId) -> Result<PlateReport, PlateError> {
        let before = plate.items.len();
        plate.items.retain(|item| item.id != id);
        if plate.items.len() == before {
            return Err(PlateError::UnknownItem(id));
        }
        debug!(id, "item removed");
        Ok(self.recompute(plate))
    }

    /// Binds an item to `key`, keeping its grams. Also re-points an item that was
    /// matched to the wrong food.
    pub fn resolve_unmatched(&self, plate: &mut PlateState, id: ItemId, key: &str) -> Result<PlateReport, PlateError> {
        let entry = self
            .table
            .lookup(key)
            .ok_or_else(|| PlateError::UnknownKey(key.to_string()))?;
        let item = plate.item_mut(id)?;
        item.reference_key = Some(entry.key.clone());
        item.display_name = entry.label.clone();
        debug!(id, key, "item resolved");
        Ok(self.recompute(plate))
    }

    pub fn set_glucose_balance(&self, plate: &mut PlateState, enabled: bool) -> PlateReport {
        plate.set_glucose_balance(enabled);
        self.recompute(plate)
    }

    /// Refuses plates that still hold unmatched items.
    pub fn finalize(&self, plate: &PlateState) -> Result<PlateReport, PlateError> {
        match plate.unresolved_count() {
            0 => Ok(self.recompute(plate)),
            unresolved => Err(PlateError::UnresolvedItems(unresolved)),
        }
    }
}
