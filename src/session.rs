//! Line-oriented editing of one plate.
//!
//! Each input line is one user action. Accepted actions print the freshly
//! recomputed report as JSON; rejected ones print the error and change nothing.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::PlateError;
use crate::plate::{parse_grams, ItemId, NutritionEngine, PlateState};
use crate::plate_aggregator::PlateReport;
use crate::reference::ReferenceEntry;

pub const SESSION_HELP: &str = "commands:
  show                   print the plate
  grams <id> <grams>     change the weight of an item
  add <key>              add a food from the reference table
  remove <id>            remove an item
  resolve <id> <key>     bind an item to a reference food
  gb on|off              toggle Glucose Balance+ (carbs and sugar)
  keys                   list reference foods
  finalize               check that every item is resolved
  help                   this text
  quit                   end the session";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Show,
    Grams(ItemId, f64),
    Add(String),
    Remove(ItemId),
    Resolve(ItemId, String),
    GlucoseBalance(bool),
    Keys,
    Finalize,
    Help,
    Quit,
}

fn parse_item_id(raw: Option<&str>) -> Result<ItemId, PlateError> {
    let raw = raw.ok_or_else(|| PlateError::InvalidCommand("missing item id".to_string()))?;
    raw.parse::<ItemId>()
        .map_err(|_| PlateError::InvalidCommand(format!("'{}' is not an item id", raw)))
}

fn required<'a>(raw: Option<&'a str>, what: &str) -> Result<&'a str, PlateError> {
    raw.ok_or_else(|| PlateError::InvalidCommand(format!("missing {}", what)))
}

impl SessionCommand {
    pub fn parse(line: &str) -> Result<Self, PlateError> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("").to_lowercase();
        let parsed = match command.as_str() {
            "show" | "" => SessionCommand::Show,
            "grams" => {
                let id = parse_item_id(words.next())?;
                let grams = parse_grams(required(words.next(), "grams")?)?;
                SessionCommand::Grams(id, grams)
            }
            "add" => SessionCommand::Add(required(words.next(), "reference key")?.to_string()),
            "remove" => SessionCommand::Remove(parse_item_id(words.next())?),
            "resolve" => {
                let id = parse_item_id(words.next())?;
                SessionCommand::Resolve(id, required(words.next(), "reference key")?.to_string())
            }
            "gb" => match required(words.next(), "on or off")? {
                "on" => SessionCommand::GlucoseBalance(true),
                "off" => SessionCommand::GlucoseBalance(false),
                other => return Err(PlateError::InvalidCommand(format!("expected on or off, got '{}'", other))),
            },
            "keys" => SessionCommand::Keys,
            "finalize" => SessionCommand::Finalize,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" => SessionCommand::Quit,
            other => return Err(PlateError::InvalidCommand(format!("unknown command '{}'", other))),
        };

        if let Some(extra) = words.next() {
            return Err(PlateError::InvalidCommand(format!("unexpected argument '{}'", extra)));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionReply<'t> {
    Report(PlateReport),
    Keys(Vec<&'t ReferenceEntry>),
    Help,
    Quit,
}

/// Applies one command to the plate through the engine.
pub fn apply_command<'t>(
    engine: &NutritionEngine<'t>,
    plate: &mut PlateState,
    command: SessionCommand,
) -> Result<SessionReply<'t>, PlateError> {
    let reply = match command {
        SessionCommand::Show => SessionReply::Report(engine.recompute(plate)),
        SessionCommand::Grams(id, grams) => SessionReply::Report(engine.set_grams(plate, id, grams)?),
        SessionCommand::Add(key) => SessionReply::Report(engine.add_item(plate, &key)?),
        SessionCommand::Remove(id) => SessionReply::Report(engine.remove_item(plate, id)?),
        SessionCommand::Resolve(id, key) => SessionReply::Report(engine.resolve_unmatched(plate, id, &key)?),
        SessionCommand::GlucoseBalance(enabled) => SessionReply::Report(engine.set_glucose_balance(plate, enabled)),
        SessionCommand::Keys => SessionReply::Keys(engine.table().entries().iter().collect()),
        SessionCommand::Finalize => SessionReply::Report(engine.finalize(plate)?),
        SessionCommand::Help => SessionReply::Help,
        SessionCommand::Quit => SessionReply::Quit,
    };
    Ok(reply)
}

/// Runs the command loop until `quit` or end of input and returns the final plate.
pub async fn run_session<R, W>(
    engine: &NutritionEngine<'_>,
    mut plate: PlateState,
    reader: R,
    mut writer: W,
) -> Result<PlateState>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let initial = serde_json::to_string_pretty(&engine.recompute(&plate))?;
    writer.write_all(format!("{}\n", initial).as_bytes()).await?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        debug!(line = line.as_str(), "session input");
        let reply = SessionCommand::parse(&line).and_then(|command| apply_command(engine, &mut plate, command));

        let output = match reply {
            Ok(SessionReply::Report(report)) => serde_json::to_string_pretty(&report)?,
            Ok(SessionReply::Keys(entries)) => serde_json::to_string_pretty(&entries)?,
            Ok(SessionReply::Help) => SESSION_HELP.to_string(),
            Ok(SessionReply::Quit) => break,
            Err(err) => {
                warn!("Rejected '{}': {}", line.trim(), err);
                format!("error: {}", err)
            }
        };
        writer.write_all(format!("{}\n", output).as_bytes()).await?;
        writer.flush().await?;
    }

    writer.flush().await?;
    Ok(plate)
}
