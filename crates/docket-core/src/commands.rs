use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::app::{Tracker, Views};
use crate::cli::Command;
use crate::config::Config;
use crate::datastore::TaskPersistence;
use crate::error::TrackerError;
use crate::render::Renderer;
use crate::task::{LegacyRecord, Task};

/// Runs one command against the tracker and prints its result, either as the
/// rendered views or as a JSON envelope.
#[instrument(skip(tracker, cfg, renderer, command))]
pub fn dispatch<P: TaskPersistence>(
    tracker: &mut Tracker<P>,
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
    json: bool,
) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Calendar);
    debug!(?command, json, "dispatching command");

    match command {
        Command::Add { name, date, color } => {
            info!("command add");
            let color = color.unwrap_or_else(|| cfg.default_color.clone());
            let views = tracker.create_task(&name, &date, &color)?;
            emit_views(renderer, &views, json)
        }
        Command::Edit { index, name, color } => {
            info!(index, "command edit");
            let views = tracker.edit_task(index, &name, color.as_deref())?;
            emit_views(renderer, &views, json)
        }
        Command::Delete { index } => {
            info!(index, "command delete");
            let views = tracker.delete_task(index)?;
            emit_views(renderer, &views, json)
        }
        Command::Toggle { index } => {
            info!(index, "command toggle");
            let views = tracker.toggle_completed(index)?;
            emit_views(renderer, &views, json)
        }
        Command::List => {
            info!("command list");
            let list = tracker.list();
            if json {
                print_success(&list)
            } else {
                renderer.print_list(&list)
            }
        }
        Command::Calendar => {
            info!("command calendar");
            let calendar = tracker.calendar();
            if json {
                print_success(&calendar)
            } else {
                renderer.print_calendar(&calendar)
            }
        }
        Command::Next { months } => {
            info!(months, "command next");
            let views = tracker.shift_month(i64::from(months))?;
            emit_calendar(renderer, &views, json)
        }
        Command::Prev { months } => {
            info!(months, "command prev");
            let views = tracker.shift_month(-i64::from(months))?;
            emit_calendar(renderer, &views, json)
        }
        Command::Goto { month } => {
            info!(year = month.year, month = month.month, "command goto");
            let views = tracker.go_to(month)?;
            emit_calendar(renderer, &views, json)
        }
        Command::Today => {
            info!("command today");
            let views = tracker.jump_to_today()?;
            emit_calendar(renderer, &views, json)
        }
        Command::Export => cmd_export(tracker, json),
        Command::Import { file } => cmd_import(tracker, renderer, &file, json),
        Command::ShowConfig => cmd_show_config(cfg, json),
    }
}

/// The `{"success":false,...}` envelope for a failed command. Domain errors
/// keep their code; everything else is reported as `ERROR`.
pub fn error_envelope(err: &anyhow::Error) -> Value {
    let code = err
        .downcast_ref::<TrackerError>()
        .map(TrackerError::code)
        .unwrap_or("ERROR");
    json!({
        "success": false,
        "error": {
            "code": code,
            "message": format!("{err:#}"),
        }
    })
}

fn success_envelope<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<Value> {
    Ok(json!({
        "success": true,
        "data": serde_json::to_value(data)?,
    }))
}

fn print_success<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(&success_envelope(data)?)?;
    println!("{out}");
    Ok(())
}

fn emit_views(renderer: &Renderer, views: &Views, json: bool) -> anyhow::Result<()> {
    if json {
        return print_success(views);
    }
    renderer.print_list(&views.list)?;
    println!();
    renderer.print_calendar(&views.calendar)
}

fn emit_calendar(renderer: &Renderer, views: &Views, json: bool) -> anyhow::Result<()> {
    if json {
        return print_success(&views.calendar);
    }
    renderer.print_calendar(&views.calendar)
}

#[instrument(skip(tracker))]
fn cmd_export<P: TaskPersistence>(tracker: &Tracker<P>, json: bool) -> anyhow::Result<()> {
    info!("command export");

    let records: Vec<LegacyRecord> = tracker.store().tasks().iter().map(Task::to_legacy).collect();
    if json {
        return print_success(&records);
    }
    let out = serde_json::to_string_pretty(&records)?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(tracker, renderer))]
fn cmd_import<P: TaskPersistence>(
    tracker: &mut Tracker<P>,
    renderer: &Renderer,
    file: &Path,
    json: bool,
) -> anyhow::Result<()> {
    info!(file = %file.display(), "command import");

    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed reading {}", file.display()))?;
    let records: Vec<LegacyRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing {}", file.display()))?;
    let count = records.len();

    let before = tracker.store().len();
    let views = tracker.import(records)?;
    let unreadable = tracker
        .store()
        .invalid_records()
        .into_iter()
        .filter(|err| matches!(err, TrackerError::InvalidDateOnRecord { index, .. } if *index >= before))
        .count();
    if unreadable > 0 {
        warn!(unreadable, "imported records with unreadable dates");
    }

    if json {
        return print_success(&json!({
            "imported": count,
            "unreadable_dates": unreadable,
            "list": views.list,
        }));
    }
    println!("Imported {count} task(s).");
    renderer.print_list(&views.list)
}

fn cmd_show_config(cfg: &Config, json: bool) -> anyhow::Result<()> {
    info!("command show-config");

    if json {
        return print_success(cfg);
    }
    for file in &cfg.loaded_files {
        println!("# loaded from {}", file.display());
    }
    let out = toml::to_string_pretty(cfg).context("failed to serialize config")?;
    print!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;

    use super::{dispatch, error_envelope, success_envelope};
    use crate::app::Tracker;
    use crate::calendar::CalendarPolicy;
    use crate::cli::{Command, GlobalCli};
    use crate::config::Config;
    use crate::datastore::MemoryPersistence;
    use crate::error::TrackerError;
    use crate::navigation::NavigationState;
    use crate::render::Renderer;

    fn tracker() -> Tracker<MemoryPersistence> {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date");
        Tracker::open(MemoryPersistence::default(), today, CalendarPolicy::default())
            .expect("open")
    }

    #[test]
    fn prev_by_most_negative_count_does_not_overflow() {
        let cli = GlobalCli::parse_from(["docket", "prev", "--", "-2147483648"]);
        assert!(matches!(cli.command, Some(Command::Prev { months: i32::MIN })));

        let mut tracker = tracker();
        dispatch(
            &mut tracker,
            &Config::default(),
            &Renderer::plain(),
            cli.command,
            true,
        )
        .expect("prev");
        assert_eq!(
            tracker.navigation(),
            NavigationState {
                year: 2024 + 178_956_970,
                month: 11,
            }
        );
    }

    #[test]
    fn next_past_the_last_year_is_an_error() {
        let mut tracker = tracker();
        let edge = NavigationState {
            year: i32::MAX,
            month: 12,
        };
        tracker.go_to(edge).expect("goto");
        let result = dispatch(
            &mut tracker,
            &Config::default(),
            &Renderer::plain(),
            Some(Command::Next { months: 1 }),
            true,
        );
        assert!(result.is_err());
        assert_eq!(tracker.navigation(), edge);
    }

    #[test]
    fn domain_errors_keep_their_code() {
        let err = anyhow::Error::from(TrackerError::IndexOutOfRange { index: 7, len: 2 });
        let value = error_envelope(&err);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "INDEX_OUT_OF_RANGE");
        assert_eq!(
            value["error"]["message"],
            "no task at index 7 (store holds 2)"
        );
    }

    #[test]
    fn other_errors_use_generic_code() {
        let err = anyhow::anyhow!("disk on fire");
        let value = error_envelope(&err);
        assert_eq!(value["error"]["code"], "ERROR");
    }

    #[test]
    fn context_does_not_hide_the_domain_code() {
        let err = anyhow::Error::from(TrackerError::invalid_input("Please enter both task name and deadline date."))
            .context("add failed");
        let value = error_envelope(&err);
        assert_eq!(value["error"]["code"], "INVALID_TASK_INPUT");
    }

    #[test]
    fn success_wraps_data() {
        let value = success_envelope(&vec![1, 2]).expect("envelope");
        assert_eq!(value["success"], true);
        assert_eq!(value["data"][1], 2);
    }
}
