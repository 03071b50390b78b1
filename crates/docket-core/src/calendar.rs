use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{WEEKDAY_LABELS, first_weekday_offset, month_length, month_name};
use crate::store::TaskStore;

const DEFAULT_MAX_MARKERS: usize = 3;
const DEFAULT_MARKER_STAGGER_PX: u32 = 2;
const MAX_MARKERS_LIMIT: usize = 12;
const MARKER_STAGGER_LIMIT_PX: u32 = 16;

/// How many stacked markers a day shows and how far each one is shifted
/// diagonally from the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarPolicy {
    pub max_markers: usize,
    pub marker_stagger_px: u32,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            max_markers: DEFAULT_MAX_MARKERS,
            marker_stagger_px: DEFAULT_MARKER_STAGGER_PX,
        }
    }
}

impl CalendarPolicy {
    /// Zero values fall back to the defaults; larger ones are clamped.
    pub fn sanitized(mut self) -> Self {
        if self.max_markers == 0 {
            self.max_markers = DEFAULT_MAX_MARKERS;
        }
        if self.marker_stagger_px == 0 {
            self.marker_stagger_px = DEFAULT_MARKER_STAGGER_PX;
        }
        self.max_markers = self.max_markers.min(MAX_MARKERS_LIMIT);
        self.marker_stagger_px = self.marker_stagger_px.min(MARKER_STAGGER_LIMIT_PX);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTask {
    pub id: Uuid,
    pub original_index: usize,
    pub name: String,
    pub color: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub id: Uuid,
    pub color: String,
    /// Shift along both axes, in pixels.
    pub offset_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub day: u32,
    pub date: NaiveDate,
    pub is_today: bool,
    pub tasks: Vec<DayTask>,
    pub markers: Vec<Marker>,
    pub overflow_badge: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCell<'a> {
    Blank,
    Day(&'a DayCell),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarGrid {
    pub year: i32,
    pub month: u32,
    pub title: String,
    pub weekdays: [&'static str; 7],
    pub leading_blanks: u32,
    pub days: Vec<DayCell>,
    pub trailing_blanks: u32,
}

impl CalendarGrid {
    pub fn day(&self, day: u32) -> Option<&DayCell> {
        self.days.iter().find(|cell| cell.day == day)
    }

    /// Every cell of the grid in row-major order, blanks included. The count
    /// is always a multiple of seven.
    pub fn cells(&self) -> Vec<GridCell<'_>> {
        let mut cells = Vec::with_capacity(
            self.leading_blanks as usize + self.days.len() + self.trailing_blanks as usize,
        );
        cells.extend((0..self.leading_blanks).map(|_| GridCell::Blank));
        cells.extend(self.days.iter().map(GridCell::Day));
        cells.extend((0..self.trailing_blanks).map(|_| GridCell::Blank));
        cells
    }

    pub fn rows(&self) -> Vec<Vec<GridCell<'_>>> {
        self.cells().chunks(7).map(<[GridCell<'_>]>::to_vec).collect()
    }
}

/// Builds the month grid for `year`/`month` (1-12). Only days that exist in
/// the month are generated; tasks are matched on their parsed date.
#[tracing::instrument(skip(store, today, policy), fields(count = store.len()))]
pub fn build_calendar(
    year: i32,
    month: u32,
    store: &TaskStore,
    today: NaiveDate,
    policy: &CalendarPolicy,
) -> CalendarGrid {
    let day_count = month_length(year, month);
    let leading_blanks = if day_count == 0 {
        0
    } else {
        first_weekday_offset(year, month)
    };

    let mut buckets: Vec<Vec<DayTask>> = vec![Vec::new(); day_count as usize];
    for (original_index, task) in store.tasks().iter().enumerate() {
        let Some(due) = task.due_date() else {
            continue;
        };
        if due.year() != year || due.month() != month {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(due.day0() as usize) {
            bucket.push(DayTask {
                id: task.id,
                original_index,
                name: task.name.clone(),
                color: task.color.clone(),
                completed: task.completed,
            });
        }
    }

    let days: Vec<DayCell> = buckets
        .into_iter()
        .zip(1..=day_count)
        .filter_map(|(tasks, day)| {
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            Some(day_cell(date, tasks, today, policy))
        })
        .collect();

    let used = leading_blanks + days.len() as u32;
    let trailing_blanks = (7 - used % 7) % 7;

    tracing::debug!(
        year,
        month,
        days = days.len(),
        leading_blanks,
        trailing_blanks,
        "calendar built"
    );

    CalendarGrid {
        year,
        month,
        title: format!("{} {year}", month_name(month)),
        weekdays: WEEKDAY_LABELS,
        leading_blanks,
        days,
        trailing_blanks,
    }
}

fn day_cell(
    date: NaiveDate,
    tasks: Vec<DayTask>,
    today: NaiveDate,
    policy: &CalendarPolicy,
) -> DayCell {
    let markers = tasks
        .iter()
        .take(policy.max_markers)
        .zip(0_u32..)
        .map(|(task, i)| Marker {
            id: task.id,
            color: task.color.clone(),
            offset_px: i.saturating_mul(policy.marker_stagger_px),
        })
        .collect::<Vec<_>>();
    let overflow_badge = (tasks.len() > markers.len())
        .then(|| format!("+{}", tasks.len() - markers.len()));

    DayCell {
        day: date.day(),
        date,
        is_today: date == today,
        tasks,
        markers,
        overflow_badge,
    }
}
