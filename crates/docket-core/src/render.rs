use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarGrid, DayCell, GridCell};
use crate::config::Config;
use crate::list_view::ListEntry;

const MARKER: &str = "●";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn print_list(&self, entries: &[ListEntry]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_list(&mut out, entries)
    }

    #[tracing::instrument(skip(self, grid), fields(title = %grid.title))]
    pub fn print_calendar(&self, grid: &CalendarGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_calendar(&mut out, grid)
    }

    pub fn write_list<W: Write>(&self, mut out: W, entries: &[ListEntry]) -> anyhow::Result<()> {
        if entries.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Due".to_string(),
            "Deadline".to_string(),
            "Name".to_string(),
            "Color".to_string(),
        ];

        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let index = self.paint(&entry.original_index.to_string(), "33");

            let deadline = entry.deadline_text();
            let deadline = if entry.overdue_highlight {
                self.paint(&deadline, "31")
            } else if entry.days_left.is_none() {
                self.paint(&deadline, "2")
            } else {
                deadline
            };

            let name = if entry.completed {
                self.paint(&entry.name, "9")
            } else {
                entry.name.clone()
            };

            let swatch = format!("{} {}", self.marker(&entry.color), entry.color);

            rows.push(vec![index, entry.date.clone(), deadline, name, swatch]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn write_calendar<W: Write>(&self, mut out: W, grid: &CalendarGrid) -> anyhow::Result<()> {
        let rows: Vec<Vec<String>> = grid
            .rows()
            .into_iter()
            .map(|row| row.into_iter().map(|cell| self.grid_cell(cell)).collect())
            .collect();

        let width = rows
            .iter()
            .flatten()
            .map(|cell| visible_width(cell))
            .chain(grid.weekdays.iter().map(|label| label.width()))
            .max()
            .unwrap_or(3);
        let line_width = width * 7 + 6;

        let title_pad = line_width.saturating_sub(grid.title.width()) / 2;
        writeln!(out, "{}{}", " ".repeat(title_pad), grid.title)?;

        let labels: Vec<String> = grid
            .weekdays
            .iter()
            .map(|label| pad(label, width))
            .collect();
        writeln!(out, "{}", labels.join(" ").trim_end())?;

        for row in &rows {
            let cells: Vec<String> = row.iter().map(|cell| pad(cell, width)).collect();
            writeln!(out, "{}", cells.join(" ").trim_end())?;
        }

        let busy: Vec<&DayCell> = grid.days.iter().filter(|d| !d.tasks.is_empty()).collect();
        if !busy.is_empty() {
            writeln!(out)?;
            for cell in busy {
                for task in &cell.tasks {
                    let name = if task.completed {
                        self.paint(&task.name, "9")
                    } else {
                        task.name.clone()
                    };
                    writeln!(
                        out,
                        "{:>2} {} [{}] {}",
                        cell.day,
                        self.marker(&task.color),
                        task.original_index,
                        name
                    )?;
                }
            }
        }

        Ok(())
    }

    fn grid_cell(&self, cell: GridCell<'_>) -> String {
        let GridCell::Day(day) = cell else {
            return String::new();
        };

        let number = format!("{:>2}", day.day);
        let mut text = if day.is_today {
            self.paint(&number, "7")
        } else {
            number
        };
        for marker in &day.markers {
            text.push_str(&self.marker(&marker.color));
        }
        if let Some(badge) = &day.overflow_badge {
            text.push_str(badge);
        }
        text
    }

    fn marker(&self, color: &str) -> String {
        match ansi_color(color) {
            Some(code) => self.paint(MARKER, &code),
            None => MARKER.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Maps a task color token to an SGR foreground code: `#rgb`, `#rrggbb` or
/// one of a handful of names. Anything else renders uncolored.
pub fn ansi_color(token: &str) -> Option<String> {
    let token = token.trim().to_ascii_lowercase();
    if let Some(hex) = token.strip_prefix('#') {
        let (r, g, b) = parse_hex(hex)?;
        return Some(format!("38;2;{r};{g};{b}"));
    }

    let code = match token.as_str() {
        "black" => "30",
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "magenta" | "purple" => "35",
        "cyan" => "36",
        "white" => "37",
        "gray" | "grey" => "90",
        "orange" => "38;5;208",
        "pink" => "38;5;205",
        _ => return None,
    };
    Some(code.to_string())
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some((pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

fn pad(cell: &str, width: usize) -> String {
    let padding = width.saturating_sub(visible_width(cell));
    format!("{}{}", cell, " ".repeat(padding))
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
