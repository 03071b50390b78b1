use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// The month the calendar is showing. `month` runs 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub year: i32,
    pub month: u32,
}

impl NavigationState {
    pub fn at(today: NaiveDate) -> Self {
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// Moves by `delta` months; the year follows from the month index. A
    /// target year outside `i32` is an error and leaves the state unchanged.
    pub fn shift_month(&mut self, delta: i64) -> anyhow::Result<()> {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + delta;
        let year = i32::try_from(index.div_euclid(12))
            .map_err(|_| anyhow::anyhow!("cannot move {delta} months from {}-{:02}", self.year, self.month))?;
        self.year = year;
        self.month = index.rem_euclid(12) as u32 + 1;
        tracing::debug!(year = self.year, month = self.month, delta, "navigated");
        Ok(())
    }

    pub fn jump_to_today(&mut self, today: NaiveDate) {
        *self = Self::at(today);
        tracing::debug!(year = self.year, month = self.month, "jumped to today");
    }

    /// A state read from disk may carry a month outside 1-12.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
    }
}

impl std::str::FromStr for NavigationState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("expected YYYY-MM, got: {s}"))?;
        let state = Self {
            year: y.parse()?,
            month: m.parse()?,
        };
        if !state.is_valid() {
            anyhow::bail!("month must be 1-12, got: {m}");
        }
        Ok(state)
    }
}
