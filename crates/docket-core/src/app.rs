use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::calendar::{CalendarGrid, CalendarPolicy, build_calendar};
use crate::datastore::TaskPersistence;
use crate::error::TrackerError;
use crate::list_view::{ListEntry, build_list};
use crate::navigation::NavigationState;
use crate::store::TaskStore;
use crate::task::LegacyRecord;

/// Both derived views, rebuilt from scratch after every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Views {
    pub list: Vec<ListEntry>,
    pub calendar: CalendarGrid,
}

/// Owns the task store and navigation state and routes every mutation
/// through the persistence collaborator.
#[derive(Debug)]
pub struct Tracker<P: TaskPersistence> {
    store: TaskStore,
    navigation: NavigationState,
    persistence: P,
    policy: CalendarPolicy,
    today: NaiveDate,
}

impl<P: TaskPersistence> Tracker<P> {
    #[instrument(skip(persistence, policy))]
    pub fn open(persistence: P, today: NaiveDate, policy: CalendarPolicy) -> anyhow::Result<Self> {
        let store = TaskStore::from_tasks(persistence.load_tasks()?);
        let navigation = match persistence.load_navigation() {
            Ok(Some(nav)) if nav.is_valid() => nav,
            Ok(Some(nav)) => {
                warn!(?nav, "ignoring stored navigation state");
                NavigationState::at(today)
            }
            Ok(None) => NavigationState::at(today),
            Err(err) => {
                warn!(error = %err, "unreadable navigation state; showing current month");
                NavigationState::at(today)
            }
        };
        info!(
            tasks = store.len(),
            year = navigation.year,
            month = navigation.month,
            "tracker opened"
        );
        Ok(Self {
            store,
            navigation,
            persistence,
            policy: policy.sanitized(),
            today,
        })
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn navigation(&self) -> NavigationState {
        self.navigation
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn list(&self) -> Vec<ListEntry> {
        build_list(&self.store, self.today)
    }

    pub fn calendar(&self) -> CalendarGrid {
        build_calendar(
            self.navigation.year,
            self.navigation.month,
            &self.store,
            self.today,
            &self.policy,
        )
    }

    pub fn views(&self) -> Views {
        Views {
            list: self.list(),
            calendar: self.calendar(),
        }
    }

    pub fn create_task(&mut self, name: &str, date: &str, color: &str) -> anyhow::Result<Views> {
        let today = self.today;
        self.mutate("create", |store| store.create(name, date, color, today).map(|_| ()))
    }

    pub fn edit_task(
        &mut self,
        index: usize,
        new_name: &str,
        new_color: Option<&str>,
    ) -> anyhow::Result<Views> {
        self.mutate("edit", |store| store.edit(index, new_name, new_color).map(|_| ()))
    }

    pub fn delete_task(&mut self, index: usize) -> anyhow::Result<Views> {
        self.mutate("delete", |store| store.delete(index).map(|_| ()))
    }

    pub fn toggle_completed(&mut self, index: usize) -> anyhow::Result<Views> {
        self.mutate("toggle", |store| store.toggle_completed(index).map(|_| ()))
    }

    pub fn edit_task_by_id(
        &mut self,
        id: Uuid,
        new_name: &str,
        new_color: Option<&str>,
    ) -> anyhow::Result<Views> {
        let index = self.store.index_of(id)?;
        self.edit_task(index, new_name, new_color)
    }

    pub fn delete_task_by_id(&mut self, id: Uuid) -> anyhow::Result<Views> {
        let index = self.store.index_of(id)?;
        self.delete_task(index)
    }

    pub fn toggle_completed_by_id(&mut self, id: Uuid) -> anyhow::Result<Views> {
        let index = self.store.index_of(id)?;
        self.toggle_completed(index)
    }

    pub fn import(&mut self, records: Vec<LegacyRecord>) -> anyhow::Result<Views> {
        self.mutate("import", |store| store.import(records).map(|_| ()))
    }

    pub fn shift_month(&mut self, delta: i64) -> anyhow::Result<Views> {
        let mut next = self.navigation;
        next.shift_month(delta)?;
        self.navigate(next)
    }

    pub fn jump_to_today(&mut self) -> anyhow::Result<Views> {
        let mut next = self.navigation;
        next.jump_to_today(self.today);
        self.navigate(next)
    }

    pub fn go_to(&mut self, target: NavigationState) -> anyhow::Result<Views> {
        if !target.is_valid() {
            anyhow::bail!("month must be 1-12, got: {}", target.month);
        }
        self.navigate(target)
    }

    #[instrument(skip(self))]
    fn navigate(&mut self, next: NavigationState) -> anyhow::Result<Views> {
        self.persistence.save_navigation(&next)?;
        self.navigation = next;
        Ok(self.views())
    }

    /// Applies `op` to the store and persists the result. A rejected
    /// operation leaves the store untouched; a failed save rolls it back.
    #[instrument(skip(self, op))]
    fn mutate<F>(&mut self, command: &str, op: F) -> anyhow::Result<Views>
    where
        F: FnOnce(&mut TaskStore) -> Result<(), TrackerError>,
    {
        let before = self.store.clone();
        if let Err(err) = op(&mut self.store) {
            debug!(command, error = %err, "command rejected");
            self.store = before;
            return Err(err.into());
        }

        if let Err(err) = self.persistence.save_tasks(self.store.tasks()) {
            warn!(command, error = %err, "save failed; rolling back");
            self.store = before;
            return Err(err);
        }

        debug!(command, tasks = self.store.len(), "command applied");
        Ok(self.views())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::Tracker;
    use crate::calendar::CalendarPolicy;
    use crate::datastore::{MemoryPersistence, TaskPersistence};
    use crate::error::TrackerError;
    use crate::navigation::NavigationState;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    fn tracker() -> Tracker<MemoryPersistence> {
        Tracker::open(MemoryPersistence::default(), today(), CalendarPolicy::default())
            .expect("open")
    }

    #[test]
    fn create_persists_and_rebuilds_views() {
        let mut tracker = tracker();
        let views = tracker
            .create_task("Report", "2024-03-01", "#ff0000")
            .expect("create");
        assert_eq!(views.list.len(), 1);
        assert_eq!(views.calendar.title, "March 2024");
        assert_eq!(views.calendar.day(1).map(|c| c.markers.len()), Some(1));
        assert_eq!(tracker.persistence().load_tasks().expect("load").len(), 1);
        assert_eq!(tracker.persistence().save_count(), 1);
    }

    #[test]
    fn rejected_commands_do_not_persist() {
        let mut tracker = tracker();
        let err = tracker.create_task("", "2024-03-01", "red").unwrap_err();
        let err = err.downcast_ref::<TrackerError>().expect("domain error");
        assert_eq!(err.code(), "INVALID_TASK_INPUT");

        let err = tracker.delete_task(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::IndexOutOfRange { index: 0, len: 0 })
        ));
        assert_eq!(tracker.persistence().save_count(), 0);
    }

    #[test]
    fn delete_targets_store_position_not_display_position() {
        let mut tracker = tracker();
        for (name, date) in [
            ("first", "2024-03-20"),
            ("second", "2024-03-10"),
            ("third", "2024-03-25"),
            ("fourth", "2024-03-01"),
        ] {
            tracker.create_task(name, date, "red").expect("create");
        }
        let displayed: Vec<_> = tracker.list().into_iter().map(|e| e.name).collect();
        assert_eq!(displayed, vec!["fourth", "second", "first", "third"]);

        let views = tracker.delete_task(2).expect("delete");
        let remaining: Vec<_> = tracker.store().tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(remaining, vec!["first", "second", "fourth"]);
        assert!(views.list.iter().all(|e| e.name != "third"));
    }

    #[test]
    fn id_addressed_commands_follow_the_task() {
        let mut tracker = tracker();
        tracker.create_task("a", "2024-03-05", "red").expect("create");
        tracker.create_task("b", "2024-03-06", "red").expect("create");
        let id = tracker.store().tasks()[1].id;

        tracker.delete_task(0).expect("delete");
        let views = tracker.toggle_completed_by_id(id).expect("toggle");
        assert!(views.list[0].completed);
        assert_eq!(views.list[0].original_index, 0);

        tracker.edit_task_by_id(id, "renamed", None).expect("edit");
        assert_eq!(tracker.store().tasks()[0].name, "renamed");
    }

    #[test]
    fn navigation_moves_calendar_only() {
        let mut tracker = tracker();
        tracker.create_task("Report", "2024-03-01", "#ff0000").expect("create");
        let saves = tracker.persistence().save_count();

        let views = tracker.shift_month(1).expect("next");
        assert_eq!(views.calendar.title, "April 2024");
        assert!(views.calendar.days.iter().all(|c| c.tasks.is_empty()));
        assert_eq!(views.list.len(), 1);

        let views = tracker.shift_month(-2).expect("prev");
        assert_eq!(views.calendar.title, "February 2024");

        let views = tracker.jump_to_today().expect("today");
        assert_eq!(views.calendar.title, "March 2024");
        assert!(views.calendar.day(15).is_some_and(|c| c.is_today));
        assert_eq!(tracker.persistence().save_count(), saves);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let mut tracker = tracker();
        tracker
            .go_to(NavigationState { year: 2024, month: 12 })
            .expect("goto");
        let views = tracker.shift_month(1).expect("next");
        assert_eq!((views.calendar.year, views.calendar.month), (2025, 1));
    }

    #[test]
    fn year_overflow_leaves_navigation_alone() {
        let mut tracker = tracker();
        let edge = NavigationState {
            year: i32::MAX,
            month: 12,
        };
        tracker.go_to(edge).expect("goto");
        assert!(tracker.shift_month(1).is_err());
        assert_eq!(tracker.navigation(), edge);
        assert_eq!(tracker.persistence().load_navigation().expect("load"), Some(edge));
    }

    #[test]
    fn stored_navigation_is_restored() {
        let persistence = MemoryPersistence::default();
        persistence
            .save_navigation(&NavigationState { year: 2023, month: 7 })
            .expect("save nav");
        let tracker =
            Tracker::open(persistence, today(), CalendarPolicy::default()).expect("open");
        assert_eq!(tracker.navigation(), NavigationState { year: 2023, month: 7 });
    }
}
