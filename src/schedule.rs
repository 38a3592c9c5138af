use crate::control::ScheduleInput;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One weekday entry: occupied between `start_min` (inclusive) and `end_min`
/// (exclusive), minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub enabled: bool,
    pub start_min: u16,
    pub end_min: u16,
}

impl DayEntry {
    pub fn closed() -> Self {
        Self {
            enabled: false,
            start_min: 0,
            end_min: 0,
        }
    }

    fn contains(&self, minute_of_day: u16) -> bool {
        self.enabled && self.start_min <= minute_of_day && minute_of_day < self.end_min
    }
}

/// Weekly occupancy schedule, index 0 = Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: [DayEntry; 7],
}

impl Default for WeeklySchedule {
    /// Standard office hours, 08:00-18:00 every day.
    fn default() -> Self {
        Self {
            days: [DayEntry {
                enabled: true,
                start_min: 8 * 60,
                end_min: 18 * 60,
            }; 7],
        }
    }
}

/// Schedule collaborator: weekly schedule, holiday calendar, and the manual
/// occupancy override an operator can force. The core never sees any of
/// this; it consumes only the resolved [`ScheduleInput`] pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleManager {
    pub weekly: WeeklySchedule,
    holidays: std::vec::Vec<NaiveDate>,
    manual_override: Option<bool>,
}

impl ScheduleManager {
    pub fn new(weekly: WeeklySchedule) -> Self {
        Self {
            weekly,
            holidays: std::vec::Vec::new(),
            manual_override: None,
        }
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        if !self.holidays.contains(&date) {
            self.holidays.push(date);
        }
    }

    pub fn remove_holiday(&mut self, date: NaiveDate) {
        self.holidays.retain(|d| *d != date);
    }

    /// Force occupancy regardless of the weekly schedule. A holiday still
    /// wins: it overrides the schedule and the manual override alike.
    pub fn set_manual_override(&mut self, occupied: bool) {
        self.manual_override = Some(occupied);
    }

    pub fn clear_manual_override(&mut self) {
        self.manual_override = None;
    }

    pub fn manual_override(&self) -> Option<bool> {
        self.manual_override
    }

    /// Resolve a local timestamp to the pair the core consumes.
    pub fn resolve_at(&self, local: NaiveDateTime) -> ScheduleInput {
        let holiday_override_active = self.holidays.contains(&local.date());

        let day_idx = local.weekday().num_days_from_monday() as usize;
        let minute_of_day = (local.hour() * 60 + local.minute()) as u16;
        let scheduled = self.weekly.days[day_idx].contains(minute_of_day);

        ScheduleInput {
            scheduled_occupied: self.manual_override.unwrap_or(scheduled),
            holiday_override_active,
        }
    }

    pub fn resolve_now(&self) -> ScheduleInput {
        self.resolve_at(Local::now().naive_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, minute, 0).expect("valid time")
    }

    // 2026-08-03 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).expect("valid date")
    }

    #[test]
    fn test_office_hours_boundaries() {
        let schedule = ScheduleManager::default();

        // Inclusive start, exclusive end.
        assert!(schedule.resolve_at(at(monday(), 8, 0)).scheduled_occupied);
        assert!(schedule.resolve_at(at(monday(), 17, 59)).scheduled_occupied);
        assert!(!schedule.resolve_at(at(monday(), 18, 0)).scheduled_occupied);
        assert!(!schedule.resolve_at(at(monday(), 7, 59)).scheduled_occupied);
    }

    #[test]
    fn test_disabled_day_is_unoccupied() {
        let mut weekly = WeeklySchedule::default();
        weekly.days[0] = DayEntry::closed();
        let schedule = ScheduleManager::new(weekly);

        assert!(!schedule.resolve_at(at(monday(), 12, 0)).scheduled_occupied);
    }

    #[test]
    fn test_holiday_flag_set() {
        let mut schedule = ScheduleManager::default();
        schedule.add_holiday(monday());

        let resolved = schedule.resolve_at(at(monday(), 12, 0));
        assert!(resolved.holiday_override_active);
        // The weekly lookup still reports occupied; the occupancy resolver
        // applies the holiday precedence.
        assert!(resolved.scheduled_occupied);
    }

    #[test]
    fn test_manual_override_beats_schedule() {
        let mut schedule = ScheduleManager::default();
        schedule.set_manual_override(true);
        assert!(schedule.resolve_at(at(monday(), 3, 0)).scheduled_occupied);

        schedule.set_manual_override(false);
        assert!(!schedule.resolve_at(at(monday(), 12, 0)).scheduled_occupied);

        schedule.clear_manual_override();
        assert!(schedule.resolve_at(at(monday(), 12, 0)).scheduled_occupied);
    }
}
