//! The weekly cycle gating who travels to work on a given day.
use serde::{Deserialize, Serialize};

/// Which work rule a day follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DayRule {
    Weekday,
    Saturday,
    Sunday,
}

/// Sectors whose workers stay home under the Saturday rule.
const SATURDAY_IDLE_SECTORS: [u8; 4] = [11, 15, 16, 21];
/// Sectors whose workers stay home under the Sunday rule.
const SUNDAY_IDLE_SECTORS: [u8; 12] = [3, 6, 10, 11, 12, 13, 14, 15, 16, 19, 20, 21];

impl DayRule {
    /// Whether a worker of `sector` commutes as usual under this rule. Otherwise the worker
    /// resolves its work mode at home.
    pub fn travels(self, sector: u8) -> bool {
        match self {
            DayRule::Weekday => true,
            DayRule::Saturday => !SATURDAY_IDLE_SECTORS.contains(&sector),
            DayRule::Sunday => !SUNDAY_IDLE_SECTORS.contains(&sector),
        }
    }
}

/// Holidays, grouped by the weekend rule they follow. Day 0 is a Sunday.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    pub saturday_rule_days: Vec<u32>,
    pub sunday_rule_days: Vec<u32>,
}

impl Default for Calendar {
    fn default() -> Self {
        Calendar {
            saturday_rule_days: vec![40, 120, 137],
            sunday_rule_days: vec![61, 81],
        }
    }
}

impl Calendar {
    /// Day of the week in 1..=7 with Monday at 1; day 0 maps to 7.
    pub fn weekday(day: u32) -> u32 {
        (day + 6) % 7 + 1
    }

    pub fn is_holiday(&self, day: u32) -> bool {
        self.saturday_rule_days.contains(&day) || self.sunday_rule_days.contains(&day)
    }

    pub fn rule(&self, day: u32) -> DayRule {
        let weekday = Calendar::weekday(day);
        if weekday <= 5 && !self.is_holiday(day) {
            DayRule::Weekday
        } else if weekday == 6 || self.saturday_rule_days.contains(&day) {
            DayRule::Saturday
        } else {
            DayRule::Sunday
        }
    }

    /// Live-in domestic workers travel Monday through Saturday outside holidays.
    pub fn live_in_workday(&self, day: u32) -> bool {
        Calendar::weekday(day) <= 6 && !self.is_holiday(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_zero_is_sunday() {
        assert_eq!(Calendar::weekday(0), 7);
        assert_eq!(Calendar::weekday(1), 1);
        assert_eq!(Calendar::weekday(6), 6);
        assert_eq!(Calendar::weekday(7), 7);
    }

    #[test]
    fn rules_follow_week_and_holidays() {
        let calendar = Calendar::default();
        assert_eq!(calendar.rule(1), DayRule::Weekday);
        assert_eq!(calendar.rule(6), DayRule::Saturday);
        assert_eq!(calendar.rule(7), DayRule::Sunday);
        // Days 40 and 61 are both Fridays.
        assert_eq!(calendar.rule(40), DayRule::Saturday);
        assert_eq!(calendar.rule(61), DayRule::Sunday);
        assert!(!calendar.live_in_workday(40));
        assert!(calendar.live_in_workday(41));
        assert!(!calendar.live_in_workday(42));
    }

    #[test]
    fn idle_sectors() {
        assert!(DayRule::Weekday.travels(16));
        assert!(!DayRule::Saturday.travels(16));
        assert!(DayRule::Saturday.travels(3));
        assert!(!DayRule::Sunday.travels(3));
        assert!(DayRule::Sunday.travels(7));
    }
}
