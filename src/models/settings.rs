// file: src/models/settings.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::recurrence::MonthEndPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Per-company planner preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSettings {
    pub month_end_policy: MonthEndPolicy,
    pub time_zone: chrono_tz::Tz,
    pub max_expansion_steps: u32,
    pub default_event_minutes: i64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            month_end_policy: MonthEndPolicy::Clamp,
            time_zone: chrono_tz::UTC,
            max_expansion_steps: 1000,
            default_event_minutes: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_settings_default() {
        let settings = PlannerSettings::default();
        assert_eq!(settings.month_end_policy, MonthEndPolicy::Clamp);
        assert_eq!(settings.time_zone, chrono_tz::UTC);
        assert_eq!(settings.max_expansion_steps, 1000);
        assert_eq!(settings.default_event_minutes, 60);
    }
}
