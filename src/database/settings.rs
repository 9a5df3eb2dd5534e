// file: src/database/settings.rs
use anyhow::Result;
use log::warn;
use sqlx::SqlitePool;

use crate::models::{MonthEndPolicy, PlannerSettings, Setting};

pub async fn get(pool: &SqlitePool, company_id: &str) -> Result<PlannerSettings> {
    let settings = sqlx::query_as::<_, Setting>("SELECT key, value FROM settings WHERE company_id = ?")
        .bind(company_id)
        .fetch_all(pool)
        .await?;

    // Missing or unparsable values keep their defaults.
    let defaults = PlannerSettings::default();
    let mut planner = defaults.clone();
    for setting in settings {
        match setting.key.as_str() {
            "month_end_policy" => {
                planner.month_end_policy =
                    MonthEndPolicy::parse(&setting.value).unwrap_or(defaults.month_end_policy)
            }
            "time_zone" => {
                planner.time_zone = setting.value.parse().unwrap_or_else(|_| {
                    warn!("Unknown time zone '{}' for company {}, using default", setting.value, company_id);
                    defaults.time_zone
                })
            }
            "max_expansion_steps" => {
                planner.max_expansion_steps = setting.value.parse().unwrap_or(defaults.max_expansion_steps)
            }
            "default_event_minutes" => {
                planner.default_event_minutes = setting.value.parse().unwrap_or(defaults.default_event_minutes)
            }
            _ => {}
        }
    }

    Ok(planner)
}

pub async fn update(pool: &SqlitePool, company_id: &str, settings: &PlannerSettings) -> Result<()> {
    let updates = [
        ("month_end_policy", settings.month_end_policy.as_str().to_string()),
        ("time_zone", settings.time_zone.name().to_string()),
        ("max_expansion_steps", settings.max_expansion_steps.to_string()),
        ("default_event_minutes", settings.default_event_minutes.to_string()),
    ];

    for (key, value) in updates {
        sqlx::query(
            r#"
            INSERT INTO settings (company_id, key, value) VALUES (?, ?, ?)
            ON CONFLICT(company_id, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(company_id)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    }

    Ok(())
}
