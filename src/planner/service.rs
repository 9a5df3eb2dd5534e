use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::time::Instant;

use super::expand::{expand, ExpansionOptions};
use super::ics;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::models::{CalendarEvent, EventPatch, EventStatus, NewEvent, Occurrence};
use crate::subscription::Subscription;
use crate::utils::logging::{log_database_operation, log_expansion};
use crate::utils::{non_blank, normalize_text};

pub struct PlannerService {
    ctx: AppContext,
}

impl PlannerService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    async fn expansion_options(&self) -> AppResult<ExpansionOptions> {
        let settings = self.ctx.db.get_planner_settings(self.ctx.session.company_id()).await?;
        Ok(ExpansionOptions::from(&settings))
    }

    pub async fn create_event(&self, new: NewEvent) -> AppResult<CalendarEvent> {
        let session = &self.ctx.session;
        session.ensure_subscription_active(Utc::now())?;

        let mut end = new.end;
        if end == new.start && !new.all_day {
            let settings = self.ctx.db.get_planner_settings(session.company_id()).await?;
            end = new.start + Duration::minutes(settings.default_event_minutes.max(1));
        }

        let now = Utc::now();
        let event = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: session.company_id().to_string(),
            title: normalize_text(&new.title),
            description: non_blank(new.description.as_deref()),
            location: non_blank(new.location.as_deref()),
            start: new.start,
            end,
            all_day: new.all_day,
            recurrence: new.recurrence,
            created_by: session.user_id().to_string(),
            client_id: new.client_id,
            status: EventStatus::Scheduled,
            event_type: new.event_type,
            created_at: now,
            updated_at: now,
        };
        validate_event(&event)?;

        self.ctx.db.insert_event(&event).await?;
        info!("Created event {} for {}", event.id, event.created_by);

        self.publish_templates(&event.created_by).await?;
        Ok(event)
    }

    pub async fn get_event(&self, event_id: &str) -> AppResult<CalendarEvent> {
        let event = self
            .ctx
            .db
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {}", event_id)))?;
        self.ctx.session.ensure_same_company(&event.company_id)?;
        Ok(event)
    }

    async fn get_owned_event(&self, event_id: &str) -> AppResult<CalendarEvent> {
        let event = self.get_event(event_id).await?;
        if event.created_by != self.ctx.session.user_id() {
            return Err(AppError::permission_denied("only the owner can change this event"));
        }
        Ok(event)
    }

    pub async fn update_event(&self, event_id: &str, patch: EventPatch) -> AppResult<CalendarEvent> {
        self.ctx.session.ensure_subscription_active(Utc::now())?;
        let mut event = self.get_owned_event(event_id).await?;

        patch.apply(&mut event);
        event.title = normalize_text(&event.title);
        event.updated_at = Utc::now();
        validate_event(&event)?;

        if !self.ctx.db.update_event(&event).await? {
            return Err(AppError::not_found(format!("event {}", event_id)));
        }
        debug!("Updated event {}", event.id);

        self.publish_templates(&event.created_by).await?;
        Ok(event)
    }

    pub async fn delete_event(&self, event_id: &str) -> AppResult<()> {
        let event = self.get_owned_event(event_id).await?;

        if !self.ctx.db.delete_event(&event.id).await? {
            return Err(AppError::not_found(format!("event {}", event_id)));
        }
        info!("Deleted event {}", event.id);

        self.publish_templates(&event.created_by).await
    }

    /// Stored templates of `owner_id` in this company, earliest first.
    pub async fn list_templates(&self, owner_id: &str) -> AppResult<Vec<CalendarEvent>> {
        let company_id = self.ctx.session.company_id();
        let mut templates = self.ctx.db.get_events_by_owner(owner_id).await?;
        templates.retain(|e| e.company_id == company_id);
        Ok(templates)
    }

    /// Every occurrence of `owner_id`'s events starting inside the window,
    /// ordered by start, then title, then id.
    pub async fn events_in_range(
        &self,
        owner_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<Occurrence>> {
        if window_start > window_end {
            return Err(AppError::invalid_input("window start must not be after window end"));
        }

        let started = Instant::now();
        let company_id = self.ctx.session.company_id();
        let templates = self
            .ctx
            .db
            .get_event_candidates(owner_id, window_start, window_end)
            .await?;
        log_database_operation("select candidates", "events", started.elapsed().as_millis() as u64);

        let options = self.expansion_options().await?;
        let mut occurrences = Vec::new();
        for template in templates.iter().filter(|t| t.company_id == company_id) {
            let expansion = expand(template, window_start, window_end, &options);
            log_expansion(
                &template.id,
                expansion.occurrences.len(),
                expansion.steps,
                expansion.termination.as_str(),
            );
            occurrences.extend(expansion.occurrences);
        }

        occurrences.sort_by(|a, b| {
            a.start()
                .cmp(&b.start())
                .then_with(|| a.event.title.cmp(&b.event.title))
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        Ok(occurrences)
    }

    /// Live snapshots of `owner_id`'s templates. The first snapshot is
    /// available immediately.
    pub async fn watch_events(&self, owner_id: &str) -> AppResult<Subscription<Vec<CalendarEvent>>> {
        let subscription = self.ctx.events.subscribe(&owner_id.to_string()).await;
        if subscription.latest().is_none() {
            self.publish_templates(owner_id).await?;
        }
        Ok(subscription)
    }

    pub async fn export_ics(
        &self,
        owner_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<String> {
        let occurrences = self.events_in_range(owner_id, window_start, window_end).await?;
        let name = format!("{} planner", self.ctx.session.company.name);
        Ok(ics::render_calendar(&name, &occurrences))
    }

    async fn publish_templates(&self, owner_id: &str) -> AppResult<()> {
        let templates = self.list_templates(owner_id).await?;
        self.ctx.events.publish(&owner_id.to_string(), templates).await;
        Ok(())
    }
}

fn validate_event(event: &CalendarEvent) -> AppResult<()> {
    if event.title.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    if event.end < event.start {
        return Err(AppError::invalid_input("event must not end before it starts"));
    }
    if let Some(rule) = &event.recurrence {
        rule.validate()?;
        if let Some(end_date) = rule.end_date {
            if end_date < event.start {
                return Err(AppError::invalid_recurrence("end date is before the first occurrence"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{colleague, create_test_context};
    use crate::models::{MonthEndPolicy, PlannerSettings, RecurrenceKind, RecurrenceRule, Role};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    async fn service() -> PlannerService {
        PlannerService::new(create_test_context(Role::Logistics).await)
    }

    #[tokio::test]
    async fn test_create_event_normalizes_and_owns() {
        let planner = service().await;
        let mut new = NewEvent::new("  Tarp   install ", at(2024, 1, 8, 9), at(2024, 1, 8, 11));
        new.location = Some("   ".to_string());

        let event = planner.create_event(new).await.unwrap();
        assert_eq!(event.title, "Tarp install");
        assert_eq!(event.location, None);
        assert_eq!(event.created_by, planner.ctx.session.user_id());
        assert_eq!(planner.get_event(&event.id).await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_create_event_rejects_bad_input() {
        let planner = service().await;

        let blank = NewEvent::new("   ", at(2024, 1, 8, 9), at(2024, 1, 8, 10));
        assert!(matches!(planner.create_event(blank).await, Err(AppError::InvalidInput(_))));

        let backwards = NewEvent::new("Survey", at(2024, 1, 8, 9), at(2024, 1, 8, 8));
        assert!(matches!(planner.create_event(backwards).await, Err(AppError::InvalidInput(_))));

        let zero = NewEvent::new("Survey", at(2024, 1, 8, 9), at(2024, 1, 8, 10))
            .with_recurrence(RecurrenceRule::daily(0));
        assert!(matches!(planner.create_event(zero).await, Err(AppError::InvalidRecurrence(_))));
    }

    #[tokio::test]
    async fn test_zero_length_event_gets_default_duration() {
        let planner = service().await;
        let start = at(2024, 2, 1, 14);
        let event = planner.create_event(NewEvent::new("Call client", start, start)).await.unwrap();
        assert_eq!(event.end - event.start, Duration::minutes(60));
    }

    #[tokio::test]
    async fn test_only_owner_mutates() {
        let planner = service().await;
        let event = planner
            .create_event(NewEvent::new("Permit follow-up", at(2024, 3, 1, 9), at(2024, 3, 1, 10)))
            .await
            .unwrap();

        let other = PlannerService::new(colleague(&planner.ctx, Role::Admin).await);
        assert!(other.get_event(&event.id).await.is_ok());

        let patch = EventPatch {
            title: Some("Hijacked".to_string()),
            ..EventPatch::default()
        };
        assert!(matches!(
            other.update_event(&event.id, patch).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(other.delete_event(&event.id).await, Err(AppError::PermissionDenied(_))));

        planner.delete_event(&event.id).await.unwrap();
        assert!(matches!(planner.get_event(&event.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_event_validates_recurrence() {
        let planner = service().await;
        let event = planner
            .create_event(NewEvent::new("Lightbox swap", at(2024, 3, 1, 9), at(2024, 3, 1, 10)))
            .await
            .unwrap();

        let bad = EventPatch {
            recurrence: Some(Some(RecurrenceRule::weekly(1).times(0))),
            ..EventPatch::default()
        };
        assert!(matches!(
            planner.update_event(&event.id, bad).await,
            Err(AppError::InvalidRecurrence(_))
        ));

        let good = EventPatch {
            recurrence: Some(Some(RecurrenceRule::weekly(2))),
            status: Some(EventStatus::Confirmed),
            ..EventPatch::default()
        };
        let updated = planner.update_event(&event.id, good).await.unwrap();
        assert_eq!(updated.status, EventStatus::Confirmed);
        assert_eq!(planner.get_event(&event.id).await.unwrap().recurrence, updated.recurrence);
    }

    #[tokio::test]
    async fn test_events_in_range_merges_and_sorts() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();

        planner
            .create_event(
                NewEvent::new("Billboard check", at(2024, 1, 1, 9), at(2024, 1, 1, 10))
                    .with_recurrence(RecurrenceRule::weekly(2)),
            )
            .await
            .unwrap();
        planner
            .create_event(NewEvent::new("Audit", at(2024, 1, 15, 9), at(2024, 1, 15, 12)))
            .await
            .unwrap();
        planner
            .create_event(NewEvent::new("Old job", at(2023, 6, 1, 9), at(2023, 6, 1, 10)))
            .await
            .unwrap();

        let occurrences = planner
            .events_in_range(&owner, at(2024, 1, 1, 0), at(2024, 1, 31, 23))
            .await
            .unwrap();
        let titles: Vec<_> = occurrences.iter().map(|o| o.event.title.as_str()).collect();
        assert_eq!(titles, vec!["Billboard check", "Audit", "Billboard check", "Billboard check"]);
        assert!(!occurrences[1].is_recurring_instance);
        assert_eq!(occurrences[3].sequence, 2);
    }

    #[tokio::test]
    async fn test_events_in_range_rejects_inverted_window() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();
        let err = planner
            .events_in_range(&owner, at(2024, 2, 1, 0), at(2024, 1, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_events_in_range_uses_company_settings() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();
        let settings = PlannerSettings {
            month_end_policy: MonthEndPolicy::Overflow,
            ..PlannerSettings::default()
        };
        planner
            .ctx
            .db
            .update_planner_settings(planner.ctx.session.company_id(), &settings)
            .await
            .unwrap();

        planner
            .create_event(
                NewEvent::new("Month-end billing", at(2024, 1, 31, 9), at(2024, 1, 31, 10))
                    .with_recurrence(RecurrenceRule::monthly(1)),
            )
            .await
            .unwrap();

        let occurrences = planner
            .events_in_range(&owner, at(2024, 2, 1, 0), at(2024, 3, 31, 23))
            .await
            .unwrap();
        let starts: Vec<_> = occurrences.iter().map(|o| o.start()).collect();
        assert_eq!(starts, vec![at(2024, 3, 2, 9), at(2024, 3, 31, 9)]);
    }

    #[tokio::test]
    async fn test_unknown_kind_from_storage_expands_once() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();
        let event = planner
            .create_event(
                NewEvent::new("Legacy rule", at(2024, 1, 2, 9), at(2024, 1, 2, 10))
                    .with_recurrence(RecurrenceRule::new(RecurrenceKind::Unknown("fortnightly".into()), 1)),
            )
            .await
            .unwrap();

        let occurrences = planner
            .events_in_range(&owner, at(2024, 1, 1, 0), at(2024, 12, 31, 0))
            .await
            .unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].original_event_id.as_deref(), Some(event.id.as_str()));
    }

    #[tokio::test]
    async fn test_watch_events_sees_latest_snapshot() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();

        let mut feed = planner.watch_events(&owner).await.unwrap();
        assert_eq!(feed.latest(), Some(Vec::new()));

        planner
            .create_event(NewEvent::new("Night install", at(2024, 4, 1, 22), at(2024, 4, 2, 2)))
            .await
            .unwrap();
        planner
            .create_event(NewEvent::new("Morning check", at(2024, 4, 2, 7), at(2024, 4, 2, 8)))
            .await
            .unwrap();

        let snapshot = feed.changed().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].title, "Night install");
    }

    #[tokio::test]
    async fn test_export_ics() {
        let planner = service().await;
        let owner = planner.ctx.session.user_id().to_string();
        planner
            .create_event(
                NewEvent::new("Panel cleaning", at(2024, 5, 1, 6), at(2024, 5, 1, 8))
                    .with_recurrence(RecurrenceRule::daily(1).times(3)),
            )
            .await
            .unwrap();

        let text = planner
            .export_ics(&owner, at(2024, 5, 1, 0), at(2024, 5, 31, 0))
            .await
            .unwrap();
        assert_eq!(text.matches("BEGIN:VEVENT").count(), 3);
    }
}
