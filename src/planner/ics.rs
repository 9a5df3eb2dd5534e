// iCalendar export of expanded occurrences

use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use icalendar::{Calendar as IcsCalendar, Component, Event as IcsEvent, EventLike, EventStatus as IcsStatus};

use crate::models::{EventStatus, Occurrence};

/// Render occurrences as a VCALENDAR document. Every occurrence becomes its
/// own VEVENT with the instance id as UID; no RRULE is emitted.
pub fn render_calendar(name: &str, occurrences: &[Occurrence]) -> String {
    let mut calendar = IcsCalendar::new();
    calendar.name(name);

    for occurrence in occurrences {
        calendar.push(to_ics_event(occurrence));
    }

    calendar.done().to_string()
}

fn to_ics_event(occurrence: &Occurrence) -> IcsEvent {
    let event = &occurrence.event;
    let mut ics = IcsEvent::new();
    ics.uid(&event.id).summary(&event.title);

    if event.all_day {
        let first = event.start.date_naive();
        ics.starts(first).ends(exclusive_end_date(first, event.end));
    } else {
        ics.starts(event.start).ends(event.end);
    }
    if let Some(description) = &event.description {
        ics.description(description);
    }
    if let Some(location) = &event.location {
        ics.location(location);
    }
    if let Some(original) = &occurrence.original_event_id {
        ics.add_property("RELATED-TO", original);
    }
    ics.add_property("CATEGORIES", event.event_type.as_str());
    ics.status(match event.status {
        EventStatus::Cancelled => IcsStatus::Cancelled,
        EventStatus::Confirmed | EventStatus::Completed => IcsStatus::Confirmed,
        EventStatus::Scheduled => IcsStatus::Tentative,
    });

    ics.done()
}

/// Day after the last covered day, as DTEND;VALUE=DATE expects. An end at
/// midnight already names that day. Never earlier than the day after `first`.
fn exclusive_end_date(first: NaiveDate, end: DateTime<Utc>) -> NaiveDate {
    let end_day = end.date_naive();
    let at_midnight = end.num_seconds_from_midnight() == 0 && end.nanosecond() == 0;
    let exclusive = if at_midnight {
        end_day
    } else {
        end_day.checked_add_days(Days::new(1)).unwrap_or(end_day)
    };
    let minimum = first.checked_add_days(Days::new(1)).unwrap_or(first);
    exclusive.max(minimum)
}
