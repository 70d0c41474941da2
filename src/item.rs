//! Feed items and the dedup step that turns scraped events into them.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use url::Url;

use crate::config::Ship;
use crate::extract::{EventKind, RawEvent};
use crate::store::SeenState;
use crate::timefmt::{self, EventTimes};

/// A published feed entry. Also the unit stored in histories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    pub guid: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    /// Slug of the ship the item belongs to. Absent in older histories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship: Option<String>,
}

/// Stable id of an event: hex SHA-1 of `slug|Kind|detail`.
pub fn event_guid(slug: &str, kind: EventKind, detail: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{slug}|{kind}|{detail}").as_bytes());
    hex::encode(hasher.finalize())
}

/// RFC 2822 date in GMT, as RSS readers expect it.
pub fn rfc2822_gmt(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Turn freshly scraped events into items, skipping (and then remembering)
/// everything already published. Output keeps extraction order.
pub fn accept_events(
    seen: &mut SeenState,
    ship: &Ship,
    base: &Url,
    events: &[RawEvent],
    now: DateTime<Utc>,
) -> Vec<Item> {
    let mut accepted = Vec::new();
    for event in events {
        let guid = event_guid(&ship.slug, event.kind, &event.detail);
        if seen.is_seen(&guid) {
            continue;
        }
        let times = timefmt::format_times_in_year(&event.port, &event.when_raw, now.year());
        accepted.push(build_item(ship, base, event, &times, guid.clone(), now));
        seen.mark_seen(&guid);
    }
    accepted
}

pub fn build_item(
    ship: &Ship,
    base: &Url,
    event: &RawEvent,
    times: &EventTimes,
    guid: String,
    now: DateTime<Utc>,
) -> Item {
    Item {
        title: item_title(&ship.name, event, times),
        description: item_description(event, times),
        link: resolve_link(base, &event.link),
        guid,
        pub_date: rfc2822_gmt(&now),
        ship: Some(ship.slug.clone()),
    }
}

pub fn item_title(ship_name: &str, event: &RawEvent, times: &EventTimes) -> String {
    let verb = match event.kind {
        EventKind::Arrival => "Arrived at",
        EventKind::Departure => "Departed from",
    };
    match (&times.reference, &times.local) {
        (Some(reference), Some(local)) => format!(
            "{ship_name} {verb} {} at {reference}. The local time to the port is {local}",
            event.port
        ),
        (Some(reference), None) => format!("{ship_name} {verb} {} at {reference}", event.port),
        _ => format!("{ship_name} — {} — {}", event.kind, event.port),
    }
}

pub fn item_description(event: &RawEvent, times: &EventTimes) -> String {
    let base = event
        .detail
        .replace(" (UTC) -", " (UTC) (time not yet posted)");
    match (&times.reference, &times.local) {
        (Some(_), Some(local)) => format!("{base} — Local: {local}"),
        (Some(reference), None) => format!("{base} — Local (EST): {reference}"),
        _ => base,
    }
}

/// Port link made absolute against the ship page; the ship page itself when
/// the event carries no usable link.
fn resolve_link(base: &Url, link: &str) -> String {
    if link.is_empty() {
        return base.to_string();
    }
    base.join(link)
        .map(String::from)
        .unwrap_or_else(|_| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn wish() -> Ship {
        Ship {
            name: "Disney Wish".into(),
            slug: "wish".into(),
            url: "https://www.vesselfinder.com/vessels/details/9834739".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 22, 30, 0).unwrap()
    }

    fn base() -> Url {
        Url::parse(&wish().url).unwrap()
    }

    #[test]
    fn guid_is_stable_sha1_hex() {
        let a = event_guid("wish", EventKind::Arrival, "Nassau Arrival (UTC) Nov 3, 22:05");
        let b = event_guid("wish", EventKind::Arrival, "Nassau Arrival (UTC) Nov 3, 22:05");

        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn guid_changes_with_any_component() {
        let base = event_guid("wish", EventKind::Arrival, "Nassau Arrival (UTC) Nov 3, 22:05");

        assert_ne!(base, event_guid("wish", EventKind::Arrival, "Nassau Arrival (UTC) Nov 3, 22:06"));
        assert_ne!(base, event_guid("dream", EventKind::Arrival, "Nassau Arrival (UTC) Nov 3, 22:05"));
        assert_ne!(base, event_guid("wish", EventKind::Departure, "Nassau Arrival (UTC) Nov 3, 22:05"));
    }

    #[test]
    fn guid_matches_known_digest() {
        // sha1("abc")
        let mut hasher = Sha1::new();
        hasher.update(b"abc");
        assert_eq!(
            hex::encode(hasher.finalize()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn nassau_arrival_builds_full_title() {
        let mut seen = SeenState::default();
        let event = RawEvent::new(EventKind::Arrival, "Nassau", "Nov 3, 22:05", "/ports/BSNAS001");

        let items = accept_events(&mut seen, &wish(), &base(), &[event], now());

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(
            item.title,
            "Disney Wish Arrived at Nassau at Nov 03, 05:05 PM EST. The local time to the port is Nov 03, 05:05 PM EST"
        );
        assert_eq!(
            item.description,
            "Nassau Arrival (UTC) Nov 3, 22:05 — Local: Nov 03, 05:05 PM EST"
        );
        assert_eq!(item.link, "https://www.vesselfinder.com/ports/BSNAS001");
        assert_eq!(item.pub_date, "Mon, 03 Nov 2025 22:30:00 GMT");
        assert_eq!(item.guid.len(), 40);
        assert_eq!(item.ship.as_deref(), Some("wish"));
        assert!(seen.is_seen(&item.guid));
    }

    #[test]
    fn second_pass_accepts_nothing() {
        let mut seen = SeenState::default();
        let events = vec![
            RawEvent::new(EventKind::Arrival, "Nassau", "Nov 3, 22:05", ""),
            RawEvent::new(EventKind::Departure, "Nassau", "Nov 4, 06:30", ""),
        ];

        let first = accept_events(&mut seen, &wish(), &base(), &events, now());
        let second = accept_events(&mut seen, &wish(), &base(), &events, now());

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].guid, event_guid("wish", EventKind::Arrival, &events[0].detail));
        assert!(second.is_empty());
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn departure_without_time_uses_generic_title() {
        let event = RawEvent::new(EventKind::Departure, "Port Canaveral", "-", "");
        let times = EventTimes::default();

        assert_eq!(
            item_title("Disney Wish", &event, &times),
            "Disney Wish — Departure — Port Canaveral"
        );
        assert_eq!(
            item_description(&event, &times),
            "Port Canaveral Departure (UTC) (time not yet posted)"
        );
    }

    #[test]
    fn reference_only_templates() {
        let event = RawEvent::new(EventKind::Departure, "Cozumel", "Mar 2, 13:00", "");
        let times = EventTimes {
            reference: Some("Mar 02, 08:00 AM EST".into()),
            local: None,
        };

        assert_eq!(
            item_title("Disney Dream", &event, &times),
            "Disney Dream Departed from Cozumel at Mar 02, 08:00 AM EST"
        );
        assert_eq!(
            item_description(&event, &times),
            "Cozumel Departure (UTC) Mar 2, 13:00 — Local (EST): Mar 02, 08:00 AM EST"
        );
    }

    #[test]
    fn missing_link_points_at_ship_page() {
        assert_eq!(resolve_link(&base(), ""), base().to_string());
        assert_eq!(
            resolve_link(&base(), "https://example.com/port"),
            "https://example.com/port"
        );
    }
}
