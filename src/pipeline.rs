//! One full pass over the fleet: fetch, extract, dedup, merge, publish.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{self, Settings, Ship, ALL_SLUG};
use crate::error::{Error, Result};
use crate::extract::{extract_events, ExtractOptions, RawEvent};
use crate::feed::{build_rss, latest_per_ship};
use crate::fetch::{mobile_url, Fetch, Profile};
use crate::item::{accept_events, Item};
use crate::store::{merge_items, HistoryStore, SeenState};

/// What a run did, for the final log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ships: usize,
    pub ships_without_events: usize,
    pub new_items: usize,
}

pub fn run(settings: &Settings, fetcher: &dyn Fetch) -> Result<RunSummary> {
    run_at(settings, fetcher, Utc::now())
}

/// One pass with `now` as the processing time. Every persisted file is read
/// before the first fetch and nothing is written until every ship is done, so
/// a malformed history aborts the run with the previous outputs untouched.
pub fn run_at(settings: &Settings, fetcher: &dyn Fetch, now: DateTime<Utc>) -> Result<RunSummary> {
    let ships = config::load_ships(&settings.ships_path)?;
    let mut seen = SeenState::load(&settings.state_path)?;
    let history = HistoryStore::new(&settings.history_dir);
    let mut ship_histories = ships
        .iter()
        .map(|ship| history.load(&ship.slug))
        .collect::<Result<Vec<_>>>()?;
    let all_history = history.load(ALL_SLUG)?;
    let opts = ExtractOptions::default();

    let mut summary = RunSummary {
        ships: ships.len(),
        ..RunSummary::default()
    };
    let mut all_new: Vec<Item> = Vec::new();

    for (ship, ship_history) in ships.iter().zip(ship_histories.iter_mut()) {
        let base = match ship.page_url() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(ship = %ship.name, error = %e, "skipping ship");
                None
            }
        };

        let events = match &base {
            Some(url) => events_for_ship(fetcher, ship, url, settings.mobile_host.as_deref(), &opts),
            None => Vec::new(),
        };
        if events.is_empty() {
            summary.ships_without_events += 1;
        }

        let new_items = match &base {
            Some(url) => accept_events(&mut seen, ship, url, &events, now),
            None => Vec::new(),
        };
        info!(ship = %ship.name, events = events.len(), new = new_items.len(), "processed");

        *ship_history = merge_items(ship_history, &new_items, settings.per_ship_cap);
        summary.new_items += new_items.len();
        all_new.extend(new_items);
    }

    let all_history = merge_items(&all_history, &all_new, settings.all_cap);

    fs::create_dir_all(&settings.docs_dir).map_err(|e| Error::io(&settings.docs_dir, e))?;
    for (ship, ship_history) in ships.iter().zip(&ship_histories) {
        history.save(&ship.slug, ship_history)?;
        write_feed(
            &settings.docs_dir.join(format!("{}.xml", ship.slug)),
            &build_rss(&format!("{} - Arrivals & Departures", ship.name), &ship.url, ship_history)?,
        )?;
        write_feed(
            &settings.docs_dir.join(format!("{}-latest.xml", ship.slug)),
            &build_rss(
                &format!("{} - Latest Arrival/Departure", ship.name),
                &ship.url,
                &ship_history[..ship_history.len().min(1)],
            )?,
        )?;
    }

    history.save(ALL_SLUG, &all_history)?;
    write_feed(
        &settings.docs_dir.join("all.xml"),
        &build_rss(
            &format!("{} - Arrivals & Departures (All)", settings.fleet_name),
            &settings.fleet_link,
            &all_history,
        )?,
    )?;
    write_feed(
        &settings.docs_dir.join("latest-all.xml"),
        &build_rss(
            &format!("{} - Latest (One per Ship)", settings.fleet_name),
            &settings.fleet_link,
            &latest_per_ship(&all_history, &ships),
        )?,
    )?;

    seen.save(&settings.state_path)?;
    Ok(summary)
}

/// Events for one ship: the desktop page first, then the mobile page when the
/// desktop one yields nothing. Fetch failures are logged and count as no events.
pub fn events_for_ship(
    fetcher: &dyn Fetch,
    ship: &Ship,
    url: &Url,
    mobile_host: Option<&str>,
    opts: &ExtractOptions,
) -> Vec<RawEvent> {
    let mobile = mobile_host.and_then(|host| mobile_url(url, host));
    let attempts = std::iter::once((url.clone(), Profile::Desktop))
        .chain(mobile.map(|m| (m, Profile::Mobile)));

    for (target, profile) in attempts {
        info!(ship = %ship.name, url = %target, ?profile, "fetching");
        match fetcher.fetch(&target, profile) {
            Ok(html) => {
                let events = extract_events(&html, opts);
                if !events.is_empty() {
                    return events;
                }
                debug!(ship = %ship.name, url = %target, "no port calls found on page");
            }
            Err(e) => warn!(ship = %ship.name, url = %target, error = %e, "fetch failed"),
        }
    }
    Vec::new()
}

fn write_feed(path: &Path, xml: &str) -> Result<()> {
    fs::write(path, xml).map_err(|e| Error::io(path, e))
}
