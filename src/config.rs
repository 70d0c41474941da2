use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::store;

/// Slug reserved for the combined history and feed.
pub const ALL_SLUG: &str = "all";

/// portcall2rss - publish recent port calls of a fleet as RSS feeds
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Ship list: JSON array of {name, slug, url}
    #[arg(long, default_value = "ships.json")]
    pub ships: PathBuf,

    /// Persisted set of already published event ids
    #[arg(long, default_value = "state.json")]
    pub state: PathBuf,

    /// Directory receiving the generated feeds
    #[arg(long = "docs-dir", default_value = "docs")]
    pub docs_dir: PathBuf,

    /// Directory holding the rolling per-ship histories
    #[arg(long = "history-dir", default_value = "history")]
    pub history_dir: PathBuf,

    /// Maximum number of items kept per ship
    #[arg(long = "per-ship-cap", default_value_t = 50)]
    pub per_ship_cap: usize,

    /// Maximum number of items kept in the combined feed
    #[arg(long = "all-cap", default_value_t = 100)]
    pub all_cap: usize,

    /// Timeout in seconds for a single page fetch
    #[arg(short = 't', long = "timeout-secs", default_value_t = 40)]
    pub timeout_secs: u64,

    /// How pages are retrieved
    #[arg(long, value_enum, default_value_t = FetchMode::Http)]
    pub fetcher: FetchMode,

    /// Headless browser binary used by the rendered fetcher
    #[arg(long, default_value = "chromium")]
    pub browser: String,

    /// Host of the mobile site tried when the desktop page yields nothing (empty to disable)
    #[arg(long = "mobile-host", default_value = "m.vesselfinder.com")]
    pub mobile_host: String,

    /// Name used in the combined feed titles
    #[arg(long = "fleet-name", default_value = "DCL Ships")]
    pub fleet_name: String,

    /// Channel link of the combined feeds
    #[arg(long = "fleet-link", default_value = "https://github.com/")]
    pub fleet_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Plain HTTP GET of the page source
    Http,
    /// DOM dump of a headless browser render
    Rendered,
}

/// Resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ships_path: PathBuf,
    pub state_path: PathBuf,
    pub docs_dir: PathBuf,
    pub history_dir: PathBuf,
    pub per_ship_cap: usize,
    pub all_cap: usize,
    pub timeout: Duration,
    pub mobile_host: Option<String>,
    pub fleet_name: String,
    pub fleet_link: String,
}

impl From<&Args> for Settings {
    fn from(args: &Args) -> Self {
        let mobile_host = args.mobile_host.trim();
        Settings {
            ships_path: args.ships.clone(),
            state_path: args.state.clone(),
            docs_dir: args.docs_dir.clone(),
            history_dir: args.history_dir.clone(),
            per_ship_cap: args.per_ship_cap,
            all_cap: args.all_cap,
            timeout: Duration::from_secs(args.timeout_secs),
            mobile_host: (!mobile_host.is_empty()).then(|| mobile_host.to_string()),
            fleet_name: args.fleet_name.clone(),
            fleet_link: args.fleet_link.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub name: String,
    pub slug: String,
    pub url: String,
}

impl Ship {
    pub fn page_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|source| Error::Url {
            url: self.url.clone(),
            source,
        })
    }
}

/// Load and validate the ship list. A missing file is an empty fleet.
pub fn load_ships(path: &Path) -> Result<Vec<Ship>> {
    let ships: Vec<Ship> = store::load_json(path)?.unwrap_or_default();
    validate_ships(&ships)?;
    Ok(ships)
}

fn validate_ships(ships: &[Ship]) -> Result<()> {
    let mut slugs = HashSet::new();
    for ship in ships {
        let slug = ship.slug.as_str();
        if slug.is_empty() {
            return Err(Error::Ships(format!("ship {:?} has an empty slug", ship.name)));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Ships(format!(
                "slug {slug:?} may only contain letters, digits, '-' and '_'"
            )));
        }
        if slug == ALL_SLUG {
            return Err(Error::Ships(format!("slug {ALL_SLUG:?} is reserved")));
        }
        if !slugs.insert(slug) {
            return Err(Error::Ships(format!("duplicate slug {slug:?}")));
        }
    }
    Ok(())
}
