//! Human-readable arrival/departure times.
//!
//! The tracking site prints timestamps such as `Nov 3, 22:05` in UTC with no
//! year. They are shown once in the reference zone (US Eastern) and once in the
//! zone of the port, guessed from the port name.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::{OffsetName, Tz};

/// Zone every notification is expressed in, and the zone used for unknown ports.
pub const REFERENCE_TZ: Tz = chrono_tz::America::New_York;

/// Label printed after reference times in every season.
pub const REFERENCE_LABEL: &str = "EST";

const TIME_PATTERNS: [&str; 2] = ["%Y %b %d, %H:%M", "%Y %b %d, %H:%M:%S"];

// Case-insensitive substring of the port name -> IANA zone. First match wins,
// so more specific needles must come before the ones they contain.
static PORT_ZONES: &[(&str, &str)] = &[
    // North America / Caribbean / Bahamas
    ("canaveral", "America/New_York"),
    ("everglades", "America/New_York"),
    ("fort lauderdale", "America/New_York"),
    ("castaway", "America/Nassau"),
    ("lookout cay", "America/Nassau"),
    ("nassau", "America/Nassau"),
    ("cozumel", "America/Cancun"),
    ("progreso", "America/Merida"),
    ("galveston", "America/Chicago"),
    ("san juan", "America/Puerto_Rico"),
    ("tortola", "America/Tortola"),
    ("st. maarten", "America/Lower_Princes"),
    ("st maarten", "America/Lower_Princes"),
    ("basseterre", "America/St_Kitts"),
    ("antigua", "America/Antigua"),
    ("falmouth", "America/Jamaica"),
    ("castries", "America/St_Lucia"),
    ("st. lucia", "America/St_Lucia"),
    ("curaçao", "America/Curacao"),
    ("curacao", "America/Curacao"),
    ("willemstad", "America/Curacao"),
    ("aruba", "America/Aruba"),
    ("cayman", "America/Cayman"),
    ("roseau", "America/Dominica"),
    ("dominica", "America/Dominica"),
    // Mexico Pacific
    ("cabo", "America/Mazatlan"),
    ("ensenada", "America/Tijuana"),
    ("vallarta", "America/Bahia_Banderas"),
    // Alaska
    ("juneau", "America/Juneau"),
    ("skagway", "America/Juneau"),
    ("ketchikan", "America/Sitka"),
    ("icy strait", "America/Juneau"),
    ("glacier viewing", "America/Juneau"),
    // Hawaii
    ("honolulu", "Pacific/Honolulu"),
    ("kahului", "Pacific/Honolulu"),
    ("nawiliwili", "Pacific/Honolulu"),
    ("hilo", "Pacific/Honolulu"),
    // Oceania
    ("auckland", "Pacific/Auckland"),
    ("wellington", "Pacific/Auckland"),
    ("tauranga", "Pacific/Auckland"),
    ("christchurch", "Pacific/Auckland"),
    ("lyttelton", "Pacific/Auckland"),
    ("eden", "Australia/Sydney"),
    ("hobart", "Australia/Hobart"),
    ("melbourne", "Australia/Melbourne"),
    ("sydney", "Australia/Sydney"),
    ("noumea", "Pacific/Noumea"),
    ("suva", "Pacific/Fiji"),
    ("pago pago", "Pacific/Pago_Pago"),
    // Europe / Mediterranean / UK
    ("southampton", "Europe/London"),
    ("liverpool", "Europe/London"),
    ("portland", "Europe/London"),
    ("greenock", "Europe/London"),
    ("amsterdam", "Europe/Amsterdam"),
    ("rotterdam", "Europe/Amsterdam"),
    ("zeebrugge", "Europe/Brussels"),
    ("vigo", "Europe/Madrid"),
    ("bilbao", "Europe/Madrid"),
    ("malaga", "Europe/Madrid"),
    ("barcelona", "Europe/Madrid"),
    ("cadiz", "Europe/Madrid"),
    ("cartagena", "Europe/Madrid"),
    ("alesund", "Europe/Oslo"),
    ("bergen", "Europe/Oslo"),
    ("olden", "Europe/Oslo"),
    ("haugesund", "Europe/Oslo"),
    ("stavanger", "Europe/Oslo"),
    ("mekjarvik", "Europe/Oslo"),
    ("messina", "Europe/Rome"),
    ("civitavecchia", "Europe/Rome"),
    ("rome", "Europe/Rome"),
    ("naples", "Europe/Rome"),
    ("livorno", "Europe/Rome"),
    ("ajaccio", "Europe/Paris"),
    ("la coruna", "Europe/Madrid"),
    ("coruna", "Europe/Madrid"),
    ("chania", "Europe/Athens"),
    ("corfu", "Europe/Athens"),
    ("argostoli", "Europe/Athens"),
    ("santorini", "Europe/Athens"),
    ("mykonos", "Europe/Athens"),
    ("dubrovnik", "Europe/Zagreb"),
    ("athens", "Europe/Athens"),
    ("piraeus", "Europe/Athens"),
    ("valetta", "Europe/Malta"),
    ("malta", "Europe/Malta"),
    ("funchal", "Atlantic/Madeira"),
    // Canada
    ("vancouver", "America/Vancouver"),
    ("victoria", "America/Vancouver"),
];

/// Formatted times for one event. Both are `None` when the raw text could not
/// be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTimes {
    pub reference: Option<String>,
    pub local: Option<String>,
}

/// Format `raw` as a timestamp of `year`.
pub fn format_times_in_year(port: &str, raw: &str, year: i32) -> EventTimes {
    let Some(utc) = parse_utc(raw, year) else {
        return EventTimes::default();
    };
    EventTimes {
        reference: Some(format_reference(&utc)),
        local: Some(format_in(&utc, port_zone(port))),
    }
}

/// Parse `Nov 3, 22:05` or `Nov 3, 22:05:30` as a UTC instant in `year`.
pub fn parse_utc(raw: &str, year: i32) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let dated = format!("{year} {raw}");
    TIME_PATTERNS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&dated, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Zone of the first table entry whose needle occurs in `port`; the reference
/// zone when nothing matches or the matched identifier is unknown.
pub fn port_zone(port: &str) -> Tz {
    let name = port.to_lowercase();
    PORT_ZONES
        .iter()
        .find(|(needle, _)| name.contains(needle))
        .and_then(|(_, zone)| zone.parse::<Tz>().ok())
        .unwrap_or(REFERENCE_TZ)
}

fn format_reference(utc: &DateTime<Utc>) -> String {
    let local = utc.with_timezone(&REFERENCE_TZ);
    format!("{} {}", local.format("%b %d, %I:%M %p"), REFERENCE_LABEL)
}

fn format_in(utc: &DateTime<Utc>, tz: Tz) -> String {
    let local = utc.with_timezone(&tz);
    let abbr = match local.offset().abbreviation() {
        Some(abbr) if !abbr.trim().is_empty() => abbr.to_string(),
        _ => tz.name().to_string(),
    };
    format!("{} {}", local.format("%b %d, %I:%M %p"), abbr)
}
