use std::collections::{HashMap, HashSet};
use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::Ship;
use crate::error::{Error, Result};
use crate::item::{rfc2822_gmt, Item};

/// Title prefixes a ship name ends before, tried in order.
const TITLE_SEPARATORS: [&str; 3] = [" Arrived", " Departed", " — "];

/// Render an RSS 2.0 channel with one `<item>` per entry of `items`, in order.
pub fn build_rss(channel_title: &str, channel_link: &str, items: &[Item]) -> Result<String> {
    build_rss_at(channel_title, channel_link, items, Utc::now())
}

pub fn build_rss_at(
    channel_title: &str,
    channel_link: &str,
    items: &[Item],
    built_at: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(feed_err)?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss_start)).map_err(feed_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(feed_err)?;
    write_text_element(&mut writer, "title", channel_title)?;
    write_text_element(&mut writer, "link", channel_link)?;
    write_text_element(&mut writer, "description", &format!("{channel_title} - Auto-generated"))?;
    write_text_element(&mut writer, "lastBuildDate", &rfc2822_gmt(&built_at))?;

    for it in items {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(feed_err)?;
        write_text_element(&mut writer, "title", &it.title)?;
        write_text_element(&mut writer, "link", &it.link)?;
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        write_element_with(&mut writer, guid, &it.guid)?;
        write_text_element(&mut writer, "pubDate", &it.pub_date)?;
        write_text_element(&mut writer, "description", &it.description)?;
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(feed_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(feed_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(feed_err)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    String::from_utf8(out).map_err(feed_err)
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    write_element_with(w, BytesStart::new(name), text)
}

fn write_element_with<W: Write>(w: &mut Writer<W>, start: BytesStart<'_>, text: &str) -> Result<()> {
    let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    w.write_event(Event::Start(start)).map_err(feed_err)?;
    let clean = sanitize_text(text);
    w.write_event(Event::Text(BytesText::from_escaped(partial_escape(&clean))))
        .map_err(feed_err)?;
    w.write_event(Event::End(end)).map_err(feed_err)?;
    Ok(())
}

// Remove Cc control characters except tab, LF and CR; XML 1.0 forbids them.
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c as u32 >= 0x20)
        .collect()
}

fn feed_err(e: impl std::fmt::Display) -> Error {
    Error::Feed(e.to_string())
}

/// The first (newest) item of every ship present in `items`.
///
/// Items are grouped by their ship slug. Items written before the slug was
/// recorded are grouped by the ship name found at the start of their title,
/// mapped back to a slug when a configured ship carries that name.
pub fn latest_per_ship(items: &[Item], ships: &[Ship]) -> Vec<Item> {
    let slug_by_name: HashMap<&str, &str> = ships
        .iter()
        .map(|s| (s.name.as_str(), s.slug.as_str()))
        .collect();

    let mut taken = HashSet::new();
    let mut latest = Vec::new();
    for it in items {
        let key = match &it.ship {
            Some(slug) => slug.clone(),
            None => {
                let name = ship_name_from_title(&it.title);
                slug_by_name
                    .get(name)
                    .map_or_else(|| name.to_string(), |slug| slug.to_string())
            }
        };
        if taken.insert(key) {
            latest.push(it.clone());
        }
    }
    latest
}

/// Ship name at the start of an item title, or the whole title.
pub fn ship_name_from_title(title: &str) -> &str {
    TITLE_SEPARATORS
        .iter()
        .find_map(|sep| title.split_once(sep).map(|(name, _)| name))
        .unwrap_or(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn item(guid: &str, title: &str, ship: Option<&str>) -> Item {
        Item {
            title: title.into(),
            description: format!("{guid} <detail> & more"),
            link: "https://www.vesselfinder.com/ports/BSNAS001?a=1&b=2".into(),
            guid: guid.into(),
            pub_date: "Mon, 03 Nov 2025 22:30:00 GMT".into(),
            ship: ship.map(String::from),
        }
    }

    fn built_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 8, 0, 0).unwrap()
    }

    #[test]
    fn writes_channel_and_items_in_order() {
        let items = vec![
            item("g1", "Disney Wish Arrived at Nassau", Some("wish")),
            item("g2", "Disney Wish Departed from Nassau", Some("wish")),
        ];
        let xml = build_rss_at("Disney Wish - Arrivals & Departures", "https://x.test/", &items, built_at()).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains("<title>Disney Wish - Arrivals &amp; Departures</title>"));
        assert!(xml.contains("<description>Disney Wish - Arrivals &amp; Departures - Auto-generated</description>"));
        assert!(xml.contains("<lastBuildDate>Tue, 04 Nov 2025 08:00:00 GMT</lastBuildDate>"));
        assert!(xml.contains(r#"<guid isPermaLink="false">g1</guid>"#));
        assert!(xml.contains("<pubDate>Mon, 03 Nov 2025 22:30:00 GMT</pubDate>"));
        assert_eq!(xml.matches("<item>").count(), 2);
        assert!(xml.find("g1").unwrap() < xml.find("g2").unwrap());
    }

    #[test]
    fn escapes_markup_in_text() {
        let xml = build_rss_at("A", "B", &[item("g", "Ship <A> & Co", None)], built_at()).unwrap();

        assert!(xml.contains("<title>Ship &lt;A&gt; &amp; Co</title>"));
        assert!(xml.contains("<description>g &lt;detail&gt; &amp; more</description>"));
        assert!(xml.contains("<link>https://www.vesselfinder.com/ports/BSNAS001?a=1&amp;b=2</link>"));
    }

    #[test]
    fn empty_channel_is_valid() {
        let xml = build_rss_at("Empty", "https://x.test/", &[], built_at()).unwrap();

        assert!(!xml.contains("<item>"));
        assert!(xml.contains("<channel>"));
        assert!(xml.trim_end().ends_with("</rss>"));
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize_text("a\u{0}b\u{1b}c\td\n"), "abc\td\n");
    }

    #[test]
    fn ship_name_from_known_title_shapes() {
        assert_eq!(
            ship_name_from_title("Disney Wish Arrived at Nassau at Nov 03, 05:05 PM EST"),
            "Disney Wish"
        );
        assert_eq!(ship_name_from_title("Disney Dream Departed from Cozumel"), "Disney Dream");
        assert_eq!(ship_name_from_title("Disney Magic — Departure — Galveston"), "Disney Magic");
        assert_eq!(ship_name_from_title("Something else"), "Something else");
    }

    #[test]
    fn latest_keeps_first_item_per_ship() {
        let ships = vec![Ship {
            name: "Disney Wish".into(),
            slug: "wish".into(),
            url: "https://x.test/wish".into(),
        }];
        let items = vec![
            item("w2", "Disney Wish Departed from Nassau", Some("wish")),
            item("d1", "Disney Dream Arrived at Cozumel", Some("dream")),
            item("w1", "Disney Wish Arrived at Nassau", None),
            item("m1", "Disney Magic — Arrival — Galveston", None),
            item("d0", "Disney Dream Departed from Nassau", Some("dream")),
        ];

        let latest = latest_per_ship(&items, &ships);
        let guids: Vec<&str> = latest.iter().map(|it| it.guid.as_str()).collect();
        assert_eq!(guids, ["w2", "d1", "m1"]);
    }
}
