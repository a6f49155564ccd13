// src/ingest/parser.rs
//! RSS 2.0, RSS 1.0 (RDF) and Atom documents into [`RawEntry`] values.

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::error::{DigestError, Result};
use crate::ingest::types::RawEntry;

// One shape for all three dialects: RSS 2.0 nests items in <channel>,
// RDF puts <item> next to <channel>, Atom uses <entry>.
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

// Element names are matched without their namespace prefix, so `<dc:date>`
// arrives as `date` and `<media:title>` lands next to `<title>`. Every text
// field is a list and the first non-empty value wins.
#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Vec<Text>,
    #[serde(default)]
    link: Vec<Text>,
    #[serde(rename = "pubDate", default)]
    pub_date: Vec<Text>,
    #[serde(default)]
    published: Vec<Text>,
    #[serde(default)]
    updated: Vec<Text>,
    #[serde(default)]
    date: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Vec<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    published: Vec<Text>,
    #[serde(default)]
    updated: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

/// Entries of one parsed document. Consumed once; re-reading needs the body again.
#[derive(Debug)]
pub struct ParsedFeed {
    entries: Vec<RawEntry>,
}

impl ParsedFeed {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ParsedFeed {
    type Item = RawEntry;
    type IntoIter = std::vec::IntoIter<RawEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Parse a feed body. `url` is only used for error context.
pub fn parse_feed(url: &str, body: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(body);
    let doc: Document = from_str(&xml_clean).map_err(|e| DigestError::FeedParse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let rss_items = doc
        .channel
        .map(|c| c.items)
        .unwrap_or_default()
        .into_iter()
        .chain(doc.items);

    let mut out = Vec::new();
    for it in rss_items {
        let published = first_non_empty(&[&it.pub_date, &it.published, &it.updated, &it.date]);
        let link = first_non_empty(&[&it.link]);
        push_entry(&mut out, url, &it.title, link, published);
    }
    for en in doc.entries {
        let published = first_non_empty(&[&en.published, &en.updated]);
        let link = pick_atom_link(&en.links).unwrap_or_default();
        push_entry(&mut out, url, &en.title, link, published);
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_entries_total").increment(out.len() as u64);
    Ok(ParsedFeed { entries: out })
}

fn push_entry(
    out: &mut Vec<RawEntry>,
    url: &str,
    titles: &[Text],
    link: String,
    published: String,
) {
    let title = titles
        .iter()
        .map(|t| clean_title(&t.value))
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    let link = link.trim().to_string();
    if title.is_empty() || link.is_empty() {
        tracing::debug!(url, %title, %link, "skipping entry without title or link");
        return;
    }
    out.push(RawEntry {
        title,
        link,
        published,
    });
}

fn first_non_empty(candidates: &[&Vec<Text>]) -> String {
    candidates
        .iter()
        .flat_map(|c| c.iter())
        .map(|t| t.value.trim())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

// rel="alternate" (or no rel) wins; otherwise the first link with an href.
fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    let href_of = |l: &AtomLink| {
        if l.href.trim().is_empty() {
            l.text.trim().to_string()
        } else {
            l.href.trim().to_string()
        }
    };
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(href_of)
}

/// Decode entities, strip markup and collapse whitespace in a headline.
pub fn clean_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

// Named HTML entities (`&eacute;`, `&nbsp;`, ...) are not valid XML and make
// the whole document fail. Decode them up front; the five XML ones stay.
fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ENTITY.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("entity regex"));
    re.replace_all(s, |caps: &regex::Captures<'_>| {
        let whole = &caps[0];
        if matches!(&caps[1], "amp" | "lt" | "gt" | "quot" | "apos") {
            return whole.to_string();
        }
        let decoded = html_escape::decode_html_entities(whole);
        if decoded == whole {
            // Unknown name: keep it as literal text.
            return format!("&amp;{}", &whole[1..]);
        }
        decoded.replace('&', "&amp;").replace('<', "&lt;")
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Wire</title>
  <link>https://example.test/</link>
  <item>
    <title>Chip exports &amp; tariffs</title>
    <link> https://example.test/a </link>
    <pubDate>Mon, 12 May 2025 18:30:00 GMT</pubDate>
  </item>
  <item>
    <title><![CDATA[<b>Bold</b>   headline]]></title>
    <link>https://example.test/b</link>
    <updated>2025-05-12T01:00:00Z</updated>
  </item>
  <item>
    <title>No date&nbsp;here</title>
    <link>https://example.test/c</link>
  </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom feed</title>
  <link rel="self" href="https://example.test/feed"/>
  <entry>
    <title type="html">Atom one</title>
    <link rel="enclosure" href="https://example.test/img.png"/>
    <id>urn:1</id>
    <link rel="alternate" href="https://example.test/atom/1"/>
    <updated>2025-05-11T23:00:00Z</updated>
    <published>2025-05-11T22:00:00Z</published>
  </entry>
  <entry>
    <title>Atom two</title>
    <link href="https://example.test/atom/2"/>
    <updated>2025-05-11T20:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_with_date_fallbacks() {
        let feed = parse_feed("u", RSS).unwrap();
        let entries: Vec<_> = feed.into_iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Chip exports & tariffs");
        assert_eq!(entries[0].link, "https://example.test/a");
        assert_eq!(entries[0].published, "Mon, 12 May 2025 18:30:00 GMT");
        assert_eq!(entries[1].title, "Bold headline");
        assert_eq!(entries[1].published, "2025-05-12T01:00:00Z");
        assert_eq!(entries[2].title, "No date here");
        assert_eq!(entries[2].published, "");
    }

    #[test]
    fn atom_prefers_published_and_alternate_link() {
        let entries: Vec<_> = parse_feed("u", ATOM).unwrap().into_iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://example.test/atom/1");
        assert_eq!(entries[0].published, "2025-05-11T22:00:00Z");
        assert_eq!(entries[1].published, "2025-05-11T20:00:00Z");
    }

    #[test]
    fn rdf_items_sit_beside_channel() {
        let rdf = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel><title>RDF</title></channel>
  <item><title>Rdf item</title><link>https://example.test/r</link><dc:date>2025-05-12T03:00:00+09:00</dc:date></item>
</rdf:RDF>"#;
        let entries: Vec<_> = parse_feed("u", rdf).unwrap().into_iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].published, "2025-05-12T03:00:00+09:00");
    }

    #[test]
    fn namespaced_siblings_do_not_collide() {
        let xml = include_str!("../../tests/fixtures/rss_namespaced.xml");
        let entries: Vec<_> = parse_feed("u", xml).unwrap().into_iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Plain title wins");
        assert_eq!(entries[0].link, "https://wire.test/ns/1");
        assert_eq!(entries[1].title, "Dublin Core item");
        assert_eq!(entries[1].link, "https://wire.test/ns/2");
        assert_eq!(entries[1].published, "2025-05-12T03:00:00Z");
        // Only a media title: still better than dropping the entry.
        assert_eq!(entries[2].title, "Media only title");
    }

    #[test]
    fn html_entities_do_not_sink_the_feed() {
        let xml = r#"<rss><channel>
  <item><title>Caf&eacute; chain &pound;1bn deal&hellip;</title><link>https://x.test/1</link></item>
  <item><title>R&amp;D &bogus; spend</title><link>https://x.test/2</link></item>
  <item><title>Clean one</title><link>https://x.test/3</link></item>
</channel></rss>"#;
        let entries: Vec<_> = parse_feed("u", xml).unwrap().into_iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Café chain £1bn deal…");
        assert_eq!(entries[1].title, "R&D &bogus; spend");
        assert_eq!(entries[2].title, "Clean one");
    }

    #[test]
    fn scrub_keeps_xml_entities_and_escapes_decoded_markup() {
        assert_eq!(scrub_html_entities_for_xml("a &amp; b &lt;c&gt;"), "a &amp; b &lt;c&gt;");
        assert_eq!(scrub_html_entities_for_xml("x&nbsp;y"), "x\u{a0}y");
    }

    #[test]
    fn entries_without_link_are_skipped() {
        let xml = r#"<rss><channel><item><title>orphan</title></item></channel></rss>"#;
        assert!(parse_feed("u", xml).unwrap().is_empty());
    }

    #[test]
    fn not_xml_is_a_parse_error() {
        let err = parse_feed(
            "https://x.test/feed",
            "<rss><channel><item><title>x</title></channel></rss>",
        ).unwrap_err();
        assert!(matches!(err, DigestError::FeedParse { .. }));
    }
}
