//! Cafeteria menu scraper.
//!
//! Fetches one menu page and pulls the day headings and dishes out of the
//! markup. Layout changes on the page make fragments disappear; they are not
//! reported as errors.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

pub const DEFAULT_URL: &str =
    "https://www.studentenwerk-muenchen.de/mensa/speiseplan/speiseplan_{id}_-de.html";

/// Default location (Arcisstraße).
pub const DEFAULT_MENSA_ID: u32 = 421;

/// Known locations and their ids.
pub const KNOWN_MENSAS: [(&str, u32); 3] = [
    ("arcisstrasse", 421),
    ("garching", 422),
    ("leopoldstrasse", 411),
];

const DAY_MARKER: &str = "c-schedule__item";

static DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<strong>(.*?)</strong>").expect("valid regex"));

static TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"stwm-artname[^>]*>([^<]*)").expect("valid regex"));

static DISH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"js-schedule-dish-description[^>]*>([^<]*)").expect("valid regex"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Unknown mensa '{0}' (expected arcisstrasse, garching, leopoldstrasse or a numeric id)")]
    UnknownMensa(String),
    #[error("Failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One dish on the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dish {
    /// Dish type, e.g. "Tagesgericht 1"
    pub kind: String,
    pub name: String,
}

/// All dishes served on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayMenu {
    pub day: String,
    pub dishes: Vec<Dish>,
}

/// Resolve a location name or numeric id.
pub fn resolve_mensa_id(mensa: &str) -> Result<u32, MenuError> {
    let key = mensa.trim().to_lowercase();
    if let Some((_, id)) = KNOWN_MENSAS.iter().find(|(name, _)| *name == key) {
        return Ok(*id);
    }
    key.parse::<u32>()
        .map_err(|_| MenuError::UnknownMensa(mensa.to_string()))
}

/// Fill the `{id}` placeholder of a URL template.
pub fn menu_url(template: &str, id: u32) -> String {
    template.replace("{id}", &id.to_string())
}

/// GET the menu page; HTTP error statuses are errors.
pub async fn fetch_page(url: &str) -> Result<String, MenuError> {
    let http_err = |source| MenuError::Http {
        url: url.to_string(),
        source,
    };

    tracing::debug!("fetching {}", url);
    reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_err)?
        .text()
        .await
        .map_err(http_err)
}

/// Decode the HTML entities that show up in menu text.
pub fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "auml" => Some('ä'),
                "ouml" => Some('ö'),
                "uuml" => Some('ü'),
                "Auml" => Some('Ä'),
                "Ouml" => Some('Ö'),
                "Uuml" => Some('Ü'),
                "szlig" => Some('ß'),
                "eacute" => Some('é'),
                "egrave" => Some('è'),
                _ => numeric_entity(entity),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

/// Strip tags, decode entities and collapse whitespace.
pub fn clean_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_day(block: &str) -> DayMenu {
    let day = DAY_RE
        .captures(block)
        .map(|caps| clean_text(&caps[1]))
        .unwrap_or_default();

    let kinds = TYPE_RE.captures_iter(block).map(|caps| clean_text(&caps[1]));
    let names = DISH_RE.captures_iter(block).map(|caps| clean_text(&caps[1]));
    let dishes = kinds
        .zip(names)
        .map(|(kind, name)| Dish { kind, name })
        .collect();

    DayMenu { day, dishes }
}

/// Extract the day menus from a page, in page order.
pub fn parse_menu(html: &str) -> Vec<DayMenu> {
    html.split(DAY_MARKER).skip(1).map(parse_day).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<ul class="c-schedule">
<li class="c-schedule__item">
  <p><strong>Montag,
     13.10.2026</strong></p>
  <ul>
    <li class="c-schedule__list-item">
      <span class="stwm-artname">Tagesgericht 1</span>
      <p class="js-schedule-dish-description">Spaghetti Bolognese&nbsp;mit Parmesan<sup>1,2</sup></p>
    </li>
    <li class="c-schedule__list-item">
      <span class="stwm-artname">Aktionsessen&#32;3</span>
      <p class="js-schedule-dish-description">K&auml;sesp&auml;tzle &amp; Salat</p>
    </li>
  </ul>
</li>
<li class="c-schedule__item">
  <p><strong>Dienstag, 14.10.2026</strong></p>
  <ul>
    <li><span class="stwm-artname">Tagesgericht 2</span>
    <p class="js-schedule-dish-description">Gem&uuml;securry</p></li>
  </ul>
</li>
</ul>
</body></html>
"#;

    #[test]
    fn test_parse_menu() {
        let days = parse_menu(PAGE);
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].day, "Montag, 13.10.2026");
        assert_eq!(
            days[0].dishes,
            vec![
                Dish {
                    kind: "Tagesgericht 1".to_string(),
                    name: "Spaghetti Bolognese mit Parmesan".to_string(),
                },
                Dish {
                    kind: "Aktionsessen 3".to_string(),
                    name: "Käsespätzle & Salat".to_string(),
                },
            ]
        );

        assert_eq!(days[1].day, "Dienstag, 14.10.2026");
        assert_eq!(days[1].dishes[0].name, "Gemüsecurry");
    }

    #[test]
    fn test_missing_fragments_are_empty() {
        assert!(parse_menu("<html>closed</html>").is_empty());

        let days = parse_menu("<li class=\"c-schedule__item\"><p>nothing</p></li>");
        assert_eq!(days.len(), 1);
        assert_eq!(days[0], DayMenu::default());
    }

    #[test]
    fn test_resolve_mensa_id() {
        assert_eq!(resolve_mensa_id("garching").unwrap(), 422);
        assert_eq!(resolve_mensa_id("Leopoldstrasse").unwrap(), 411);
        assert_eq!(resolve_mensa_id("412").unwrap(), 412);
        assert!(matches!(
            resolve_mensa_id("olympiapark"),
            Err(MenuError::UnknownMensa(_))
        ));
    }

    #[test]
    fn test_menu_url() {
        assert_eq!(
            menu_url(DEFAULT_URL, 421),
            "https://www.studentenwerk-muenchen.de/mensa/speiseplan/speiseplan_421_-de.html"
        );
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#228; &#xFC; &bogus;"), "a & b ä ü &bogus;");
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let result = fetch_page("http://127.0.0.1:9/menu.html").await;
        assert!(matches!(result, Err(MenuError::Http { .. })));
    }
}
