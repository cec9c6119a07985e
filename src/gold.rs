use std::sync::LazyLock;

use anyhow::Context as _;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::passage::element_text;

pub const NOT_AVAILABLE: &str = "Not Available";

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid selector {css:?}: {err}"))
}

static LISTENER: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[property="http://www.w3.org/2000/01/rdf-schema#label"]"#));
static SETLIST: LazyLock<Selector> = LazyLock::new(|| selector("table.setlist"));
static PERFORMER: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[property="http://purl.org/ontology/mo/performer"]"#));
static TIME: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[property="http://purl.org/NET/c4dm/event.owl#time"]"#));
static MEDIUM: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[property="http://led.kmi.open.ac.uk/term/has_medium"]"#));
static ENVIRONMENT: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[property="http://led.kmi.open.ac.uk/term/has_environment"]"#));
static LOCATION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[style="font-size:1.2em"]"#));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));

/// Reference answer scraped from the page's RDFa markup.
///
/// Field order is the column order of the serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldStandardRecord {
    #[serde(rename = "Listener")]
    pub listener: String,
    #[serde(rename = "Listening to")]
    pub listening_to: String,
    #[serde(rename = "Performed by")]
    pub performed_by: String,
    #[serde(rename = "Date/Time")]
    pub date_time: String,
    #[serde(rename = "Medium")]
    pub medium: String,
    #[serde(rename = "Listening Environment")]
    pub listening_environment: String,
    #[serde(rename = "Location")]
    pub location: String,
}

impl GoldStandardRecord {
    pub fn from_document(document: &Html) -> Self {
        let listening_to = first(document, &SETLIST)
            .and_then(|table| table.select(&CELL).next())
            .and_then(|cell| cell.select(&LINK).next());
        let date_time = first(document, &TIME).and_then(|time| time.select(&SPAN).next());
        let location = first(document, &LOCATION).and_then(|span| span.select(&LINK).next());

        Self {
            listener: text_or_default(first(document, &LISTENER)),
            listening_to: text_or_default(listening_to),
            performed_by: joined_or_default(document.select(&PERFORMER)),
            date_time: text_or_default(date_time),
            medium: text_or_default(first(document, &MEDIUM)),
            listening_environment: joined_or_default(document.select(&ENVIRONMENT)),
            location: text_or_default(location),
        }
    }

    pub fn from_markup(markup: &str) -> Self {
        Self::from_document(&Html::parse_document(markup))
    }

    pub fn values(&self) -> [&str; 7] {
        [
            self.listener.as_str(),
            self.listening_to.as_str(),
            self.performed_by.as_str(),
            self.date_time.as_str(),
            self.medium.as_str(),
            self.listening_environment.as_str(),
            self.location.as_str(),
        ]
    }
}

fn first<'a>(document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    document.select(selector).next()
}

fn text_or_default(element: Option<ElementRef<'_>>) -> String {
    element.map_or_else(|| NOT_AVAILABLE.to_owned(), element_text)
}

fn joined_or_default<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    let texts = elements.map(element_text).collect::<Vec<_>>();
    if texts.is_empty() {
        NOT_AVAILABLE.to_owned()
    } else {
        texts.join(", ")
    }
}

/// Pretty JSON with 4-space indentation. A page that could not be fetched has no
/// record and renders as `{}`.
pub fn to_pretty_json(record: Option<&GoldStandardRecord>) -> anyhow::Result<String> {
    let Some(record) = record else {
        return Ok("{}".to_owned());
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record
        .serialize(&mut serializer)
        .context("serialize gold standard record")?;
    String::from_utf8(buf).context("gold standard json is not valid UTF-8")
}
