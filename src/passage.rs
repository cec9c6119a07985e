use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::fetch::FetchError;

pub const ELEMENTS_NOT_FOUND: &str = "Elements not found on the page.";

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.title").expect("valid title selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.lessme").expect("valid body selector"));

/// Text handed to the model, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passage {
    Text(String),
    ElementsNotFound,
    FetchFailed(FetchError),
}

impl Passage {
    pub fn from_document(document: &Html) -> Self {
        let title = document.select(&TITLE).next();
        let body = document.select(&BODY).next();
        match (title, body) {
            (Some(title), Some(body)) => Self::Text(format!(
                "{}. {}",
                element_text(title).trim(),
                element_text(body).trim()
            )),
            _ => Self::ElementsNotFound,
        }
    }

    pub fn from_markup(markup: &str) -> Self {
        Self::from_document(&Html::parse_document(markup))
    }

    /// Only a missing title/body skips the model; fetch failures are still analyzed.
    pub fn skips_analysis(&self) -> bool {
        matches!(self, Self::ElementsNotFound)
    }
}

impl fmt::Display for Passage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::ElementsNotFound => f.write_str(ELEMENTS_NOT_FOUND),
            Self::FetchFailed(err) => write!(f, "{err}"),
        }
    }
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}
