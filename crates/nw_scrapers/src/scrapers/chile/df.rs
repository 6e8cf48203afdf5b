use chrono::{DateTime, NaiveDate, Utc};
use nw_core::{ArticleStub, DelayPolicy, Error, Fetcher, Result};
use scraper::{ElementRef, Html};
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::html::{HtmlAdapter, HtmlSite};
use crate::scrapers::{Adapter, DetailPage};
use crate::text;

pub const CLI_NAME: &str = "df";
pub const DEFAULTS: SourceSettings = SourceSettings::new(30, 1, DelayPolicy::Fixed(Duration::from_millis(300)));

const BASE_URL: &str = "https://www.df.cl";
const LATEST_PATH: &str = "/ultimasnoticias";

pub fn adapter(fetcher: Arc<dyn Fetcher>, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("Diario Financiero", "💼", 3, CLI_NAME);
    Ok(HtmlAdapter::new(meta, settings, fetcher, DiarioFinanciero)?.into())
}

/// Card dates are either ISO or day-first.
fn parse_card_date(raw: &str) -> Option<DateTime<Utc>> {
    text::parse_datetime(raw).or_else(|| {
        ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    })
}

/// Site-relative hrefs get the site prefix, anything else is kept as is.
fn absolute(href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        format!("{}{}", BASE_URL, href)
    } else {
        href.to_string()
    }
}

/// A card links its story, its tag page and sometimes a short alias; the
/// longest non-tag link is the story.
fn story_href(card: ElementRef<'_>) -> Option<String> {
    card.select(&text::selector("a[href^='/']"))
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.contains("/tax/"))
        .fold(None, |longest: Option<&str>, href| match longest {
            Some(current) if current.len() >= href.len() => Some(current),
            _ => Some(href),
        })
        .map(absolute)
}

/// Diario Financiero's "últimas noticias" page. Only the first page is
/// public, so the listing is not paginated.
pub struct DiarioFinanciero;

impl HtmlSite for DiarioFinanciero {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> Option<String> {
        (page == 1).then(|| format!("{}{}", BASE_URL, LATEST_PATH))
    }

    fn parse_listing(&self, html: &str) -> Vec<ArticleStub> {
        let document = Html::parse_document(html);
        let cards = text::selector("article.card.card__horizontal");

        document
            .select(&cards)
            .filter_map(|card| {
                let url = story_href(card)?;
                let title = text::select_text(card, "h3.card__title")?;

                let mut stub = ArticleStub::new(url, title);
                if let Some(tag) = text::select_text(card, "a.card__tag") {
                    let mut parts = tag.split('|').map(str::trim);
                    stub.section = parts.next().and_then(text::non_empty);
                    stub.published_at = parts.next().and_then(parse_card_date);
                }
                stub.image_url = text::select_attr(card, "img", "src").map(|src| absolute(&src));
                Some(stub)
            })
            .collect()
    }
}

impl DetailPage for DiarioFinanciero {
    fn parse_detail(&self, html: &str, mut stub: ArticleStub) -> Result<ArticleStub> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let body = text::selector("#articleLock p, #articleLock div.art-box");
        let content = text::join_paragraphs(root.select(&body).map(text::element_text));
        if content.is_empty() {
            return Err(Error::Extraction("no article body".to_string()));
        }
        stub.content = Some(content);

        let lead: Vec<String> = root
            .select(&text::selector(".enc-main__description"))
            .map(text::element_text)
            .filter(|t| !t.is_empty())
            .collect();
        if !lead.is_empty() {
            stub.description = Some(lead.join(" "));
        }

        stub.author = text::select_text(root, ".author__name, .bold")
            .map(|a| a.replace("Por: ", ""))
            .and_then(text::non_empty);
        Ok(stub)
    }
}
