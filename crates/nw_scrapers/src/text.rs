//! Text and URL normalization shared by every site.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use nw_core::{ArticleStub, Error, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
}

/// Resolve `href` against `base`; only http(s) results are accepted.
/// Absolute http(s) hrefs are returned as written, since the stored URL is
/// the article's identity.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if is_absolute_http(href) {
        return Some(href.to_string());
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

pub fn is_absolute_http(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed text, or `None` when nothing is left.
pub fn non_empty(text: impl AsRef<str>) -> Option<String> {
    let text = collapse_whitespace(text.as_ref());
    (!text.is_empty()).then_some(text)
}

/// Plain text of an HTML fragment with entities decoded.
pub fn strip_markup(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    collapse_whitespace(&fragment.root_element().text().collect::<String>())
}

/// Compile a selector written in source.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

/// Collapsed text of the first match, if non-empty.
pub fn select_text(root: ElementRef<'_>, css: &str) -> Option<String> {
    root.select(&selector(css)).map(element_text).find(|t| !t.is_empty())
}

pub fn select_attr(root: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    root.select(&selector(css))
        .find_map(|el| el.value().attr(attr))
        .and_then(non_empty)
}

pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn join_paragraphs<I, S>(paragraphs: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paragraphs
        .into_iter()
        .map(|p| collapse_whitespace(p.as_ref()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Body text of an HTML fragment: the text of every `<p>` outside the
/// elements matched by `remove`, joined by blank lines. Fragments without
/// paragraphs fall back to [`blocks_to_paragraphs`].
pub fn html_to_paragraphs(html: &str, remove: &[&str]) -> String {
    let fragment = Html::parse_fragment(html);
    let excluded: HashSet<_> = remove
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .flat_map(|selector| fragment.select(&selector).map(|el| el.id()).collect::<Vec<_>>())
        .collect();

    let paragraph = selector("p");
    let paragraphs: Vec<String> = fragment
        .select(&paragraph)
        .filter(|p| !excluded.contains(&p.id()) && !p.ancestors().any(|a| excluded.contains(&a.id())))
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        blocks_to_paragraphs(html)
    } else {
        paragraphs.join("\n\n")
    }
}

/// Body text of markup that separates paragraphs with `<div>` or `<br>`.
pub fn blocks_to_paragraphs(html: &str) -> String {
    let mut marked = html.to_string();
    for boundary in ["<br>", "<br/>", "<br />", "</div>", "</p>", "<BR>", "<BR/>", "<BR />"] {
        marked = marked.replace(boundary, "\n");
    }
    let fragment = Html::parse_fragment(&marked);
    let text = fragment.root_element().text().collect::<String>();
    join_paragraphs(text.lines())
}

/// Parse the date formats seen across backends. Anything else is `None`,
/// never "now".
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(raw) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(d.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Normalize a listing stub: absolute URLs, markup-free title and
/// description, trimmed tags. Returns `None` when the stub has no usable URL
/// or title.
pub fn normalize_stub(base: &Url, mut stub: ArticleStub) -> Option<ArticleStub> {
    stub.url = resolve_url(base, &stub.url)?;
    stub.title = strip_markup(&stub.title);
    if stub.title.is_empty() {
        return None;
    }
    stub.description = stub.description.as_deref().map(strip_markup).and_then(non_empty);
    stub.author = stub.author.and_then(non_empty);
    stub.section = stub.section.and_then(non_empty);
    stub.tags = stub.tags.iter().filter_map(non_empty).collect();
    stub.image_url = stub.image_url.as_deref().and_then(|src| resolve_url(base, src));
    stub.content = stub.content.map(|c| c.trim().to_string());
    Some(stub)
}

/// Drop later occurrences of a URL, keeping listing order.
pub fn dedup_by_url(stubs: Vec<ArticleStub>) -> Vec<ArticleStub> {
    let mut seen = HashSet::new();
    stubs.into_iter().filter(|s| seen.insert(s.url.clone())).collect()
}
