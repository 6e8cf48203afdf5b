use scraper::{Html, Selector};
use serde_json::Value;

/// Every JSON-LD object in the document, with `@graph` members flattened.
fn objects(document: &Html) -> Vec<Value> {
    let mut objects = Vec::new();

    if let Ok(script_selector) = Selector::parse("script[type='application/ld+json']") {
        for script in document.select(&script_selector) {
            if let Ok(json) = serde_json::from_str::<Value>(script.text().collect::<String>().trim()) {
                match json {
                    Value::Array(arr) => objects.extend(arr),
                    Value::Object(ref obj) if obj.contains_key("@graph") => {
                        if let Some(Value::Array(graph)) = obj.get("@graph") {
                            objects.extend(graph.iter().cloned());
                        }
                    }
                    other => objects.push(other),
                }
            }
        }
    }

    objects
}

/// Extracts authors from JSON-LD metadata in the HTML document.
/// Returns a vector of author names.
pub fn extract_authors(document: &Html) -> Vec<String> {
    let mut authors = Vec::new();

    for json in objects(document) {
        // Try to get author from the JSON-LD data
        if let Some(author) = json.get("author") {
            match author {
                Value::Array(arr) => {
                    for author_obj in arr {
                        if let Some(name) = author_obj.get("name").and_then(|n| n.as_str()) {
                            authors.push(name.trim().to_string());
                        }
                    }
                }
                Value::Object(obj) => {
                    if let Some(name) = obj.get("name").and_then(|n| n.as_str()) {
                        authors.push(name.trim().to_string());
                    }
                }
                Value::String(s) => {
                    authors.push(s.trim().to_string());
                }
                _ => {}
            }
        }
    }

    authors.retain(|a| !a.is_empty());
    authors.dedup();
    authors
}

/// `datePublished` of the first JSON-LD object carrying one.
pub fn extract_date_published(document: &Html) -> Option<String> {
    objects(document)
        .iter()
        .find_map(|json| json.get("datePublished").and_then(|d| d.as_str()).map(str::to_string))
}
