use nw_core::{ArticleStub, Cursor, DelayPolicy, Error, Fetcher, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::json::{items, JsonAdapter, JsonSite};
use crate::scrapers::Adapter;
use crate::text;

pub const CLI_NAME: &str = "emol";
pub const DEFAULTS: SourceSettings = SourceSettings::new(15, 5, DelayPolicy::Fixed(Duration::from_millis(500)));

const BASE_URL: &str = "https://www.emol.com";
const API_URL: &str = "https://newsapi.ecn.cl/NewsApi/emol/ultimoMinuto/*/not:109";
/// `IdTipoMedio` of still images.
const IMAGE_MEDIA_TYPE: i64 = 1;

pub fn adapter(fetcher: Arc<dyn Fetcher>, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("Emol", "🗞️", 2, CLI_NAME);
    Ok(JsonAdapter::new(meta, settings, fetcher, Emol)?.into())
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Story,
}

#[derive(Debug, Deserialize)]
struct Story {
    titulo: String,
    permalink: String,
    bajada: Option<Vec<Bajada>>,
    autor: Option<String>,
    seccion: Option<String>,
    temas: Option<Vec<Tema>>,
    texto: Option<String>,
    tablas: Option<Tablas>,
    #[serde(rename = "fechaModificacion")]
    fecha_modificacion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Bajada {
    texto: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tema {
    nombre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tablas {
    #[serde(rename = "tablaMedios")]
    tabla_medios: Option<Vec<Medio>>,
}

#[derive(Debug, Deserialize)]
struct Medio {
    #[serde(rename = "IdTipoMedio")]
    id_tipo_medio: Option<i64>,
    #[serde(rename = "Url")]
    url: Option<String>,
}

/// The CDN serves resized copies from a different host and suffix.
fn image_url(raw: &str) -> String {
    let url = raw
        .replacen("staticemol.gen.emol.cl", "static.emol.cl/emol50", 1)
        .replacen(".jpg", "_0lx0.jpg", 1);
    match url.strip_prefix("http:") {
        Some(rest) => format!("https:{}", rest),
        None => url,
    }
}

impl Story {
    fn into_stub(self) -> ArticleStub {
        let image_url = self
            .tablas
            .and_then(|t| t.tabla_medios)
            .unwrap_or_default()
            .into_iter()
            .find(|m| m.id_tipo_medio == Some(IMAGE_MEDIA_TYPE))
            .and_then(|m| m.url)
            .map(|url| image_url(&url));

        ArticleStub {
            url: self.permalink,
            title: self.titulo,
            description: self.bajada.and_then(|b| b.into_iter().next()).and_then(|b| b.texto),
            author: self.autor,
            section: self.seccion,
            tags: self
                .temas
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.nombre)
                .collect(),
            content: self.texto.map(|html| text::blocks_to_paragraphs(&html)),
            image_url,
            published_at: self.fecha_modificacion.as_deref().and_then(text::parse_datetime),
        }
    }
}

/// Emol's "último minuto" search API; stories carry their full text.
pub struct Emol;

impl JsonSite for Emol {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String> {
        match cursor {
            Cursor::Offset(from) => Some(format!("{}?size={}&from={}", API_URL, page_size, from)),
            _ => None,
        }
    }

    fn parse_listing(&self, mut payload: Value) -> Result<Vec<ArticleStub>> {
        let hits = match payload.pointer_mut("/hits/hits").map(Value::take) {
            Some(Value::Array(hits)) => hits,
            _ => return Err(Error::Extraction("missing hits.hits".to_string())),
        };
        Ok(items::<Hit>(hits).into_iter().map(|hit| hit.source.into_stub()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{unpaced, MockFetcher};
    use nw_core::SourceAdapter;

    const PAGE: &str = r#"{
        "hits": {
            "total": 2,
            "hits": [
                {"_source": {
                    "titulo": "Banco Central mantiene la tasa",
                    "permalink": "https://www.emol.com/noticias/Economia/2025/06/01/1/tasa.html",
                    "bajada": [{"texto": "El consejo votó por unanimidad."}],
                    "autor": "Emol",
                    "seccion": "Economía",
                    "temas": [{"nombre": "Banco Central"}, {"nombre": "Tasas"}],
                    "texto": "<div>Primer p&aacute;rrafo.</div><div>Segundo<br/>Tercero</div>",
                    "tablas": {"tablaMedios": [
                        {"IdTipoMedio": 3, "Url": "http://staticemol.gen.emol.cl/video.mp4"},
                        {"IdTipoMedio": 1, "Url": "http://staticemol.gen.emol.cl/2025/06/01/foto.jpg"}
                    ]},
                    "fechaModificacion": "2025-06-01T18:20:00"
                }},
                {"_source": {
                    "titulo": "Sin cuerpo",
                    "permalink": "https://www.emol.com/noticias/Nacional/2025/06/01/2/x.html"
                }}
            ]
        }
    }"#;

    #[test]
    fn test_image_url_rewrite() {
        assert_eq!(
            image_url("http://staticemol.gen.emol.cl/2025/06/01/foto.jpg"),
            "https://static.emol.cl/emol50/2025/06/01/foto_0lx0.jpg"
        );
        assert_eq!(image_url("https://otro.cl/a.png"), "https://otro.cl/a.png");
    }

    #[tokio::test]
    async fn test_list_page_and_inline_detail() {
        let url = Emol.listing_url(&Cursor::Offset(0), 2).unwrap();
        assert_eq!(
            url,
            "https://newsapi.ecn.cl/NewsApi/emol/ultimoMinuto/*/not:109?size=2&from=0"
        );
        let fetcher = Arc::new(MockFetcher::new().with(url, PAGE));
        let adapter = adapter(fetcher, unpaced(2, 5)).unwrap();

        let page = adapter.list_page(&adapter.initial_cursor()).await.unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Cursor::Offset(2));
        assert_eq!(page.stubs.len(), 2);

        let first = &page.stubs[0];
        assert_eq!(first.description.as_deref(), Some("El consejo votó por unanimidad."));
        assert_eq!(first.tags, vec!["Banco Central", "Tasas"]);
        assert_eq!(first.content.as_deref(), Some("Primer párrafo.\n\nSegundo\n\nTercero"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://static.emol.cl/emol50/2025/06/01/foto_0lx0.jpg")
        );
        assert!(first.published_at.is_some());

        let ok = adapter.fetch_detail(page.stubs[0].clone()).await;
        assert_eq!(ok.source_id.0, 2);
        assert!(!ok.is_extraction_failure());

        let missing = adapter.fetch_detail(page.stubs[1].clone()).await;
        assert!(missing.is_extraction_failure());
    }

    #[tokio::test]
    async fn test_missing_hits_ends_paging() {
        let url = Emol.listing_url(&Cursor::Offset(0), 15).unwrap();
        let fetcher = Arc::new(MockFetcher::new().with(url, r#"{"took": 3}"#));
        let adapter = adapter(fetcher, unpaced(15, 5)).unwrap();

        let page = adapter.list_page(&Cursor::Offset(0)).await.unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_more);
    }
}
