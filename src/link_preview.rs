use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use crate::errors::AppError;

/// Only the head of large pages is inspected.
const MAX_HTML_BYTES: usize = 512 * 1024;

/// Metadata shown when a project links to an external resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub description: Option<String>,
    pub media_type: String,
    pub content_type: Option<String>,
    pub images: Vec<String>,
}

/// Fetches pages and extracts OpenGraph and HTML metadata.
#[derive(Clone)]
pub struct LinkPreviewer {
    client: reqwest::Client,
    max_html_bytes: usize,
}

impl LinkPreviewer {
    pub fn new() -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("feedforward-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_html_bytes: MAX_HTML_BYTES,
        })
    }

    /// Caps how much of an HTML page is downloaded.
    pub fn with_max_html_bytes(mut self, limit: usize) -> Self {
        self.max_html_bytes = limit;
        self
    }

    pub async fn preview(&self, raw_url: &str) -> Result<LinkPreview, AppError> {
        let url = parse_target(raw_url)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("Link preview fetch failed for {}: {}", url, e);
                AppError::Upstream("Failed to fetch link preview".to_string())
            })?;

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_html = content_type
            .as_deref()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(true);
        if !is_html {
            return Ok(LinkPreview {
                url: final_url.to_string(),
                media_type: media_type_for(content_type.as_deref()),
                content_type,
                ..LinkPreview::default()
            });
        }

        let body = read_capped(response, self.max_html_bytes)
            .await
            .map_err(|e| {
                tracing::warn!("Link preview body read failed for {}: {}", url, e);
                AppError::Upstream("Failed to fetch link preview".to_string())
            })?;
        let html = String::from_utf8_lossy(&body);

        let mut preview = parse_html(&final_url, &html);
        preview.content_type = content_type;
        Ok(preview)
    }
}

/// Streams the body and stops once `limit` bytes are buffered.
async fn read_capped(mut response: reqwest::Response, limit: usize) -> reqwest::Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn parse_target(raw_url: &str) -> Result<Url, AppError> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return Err(AppError::Validation("URL parameter is required".to_string()));
    }
    let url = Url::parse(raw_url)
        .map_err(|_| AppError::Validation(format!("Invalid URL: {}", raw_url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "Only http and https URLs can be previewed".to_string(),
        ));
    }
    Ok(url)
}

fn media_type_for(content_type: Option<&str>) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .unwrap_or_default()
        .trim();
    match essence.split_once('/') {
        Some(("image", _)) => "image",
        Some(("video", _)) => "video",
        Some(("audio", _)) => "audio",
        Some(("application", _)) => "application",
        _ => "website",
    }
    .to_string()
}

fn meta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta pattern"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr pattern")
    })
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"))
}

/// Extracts preview fields from an HTML document served at `page_url`.
pub fn parse_html(page_url: &Url, html: &str) -> LinkPreview {
    // First occurrence of each property or name wins
    let mut meta: HashMap<String, String> = HashMap::new();
    for tag in meta_regex().find_iter(html) {
        let mut key = None;
        let mut content = None;
        for cap in attr_regex().captures_iter(tag.as_str()) {
            let value = cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str());
            match cap[1].to_ascii_lowercase().as_str() {
                "property" | "name" if key.is_none() => {
                    key = value.map(|v| v.trim().to_ascii_lowercase())
                }
                "content" => content = value,
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            meta.entry(key).or_insert_with(|| decode_entities(content.trim()));
        }
    }

    let non_empty = |key: &str| meta.get(key).filter(|v| !v.is_empty()).cloned();

    let title = non_empty("og:title").or_else(|| {
        title_regex()
            .captures(html)
            .map(|c| decode_entities(c[1].trim()))
            .filter(|t| !t.is_empty())
    });

    let images = ["og:image", "og:image:url", "twitter:image"]
        .iter()
        .filter_map(|key| non_empty(*key))
        .filter_map(|src| page_url.join(&src).ok())
        .map(String::from)
        .take(1)
        .collect();

    LinkPreview {
        url: page_url.to_string(),
        title,
        site_name: non_empty("og:site_name"),
        description: non_empty("og:description").or_else(|| non_empty("description")),
        media_type: non_empty("og:type").unwrap_or_else(|| "website".to_string()),
        content_type: None,
        images,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
