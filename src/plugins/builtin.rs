//! Built-in plugins
//!
//! Both operate on HTML responses only and emit nothing for other content
//! types rather than failing.

use super::{PluginError, PluginFacts};
use crate::checker::ResponseMeta;
use crate::model::PageRecord;
use scraper::{Html, Selector};

/// Emits the document title as the `title` value.
pub fn get_title(
    _page: &PageRecord,
    meta: &ResponseMeta,
    body: &str,
) -> Result<PluginFacts, PluginError> {
    let mut facts = PluginFacts::new();
    if !meta.is_html() {
        return Ok(facts);
    }

    let document = Html::parse_document(body);
    let selector =
        Selector::parse("title").map_err(|e| PluginError(format!("bad selector: {}", e)))?;
    if let Some(element) = document.select(&selector).next() {
        let title = element.text().collect::<String>().trim().to_string();
        if !title.is_empty() {
            facts.insert("title".to_string(), title);
        }
    }
    Ok(facts)
}

/// Emits the content of a `<meta name="version">` tag as the `version`
/// value, for sites that publish their release there.
pub fn get_version(
    _page: &PageRecord,
    meta: &ResponseMeta,
    body: &str,
) -> Result<PluginFacts, PluginError> {
    let mut facts = PluginFacts::new();
    if !meta.is_html() {
        return Ok(facts);
    }

    let document = Html::parse_document(body);
    let selector = Selector::parse(r#"meta[name="version"]"#)
        .map_err(|e| PluginError(format!("bad selector: {}", e)))?;
    if let Some(element) = document.select(&selector).next() {
        if let Some(version) = element.value().attr("content") {
            let version = version.trim();
            if !version.is_empty() {
                facts.insert("version".to_string(), version.to_string());
            }
        }
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STATUS_UNREACHABLE;
    use chrono::Utc;

    fn test_page() -> PageRecord {
        PageRecord {
            id: 1,
            site_id: 1,
            subpath: "/".to_string(),
            params: String::new(),
            is_checked: false,
            checked_at: None,
            check_time: 0.0,
            status: STATUS_UNREACHABLE,
            content_type: String::new(),
            size_bytes: 0,
            error_message: String::new(),
            is_linkable: true,
            created_at: Utc::now(),
        }
    }

    fn meta(content_type: &str) -> ResponseMeta {
        ResponseMeta {
            status: 200,
            content_type: content_type.to_string(),
            content_length: 0,
            final_url: "https://example.com/".to_string(),
        }
    }

    #[test]
    fn test_get_title() {
        let body = "<html><head><title>  Welcome  </title></head><body></body></html>";
        let facts = get_title(&test_page(), &meta("text/html"), body).unwrap();
        assert_eq!(facts.get("title").map(String::as_str), Some("Welcome"));
    }

    #[test]
    fn test_get_title_absent() {
        let body = "<html><body>no title here</body></html>";
        let facts = get_title(&test_page(), &meta("text/html"), body).unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_get_title_skips_non_html() {
        let facts = get_title(&test_page(), &meta("application/json"), "{}").unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_get_version() {
        let body = r#"<html><head><meta name="version" content="2.4.1"></head></html>"#;
        let facts = get_version(&test_page(), &meta("text/html"), body).unwrap();
        assert_eq!(facts.get("version").map(String::as_str), Some("2.4.1"));
    }

    #[test]
    fn test_get_version_absent() {
        let body = r#"<html><head><meta name="author" content="x"></head></html>"#;
        let facts = get_version(&test_page(), &meta("text/html"), body).unwrap();
        assert!(facts.is_empty());
    }
}
