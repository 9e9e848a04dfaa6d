//! Minimal tag scanner used by [`crate::ScanningDomBuilder`].
//!
//! This is not an HTML5 tokenizer: it recognizes start tags and their
//! attributes well enough to discover subresource references, and ignores
//! everything else (comments, malformed markup, character references).
//! Real tokenization/tree construction is out of scope (see crate docs).

use crate::{DiscoveryHint, ResourceKind};
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub closing: bool,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// Scan `text` for tags, in document order.
pub(crate) fn scan_tags(text: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let bytes = text.as_bytes();
    let mut cursor = 0usize;
    while let Some(open) = find_byte(bytes, cursor, b'<') {
        let Some(close) = find_byte(bytes, open + 1, b'>') else {
            break;
        };
        let Some(inner) = text.get(open + 1..close) else {
            break;
        };
        cursor = close + 1;
        if inner.starts_with('!') || inner.starts_with('?') {
            continue;
        }
        let closing = inner.starts_with('/');
        let inner = inner.strip_prefix('/').unwrap_or(inner);
        let inner = inner.strip_suffix('/').unwrap_or(inner);
        let mut parts = inner.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let mut attrs = Vec::new();
        let rest = inner[name.len()..].trim_start();
        parse_attrs(rest, &mut attrs);
        tags.push(Tag {
            name: name.to_ascii_lowercase(),
            attrs,
            closing,
        });
    }
    tags
}

fn find_byte(haystack: &[u8], from: usize, needle: u8) -> Option<usize> {
    haystack.get(from..)?.iter().position(|byte| *byte == needle).map(|pos| pos + from)
}

/// Parse `name` or `name=value` pairs out of the remainder of a tag, after
/// its element name. Operates on byte offsets throughout so that each
/// attribute's consumed range is unambiguous to the next iteration.
fn parse_attrs(rest: &str, out: &mut Vec<(String, String)>) {
    let mut pos = 0usize;
    let len = rest.len();
    while pos < len {
        pos += rest[pos..].len() - rest[pos..].trim_start().len();
        if pos >= len {
            break;
        }
        let name_start = pos;
        while pos < len {
            let Some(ch) = rest[pos..].chars().next() else {
                break;
            };
            if ch == '=' || ch.is_whitespace() {
                break;
            }
            pos += ch.len_utf8();
        }
        let Some(name) = rest.get(name_start..pos) else {
            break;
        };
        if name.is_empty() {
            break;
        }
        pos += rest[pos..].len() - rest[pos..].trim_start().len();
        let mut value = String::new();
        if rest[pos..].starts_with('=') {
            pos += 1;
            pos += rest[pos..].len() - rest[pos..].trim_start().len();
            if let Some(quoted) = rest[pos..].strip_prefix('"') {
                if let Some(end) = quoted.find('"') {
                    value = quoted[..end].to_owned();
                    pos += 1 + end + 1;
                } else {
                    pos = len;
                }
            } else if let Some(quoted) = rest[pos..].strip_prefix('\'') {
                if let Some(end) = quoted.find('\'') {
                    value = quoted[..end].to_owned();
                    pos += 1 + end + 1;
                } else {
                    pos = len;
                }
            } else {
                let word_end = rest[pos..]
                    .find(char::is_whitespace)
                    .map_or(len, |offset| pos + offset);
                value = rest[pos..word_end].to_owned();
                pos = word_end;
            }
        }
        out.push((name.to_owned(), value));
    }
}

/// Classify a tag into a resource kind and discovery hint, or `None` if the
/// tag does not reference a subresource.
pub(crate) fn classify(tag: &Tag, in_head: bool) -> Option<(ResourceKind, DiscoveryHint)> {
    if tag.closing {
        return None;
    }
    match tag.name.as_str() {
        "script" if tag.has_attr("src") => Some((
            ResourceKind::Script,
            DiscoveryHint {
                render_blocking: !tag.has_attr("async") && !tag.has_attr("defer"),
                in_head,
                parser_inserted: true,
                async_or_defer: tag.has_attr("async") || tag.has_attr("defer"),
            },
        )),
        "link" if tag.has_attr("href") => {
            let rel = tag.attr("rel").unwrap_or_default().to_ascii_lowercase();
            let kind = match rel.as_str() {
                "stylesheet" => ResourceKind::Css,
                "preload" => preload_as_kind(tag.attr("as").unwrap_or_default()),
                "icon" | "apple-touch-icon" => ResourceKind::Image,
                _ => return None,
            };
            Some((
                kind,
                DiscoveryHint {
                    render_blocking: rel == "stylesheet" && in_head,
                    in_head,
                    parser_inserted: true,
                    async_or_defer: false,
                },
            ))
        }
        "img" if tag.has_attr("src") => Some((
            ResourceKind::Image,
            DiscoveryHint {
                render_blocking: false,
                in_head,
                parser_inserted: true,
                async_or_defer: tag.attr("loading") == Some("lazy"),
            },
        )),
        "source" if tag.has_attr("src") => Some((
            ResourceKind::Media,
            DiscoveryHint {
                render_blocking: false,
                in_head,
                parser_inserted: true,
                async_or_defer: false,
            },
        )),
        _ => None,
    }
}

fn preload_as_kind(as_value: &str) -> ResourceKind {
    match as_value {
        "script" => ResourceKind::Script,
        "style" => ResourceKind::Css,
        "font" => ResourceKind::Font,
        "image" => ResourceKind::Image,
        _ => ResourceKind::Other,
    }
}

/// Resolve the URL a tag references, relative to `base`.
pub(crate) fn resolve_resource_url(tag: &Tag, base: &Url) -> Option<Url> {
    let raw = tag.attr("src").or_else(|| tag.attr("href"))?;
    base.join(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Attribute values in single and double quotes both parse.
    #[test]
    fn parses_quoted_attributes() {
        let tags = scan_tags("<img src='a.png' alt=\"x y\">");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attr("src"), Some("a.png"));
        assert_eq!(tags[0].attr("alt"), Some("x y"));
    }

    /// Closing tags are recognized and never classified as resources.
    #[test]
    fn closing_tags_are_not_resources() {
        let tags = scan_tags("</script>");
        assert!(tags[0].closing);
        assert!(classify(&tags[0], false).is_none());
    }
}
