//! `DomBuilder` collaborator surface.
//!
//! HTML tokenization and tree construction are out of scope for the
//! page-lifecycle engine (see the root crate's non-goals): a production
//! embedding would wire a real engine (html5ever, or similar) behind the
//! `DomBuilder` trait below. This crate provides the trait plus a
//! dependency-free scanning implementation that is faithful enough to
//! drive subresource discovery and `DOMContentLoaded` in tests and
//! lightweight embeddings, without reimplementing tree construction.

mod scan;

use indextree::Arena;
use std::fmt;
use thiserror::Error;
use url::Url;

/// The kind of a discovered resource. Shared vocabulary between the DOM
/// builder (which discovers resources while parsing) and the scheduler's
/// resource catalog (which tracks them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResourceKind {
    Html,
    Css,
    Script,
    Font,
    Image,
    Media,
    Xhr,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Script => "script",
            Self::Font => "font",
            Self::Image => "image",
            Self::Media => "media",
            Self::Xhr => "xhr",
            Self::Other => "other",
        };
        formatter.write_str(label)
    }
}

/// A hint accompanying a discovered subresource, e.g. `as=script` on a
/// `<link rel=preload>`, or whether a script is `async`/`defer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryHint {
    pub render_blocking: bool,
    pub in_head: bool,
    pub parser_inserted: bool,
    pub async_or_defer: bool,
}

/// Errors raised while constructing a document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document bytes were not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
    #[error("malformed markup: {0}")]
    Malformed(String),
}

/// Stable identifier for a node in a parsed document, scoped to the
/// `DocumentHandle` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub indextree::NodeId);

/// A node in the minimal retained DOM this crate builds.
#[derive(Debug, Clone)]
pub enum DomNode {
    Document,
    Element { tag: String, attrs: Vec<(String, String)> },
    Text { data: String },
}

/// The parsed document handed to layout/render collaborators.
pub struct DocumentHandle {
    arena: Arena<DomNode>,
    root: indextree::NodeId,
    pub title: Option<String>,
}

impl DocumentHandle {
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(self.root)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.arena.get(id.0).map(indextree::Node::get)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.0.children(&self.arena).map(NodeId)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.arena.count()
    }
}

/// Callbacks the DOM builder fires synchronously while parsing, matching
/// the collaborator interface the scheduler consumes.
pub trait DomBuilderEvents {
    /// A subresource reference was discovered in markup (link, script, img, ...).
    fn on_subresource_discovered(&mut self, url: &Url, kind: ResourceKind, hint: DiscoveryHint);

    /// The parser has finished building the initial DOM and run deferred
    /// scripts; equivalent to the `DOMContentLoaded` event.
    fn on_dom_content_loaded(&mut self);
}

/// The DOM construction surface the scheduler drives.
pub trait DomBuilder {
    /// Feed a chunk of document bytes to the parser. May be called multiple
    /// times as bytes arrive from the transport.
    ///
    /// # Errors
    /// Returns `ParseError` if the chunk cannot be decoded.
    fn feed(&mut self, bytes: &[u8]) -> Result<(), ParseError>;

    /// Finalize parsing and hand back the completed document.
    ///
    /// # Errors
    /// Returns `ParseError` if the document could not be completed.
    fn finish(self: Box<Self>) -> Result<DocumentHandle, ParseError>;
}

/// A scanning `DomBuilder` that recognizes enough markup to discover
/// subresources and signal `DOMContentLoaded`, without performing real
/// HTML5 tree construction.
pub struct ScanningDomBuilder<E> {
    base_url: Url,
    buffer: Vec<u8>,
    events: E,
    arena: Arena<DomNode>,
    root: indextree::NodeId,
    in_head: bool,
    dcl_fired: bool,
}

impl<E: DomBuilderEvents> ScanningDomBuilder<E> {
    #[must_use]
    pub fn new(base_url: Url, events: E) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(DomNode::Document);
        Self {
            base_url,
            buffer: Vec::new(),
            events,
            arena,
            root,
            in_head: false,
            dcl_fired: false,
        }
    }
}

impl<E: DomBuilderEvents> DomBuilder for ScanningDomBuilder<E> {
    fn feed(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        self.buffer.extend_from_slice(bytes);
        let text = std::str::from_utf8(&self.buffer).map_err(ParseError::InvalidEncoding)?;
        for tag in scan::scan_tags(text) {
            if tag.name.eq_ignore_ascii_case("head") {
                self.in_head = !tag.closing;
            }
            let Some((kind, hint)) = scan::classify(&tag, self.in_head) else {
                let child = self.arena.new_node(DomNode::Element {
                    tag: tag.name.clone(),
                    attrs: tag.attrs.clone(),
                });
                self.root.append(child, &mut self.arena);
                continue;
            };
            if let Some(url) = scan::resolve_resource_url(&tag, &self.base_url) {
                self.events.on_subresource_discovered(&url, kind, hint);
            }
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<DocumentHandle, ParseError> {
        if !self.dcl_fired {
            self.events.on_dom_content_loaded();
            self.dcl_fired = true;
        }
        Ok(DocumentHandle {
            arena: self.arena,
            root: self.root,
            title: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        discovered: Vec<(String, ResourceKind, DiscoveryHint)>,
        dcl: bool,
    }

    impl DomBuilderEvents for Recorder {
        fn on_subresource_discovered(&mut self, url: &Url, kind: ResourceKind, hint: DiscoveryHint) {
            self.discovered.push((url.to_string(), kind, hint));
        }

        fn on_dom_content_loaded(&mut self) {
            self.dcl = true;
        }
    }

    /// An empty document still fires `DOMContentLoaded` once, on finish.
    #[test]
    fn empty_document_fires_dom_content_loaded() -> Result<(), anyhow::Error> {
        let base = Url::parse("http://example.test/")?;
        let builder: Box<dyn DomBuilder> =
            Box::new(ScanningDomBuilder::new(base, Recorder::default()));
        let doc = builder.finish()?;
        assert_eq!(doc.node_count(), 1);
        Ok(())
    }

    /// A script tag in the head is discovered as render-blocking.
    #[test]
    fn discovers_head_script_as_render_blocking() -> Result<(), anyhow::Error> {
        let base = Url::parse("http://example.test/")?;
        let mut builder = ScanningDomBuilder::new(base, Recorder::default());
        builder.feed(b"<head><script src=\"app.js\"></script></head>")?;
        assert_eq!(builder.events.discovered.len(), 1);
        let (url, kind, hint) = &builder.events.discovered[0];
        assert!(url.ends_with("app.js"));
        assert_eq!(*kind, ResourceKind::Script);
        assert!(hint.render_blocking);
        assert!(hint.in_head);
        Ok(())
    }

    /// An async script is discovered but not marked render-blocking.
    #[test]
    fn async_script_is_not_render_blocking() -> Result<(), anyhow::Error> {
        let base = Url::parse("http://example.test/")?;
        let mut builder = ScanningDomBuilder::new(base, Recorder::default());
        builder.feed(b"<script src=\"a.js\" async></script>")?;
        let (_, _, hint) = &builder.events.discovered[0];
        assert!(!hint.render_blocking);
        Ok(())
    }
}
