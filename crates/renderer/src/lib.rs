//! `Rasterizer` collaborator surface.
//!
//! Actual pixel production (software or GPU) is out of scope for the
//! page-lifecycle engine; this crate defines the interface the progressive
//! render gate drives, builds a minimal display list from a layout result,
//! and ships a no-op backend for tests and headless embeddings.

pub mod backend;
pub mod display_list;

use backend::RenderTarget;
use bytes::Bytes;
use display_list::{DisplayItem, DisplayList};
use layout::{LayoutResult, Rect};

/// Identifies a single produced frame, in paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

/// Parameters for a screenshot capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenshotOptions {
    pub full_page: bool,
}

/// The paint surface the progressive render gate drives, matching spec
/// section 6's `Rasterizer` collaborator.
pub trait Rasterizer {
    /// Paint `result` restricted to `region`, returning the produced frame's
    /// identifier.
    fn paint(&mut self, result: &LayoutResult, region: Rect) -> FrameId;

    /// Capture the most recently painted content as encoded image bytes.
    fn screenshot(&self, opts: ScreenshotOptions) -> Bytes;
}

/// A `Rasterizer` that builds a flat fill-rect display list from a layout
/// result's boxes and hands it to a `RenderTarget`.
pub struct DisplayListRasterizer<T> {
    target: T,
    last_list: DisplayList,
}

impl<T: RenderTarget> DisplayListRasterizer<T> {
    #[must_use]
    pub fn new(target: T) -> Self {
        Self {
            target,
            last_list: DisplayList::new(),
        }
    }
}

impl<T: RenderTarget> Rasterizer for DisplayListRasterizer<T> {
    fn paint(&mut self, result: &LayoutResult, region: Rect) -> FrameId {
        let mut list = DisplayList::new();
        for (node, rect) in result.boxes_intersecting(region) {
            let _ = node;
            list.push(DisplayItem::Fill { rect, color: 0 });
        }
        let frame = self.target.paint(&list);
        self.last_list = list;
        frame
    }

    fn screenshot(&self, _opts: ScreenshotOptions) -> Bytes {
        self.target.encode()
    }
}
