//! `LayoutSolver` collaborator surface.
//!
//! Box layout and text shaping are out of scope for the page-lifecycle
//! engine (see the root crate's non-goals); this crate only defines the
//! interface the scheduler and prioritizer consume, plus a deterministic
//! test double standing in for a real layout engine.

use html::{DocumentHandle, NodeId};
use std::collections::HashSet;

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// A computed box for a single node, in CSS pixels relative to the document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// The output of a layout pass: per-node boxes, and which nodes fall within
/// the viewport at the time of computation.
#[derive(Debug, Clone, Default)]
pub struct LayoutResult {
    boxes: Vec<(NodeId, Rect)>,
    in_viewport: HashSet<NodeId>,
    pub complete: bool,
}

impl LayoutResult {
    #[must_use]
    pub fn box_for(&self, node: NodeId) -> Option<Rect> {
        self.boxes
            .iter()
            .find(|(candidate, _)| *candidate == node)
            .map(|(_, rect)| *rect)
    }

    /// All node boxes intersecting `region`, in paint order.
    pub fn boxes_intersecting(&self, region: Rect) -> impl Iterator<Item = (NodeId, Rect)> + '_ {
        self.boxes
            .iter()
            .copied()
            .filter(move |(_, rect)| rect.intersects(&region))
    }
}

/// The layout surface the scheduler's prioritizer and progressive render
/// gate consume, matching spec section 6's `LayoutSolver` collaborator.
pub trait LayoutSolver {
    /// Compute layout for `document` against `viewport`.
    fn compute(&mut self, document: &DocumentHandle, viewport: Viewport) -> LayoutResult;

    /// Whether `node`'s most recently computed box intersects the viewport.
    fn in_viewport(&self, node: NodeId) -> bool;
}

/// A `LayoutSolver` stand-in that stacks every element node into a single
/// column starting at the origin, at a fixed row height. Deterministic and
/// cheap, which is all the scheduler's tests need: it never claims to model
/// real CSS box generation.
#[derive(Debug, Default)]
pub struct StackingLayoutSolver {
    row_height: f64,
    last: LayoutResult,
}

impl StackingLayoutSolver {
    #[must_use]
    pub fn new(row_height: f64) -> Self {
        Self {
            row_height,
            last: LayoutResult::default(),
        }
    }
}

impl LayoutSolver for StackingLayoutSolver {
    fn compute(&mut self, document: &DocumentHandle, viewport: Viewport) -> LayoutResult {
        let mut boxes = Vec::new();
        let mut in_viewport = HashSet::new();
        let mut cursor_y = 0.0_f64;
        for child in document.children(document.root()) {
            let rect = Rect {
                x: 0.0,
                y: cursor_y,
                width: viewport.width,
                height: self.row_height,
            };
            let viewport_rect = Rect {
                x: 0.0,
                y: 0.0,
                width: viewport.width,
                height: viewport.height,
            };
            if rect.intersects(&viewport_rect) {
                in_viewport.insert(child);
            }
            boxes.push((child, rect));
            cursor_y += self.row_height;
        }
        let result = LayoutResult {
            boxes,
            in_viewport,
            complete: true,
        };
        self.last = result.clone();
        result
    }

    fn in_viewport(&self, node: NodeId) -> bool {
        self.last.in_viewport.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[derive(Default)]
    struct NoopEvents;
    impl html::DomBuilderEvents for NoopEvents {
        fn on_subresource_discovered(
            &mut self,
            _url: &Url,
            _kind: html::ResourceKind,
            _hint: html::DiscoveryHint,
        ) {
        }
        fn on_dom_content_loaded(&mut self) {}
    }

    /// Nodes within the first viewport height are reported as in-viewport.
    #[test]
    fn marks_nodes_in_viewport() -> Result<(), anyhow::Error> {
        let base = Url::parse("http://example.test/")?;
        let mut builder = html::ScanningDomBuilder::new(base, NoopEvents);
        html::DomBuilder::feed(&mut builder, b"<div></div><div></div>")?;
        let document = Box::new(builder).finish()?;

        let mut solver = StackingLayoutSolver::new(50.0);
        let viewport = Viewport {
            width: 800.0,
            height: 60.0,
        };
        let result = solver.compute(&document, viewport);
        assert!(result.complete);
        let children: Vec<_> = document.children(document.root()).collect();
        assert!(solver.in_viewport(children[0]));
        assert!(!solver.in_viewport(children[1]));
        Ok(())
    }
}
