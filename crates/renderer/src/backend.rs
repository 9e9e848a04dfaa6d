//! The `RenderBackend`-style trait `Rasterizer` delegates to, kept in its
//! own module the way a real backend (software, GPU, ...) would live
//! alongside the trait it implements.

use crate::display_list::DisplayList;
use crate::FrameId;
use bytes::Bytes;

/// A target a backend paints a display list into. Implementations may be
/// backed by a pixel buffer, a GPU surface, or (in tests) nothing at all.
pub trait RenderTarget {
    /// Paint `list` into this target, returning the frame identifier
    /// assigned to the paint.
    fn paint(&mut self, list: &DisplayList) -> FrameId;

    /// Encode the current contents of the target as image bytes.
    fn encode(&self) -> Bytes;
}

/// A `RenderTarget` that discards its display lists and returns a fixed
/// placeholder image. Used in tests and in embeddings that only care about
/// scheduling behavior, not actual pixels.
#[derive(Debug, Default)]
pub struct NullRenderTarget {
    frames_painted: u64,
}

impl RenderTarget for NullRenderTarget {
    fn paint(&mut self, _list: &DisplayList) -> FrameId {
        self.frames_painted += 1;
        FrameId(self.frames_painted)
    }

    fn encode(&self) -> Bytes {
        Bytes::from_static(&[])
    }
}
