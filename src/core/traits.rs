//! Seams to collaborators outside the compositing core.

/// Consumer of a finished image, typically a PNG writer.
///
/// Receives 8-bit straight-alpha RGBA rows (bottom row first, matching the
/// image's row-major layout from `y_min` up), the image size and free-form
/// text comments to embed.
pub trait ImageEncoder {
    type Error;
    fn encode(
        &mut self,
        rgba: &[u8],
        width: usize,
        height: usize,
        comments: &[String],
    ) -> Result<(), Self::Error>;
}
