//! UI-icon heuristic.
//!
//! Exported attachments are full of launcher icons, emoji sprites and avatar
//! placeholders that drown real photos in image search. An image counts as an
//! icon when it is small, has a flat palette and (if a size hint is given) a
//! small file.

use std::collections::HashSet;

use image::{DynamicImage, GenericImageView};

/// Largest edge, in pixels, an icon may have (covers the 16 to 128 px tiers).
pub const EDGE_MAX: u32 = 150;

/// Most distinct RGBA colours an icon may use (indexed-PNG palette size).
pub const COLORS_MAX: usize = 256;

/// Largest file, in bytes, an icon may occupy when a size hint is given.
pub const ICON_BYTES_MAX: u64 = 10_000;

/// Decides whether `image` is a UI icon.
///
/// `file_bytes` is the optional on-disk size of the source file.
pub fn is_icon(image: &DynamicImage, file_bytes: Option<u64>) -> bool {
    let (width, height) = image.dimensions();
    if width.max(height) > EDGE_MAX {
        return false;
    }

    match distinct_colors(image, COLORS_MAX) {
        Some(count) if count <= COLORS_MAX => {}
        _ => return false,
    }

    !matches!(file_bytes, Some(bytes) if bytes > ICON_BYTES_MAX)
}

/// Counts distinct RGBA colours, giving up once `limit` is exceeded.
fn distinct_colors(image: &DynamicImage, limit: usize) -> Option<usize> {
    let rgba = image.to_rgba8();
    let mut seen = HashSet::with_capacity(limit + 1);
    for pixel in rgba.pixels() {
        seen.insert(pixel.0);
        if seen.len() > limit {
            return None;
        }
    }
    Some(seen.len())
}
