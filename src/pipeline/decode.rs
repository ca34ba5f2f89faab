//! Image decoding: raw bytes → `DynamicImage`, rejecting corrupt data.
//!
//! The decode is a full decode, not a header sniff, so a truncated download
//! fails here in the fetch worker instead of later inside compose.

use crate::error::CardError;
use crate::model::WorkItem;
use image::DynamicImage;
use tracing::debug;

/// Decode and validate the image for `item`.
pub fn decode_card(item: &WorkItem, bytes: &[u8]) -> Result<DynamicImage, CardError> {
    let image = image::load_from_memory(bytes).map_err(|e| CardError::ImageCorrupt {
        card: item.name.clone(),
        detail: e.to_string(),
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(CardError::ImageCorrupt {
            card: item.name.clone(),
            detail: "image has no pixels".into(),
        });
    }

    debug!(
        "Decoded '{}' → {}x{} px",
        item.name,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 16, Rgb([10, 200, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn decodes_png_and_jpeg() {
        let item = WorkItem::new(1, "Forest");
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let img = decode_card(&item, &encoded(format)).unwrap();
            assert_eq!((img.width(), img.height()), (12, 16));
        }
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_card(&WorkItem::new(1, "Swamp"), b"<html>not found</html>").unwrap_err();
        assert_eq!(err.kind(), "image-corrupt");
        assert_eq!(err.card(), "Swamp");
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = encoded(ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode_card(&WorkItem::new(1, "Island"), truncated).is_err());
    }
}
