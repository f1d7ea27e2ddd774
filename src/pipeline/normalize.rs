//! Image normalisation: any supported raster image → single-page PDF.
//!
//! The OCR service takes documents, not bare images, and PDF image XObjects
//! only carry `DeviceRGB` here (plus an optional soft mask for alpha). So each
//! image is decoded, its colour mode folded onto RGB or RGBA, and written as
//! the only page of a fresh PDF.
//!
//! Page geometry assumes 100 DPI: a 1000 × 500 px scan becomes a
//! 720 × 360 pt page.

use crate::error::ConversionError;
use flate2::{write::ZlibEncoder, Compression};
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Resolution the page size is derived from.
pub const ARTIFACT_DPI: u32 = 100;

/// Decode `path` and write a single-page PDF to `output`.
///
/// The decoder is chosen from the file extension.
pub fn normalize_file(path: &Path, output: &Path) -> Result<(), ConversionError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let format = format_for_extension(&ext)?;
    let bytes = std::fs::read(path)?;
    normalize(&bytes, Some(format), output)
}

/// Decode image `bytes` and write a single-page PDF to `output`.
///
/// With `format = None` the format is sniffed from the bytes.
pub fn normalize(
    bytes: &[u8],
    format: Option<ImageFormat>,
    output: &Path,
) -> Result<(), ConversionError> {
    let img = match format {
        Some(f) => image::load_from_memory_with_format(bytes, f)?,
        None => image::load_from_memory(bytes)?,
    };
    debug!("Decoded {:?} image {}x{}", img.color(), img.width(), img.height());

    let img = to_pdf_color(img);
    let mut doc = single_page_pdf(&img)?;

    let mut file = std::fs::File::create(output)?;
    doc.save_to(&mut file)
        .map_err(|e| ConversionError::Pdf(e.to_string()))?;
    file.flush()?;
    Ok(())
}

/// Map a lower-case extension to a decoder available in this build.
pub fn format_for_extension(ext: &str) -> Result<ImageFormat, ConversionError> {
    ImageFormat::from_extension(ext)
        .filter(|f| f.reading_enabled())
        .ok_or_else(|| ConversionError::UnsupportedFormat(ext.to_string()))
}

/// Fold any colour mode onto RGB8 or RGBA8.
///
/// Grayscale (with or without alpha) becomes RGB. Anything else keeps alpha
/// only when it has an alpha channel. Palette images arrive here already
/// expanded by the decoder, RGBA exactly when they carry transparency.
pub fn to_pdf_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn single_page_pdf(img: &DynamicImage) -> Result<Document, ConversionError> {
    let (width, height) = img.dimensions();
    let (rgb, alpha) = split_channels(img);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image_dict = image_xobject(width, height, "DeviceRGB");
    if let Some(alpha) = alpha {
        let smask = Stream::new(image_xobject(width, height, "DeviceGray"), deflate(&alpha)?);
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }
    let image_id = doc.add_object(Stream::new(image_dict, deflate(&rgb)?));

    let page_w = px_to_points(width);
    let page_h = px_to_points(height);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(page_w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(page_h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ConversionError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page_w),
            Object::Integer(page_h),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

fn image_xobject(width: u32, height: u32, color_space: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(i64::from(width)),
        "Height" => Object::Integer(i64::from(height)),
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => Object::Integer(8),
        "Filter" => "FlateDecode",
    }
}

/// Interleaved RGB samples plus a separate alpha plane for RGBA input.
fn split_channels(img: &DynamicImage) -> (Vec<u8>, Option<Vec<u8>>) {
    match img {
        DynamicImage::ImageRgba8(rgba) => {
            let pixels = rgba.as_raw();
            let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
            let mut alpha = Vec::with_capacity(pixels.len() / 4);
            for px in pixels.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        other => (other.to_rgb8().into_raw(), None),
    }
}

fn px_to_points(px: u32) -> i64 {
    let points = (u64::from(px) * 72).div_ceil(u64::from(ARTIFACT_DPI));
    points.max(1) as i64
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, GrayImage, LumaA, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    fn page_count(path: &Path) -> usize {
        Document::load(path).expect("valid PDF").get_pages().len()
    }

    #[test]
    fn grayscale_becomes_rgb() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, image::Luma([128])));
        assert!(matches!(to_pdf_color(gray), DynamicImage::ImageRgb8(_)));

        let gray_alpha =
            DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(4, 4, LumaA([128, 10])));
        assert!(matches!(to_pdf_color(gray_alpha), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn alpha_is_kept_only_when_present() {
        let rgba16 = DynamicImage::ImageRgba16(image::ImageBuffer::from_pixel(
            2,
            2,
            Rgba([0u16, 0, 0, 65535]),
        ));
        assert!(matches!(to_pdf_color(rgba16), DynamicImage::ImageRgba8(_)));

        let rgb16 =
            DynamicImage::ImageRgb16(image::ImageBuffer::from_pixel(2, 2, Rgb([0u16, 0, 0])));
        assert!(matches!(to_pdf_color(rgb16), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn rgb_png_yields_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("scan.pdf");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([200, 10, 10])));

        normalize(&png_bytes(&img), Some(ImageFormat::Png), &out).expect("normalize");
        assert_eq!(page_count(&out), 1);
    }

    #[test]
    fn rgba_and_gray_pngs_yield_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let images = [
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 100]))),
            DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, image::Luma([7]))),
        ];
        for (i, img) in images.iter().enumerate() {
            let out = dir.path().join(format!("{i}.pdf"));
            normalize(&png_bytes(img), None, &out).expect("normalize");
            assert_eq!(page_count(&out), 1);
        }
    }

    #[test]
    fn normalize_file_reads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("photo.png");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])));
        std::fs::write(&src, png_bytes(&img)).unwrap();

        let out = dir.path().join("photo.pdf");
        normalize_file(&src, &out).expect("normalize");
        assert_eq!(page_count(&out), 1);
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bad.pdf");
        let err = normalize(b"definitely not a png", Some(ImageFormat::Png), &out).unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)), "got: {err}");
    }

    #[test]
    fn jp2_has_no_decoder() {
        assert!(matches!(
            format_for_extension("jp2"),
            Err(ConversionError::UnsupportedFormat(_))
        ));
        assert_eq!(format_for_extension("jpg").unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn page_geometry_at_100_dpi() {
        assert_eq!(px_to_points(1000), 720);
        assert_eq!(px_to_points(1), 1);
        assert_eq!(px_to_points(0), 1);
    }
}
