//! Image to PDF page conversion
//!
//! Places a raster image on a single A4 page, scaled to fit while keeping
//! its aspect ratio and centered on both axes.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::error::PdfMergeError;
use crate::task::Orientation;

/// A4 width in points.
pub const A4_WIDTH: u32 = 595;
/// A4 height in points.
pub const A4_HEIGHT: u32 = 842;

const IMAGE_RESOURCE_NAME: &str = "Im0";

/// Where an image lands on its page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub page_width: u32,
    pub page_height: u32,
    /// Left margin.
    pub x: f32,
    /// Bottom margin.
    pub y: f32,
    pub width: u32,
    pub height: u32,
}

/// Compute page size and image placement for an image of the given pixel size.
///
/// The scale factor is `min(page_w / image_w, page_h / image_h)`, so the
/// image fills one axis and is centered on the other.
pub fn fit_to_page(image_width: u32, image_height: u32, orientation: Orientation) -> PagePlacement {
    let (page_width, page_height) = match orientation {
        Orientation::Portrait => (A4_WIDTH, A4_HEIGHT),
        Orientation::Landscape => (A4_HEIGHT, A4_WIDTH),
    };

    let image_width = image_width.max(1) as f64;
    let image_height = image_height.max(1) as f64;
    let scale = (page_width as f64 / image_width).min(page_height as f64 / image_height);

    // Epsilon keeps exact fits like 200 * (595 / 200) from flooring to 594.
    let width = ((image_width * scale + 1e-6).floor() as u32).clamp(1, page_width);
    let height = ((image_height * scale + 1e-6).floor() as u32).clamp(1, page_height);

    PagePlacement {
        page_width,
        page_height,
        x: (page_width - width) as f32 / 2.0,
        y: (page_height - height) as f32 / 2.0,
        width,
        height,
    }
}

/// Decode an uploaded raster image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PdfMergeError> {
    image::load_from_memory(bytes)
        .map_err(|e| PdfMergeError::UnreadableDocument(format!("Failed to decode image: {}", e)))
}

/// Build a one-page document containing `image` placed per [`fit_to_page`].
///
/// Transparency is flattened onto white. The pixels are embedded losslessly
/// as a FlateDecode RGB image, entirely in memory.
pub fn render_image_page(
    image: &DynamicImage,
    orientation: Orientation,
) -> Result<Document, PdfMergeError> {
    let placement = fit_to_page(image.width(), image.height(), orientation);

    let rgb = flatten_onto_white(image);
    let scaled = image::imageops::resize(
        &rgb,
        placement.width,
        placement.height,
        FilterType::Triangle,
    );

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(scaled.as_raw())
        .and_then(|_| encoder.flush())
        .map_err(|e| PdfMergeError::OperationError(format!("Image compression failed: {}", e)))?;
    let pixels = encoder
        .finish()
        .map_err(|e| PdfMergeError::OperationError(format!("Image compression failed: {}", e)))?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => placement.width as i64,
            "Height" => placement.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        },
        pixels,
    )
    .with_compression(false);
    let image_id = doc.add_object(Object::Stream(image_stream));

    // PDF image space is a unit square; `cm` scales it to the placed size.
    let content = format!(
        "q {} 0 0 {} {:.2} {:.2} cm /{} Do Q",
        placement.width, placement.height, placement.x, placement.y, IMAGE_RESOURCE_NAME
    );
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            (placement.page_width as i64).into(),
            (placement.page_height as i64).into(),
        ],
        "Contents" => content_id,
        "Resources" => Object::Dictionary(dictionary! {
            "XObject" => Object::Dictionary(dictionary! {
                IMAGE_RESOURCE_NAME => image_id,
            }),
        }),
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

/// Convert encoded image bytes into serialized single-page PDF bytes.
pub fn render_image_to_pdf(
    bytes: &[u8],
    orientation: Orientation,
) -> Result<Vec<u8>, PdfMergeError> {
    let image = decode_image(bytes)?;
    let mut doc = render_image_page(&image, orientation)?;

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfMergeError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Composite any alpha channel onto a white background.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
