//! PDF to page-raster conversion
//!
//! The engine's page processor cannot read PDFs. A rasterized document is a
//! temporary directory of page images plus a list file naming them in order;
//! the engine accepts the list file as a multi-page input. Everything is
//! removed when the `RasterizedDocument` is dropped.

use crate::error::OcrError;
use image::DynamicImage;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Page images extracted from a document, deleted on drop
#[derive(Debug)]
pub struct RasterizedDocument {
    dir: TempDir,
    list_path: PathBuf,
    pages: Vec<PathBuf>,
}

impl RasterizedDocument {
    /// Write `images` as PNG pages into a fresh temporary directory
    pub fn from_images(images: &[DynamicImage]) -> Result<Self, OcrError> {
        let dir = tempfile::Builder::new()
            .prefix("ocr-raster-")
            .tempdir()
            .map_err(|e| OcrError::RasterizeError(format!("Failed to create temp dir: {}", e)))?;

        let mut pages = Vec::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            let page_path = dir.path().join(format!("page-{:04}.png", i + 1));
            img.save_with_format(&page_path, image::ImageFormat::Png)
                .map_err(|e| {
                    OcrError::RasterizeError(format!("Failed to write page {}: {}", i + 1, e))
                })?;
            pages.push(page_path);
        }

        let list_path = dir.path().join("pages.txt");
        let mut list = File::create(&list_path)?;
        for page in &pages {
            writeln!(list, "{}", page.display())?;
        }

        Ok(Self {
            dir,
            list_path,
            pages,
        })
    }

    /// Multi-page input to hand to the engine
    pub fn list_path(&self) -> &Path {
        &self.list_path
    }

    /// Page image paths in document order
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Converts a PDF into page rasters
pub trait DocumentRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &Path) -> Result<RasterizedDocument, OcrError>;
}

/// Rasterizer that lifts the embedded page images out of a PDF with `lopdf`.
///
/// Suited to scanned documents; vector-only pages yield nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRasterizer;

impl DocumentRasterizer for LopdfRasterizer {
    fn rasterize(&self, pdf: &Path) -> Result<RasterizedDocument, OcrError> {
        let images = extract_images_from_pdf(pdf)?;
        if images.is_empty() {
            return Err(OcrError::RasterizeError(format!(
                "No page images found in {}",
                pdf.display()
            )));
        }

        tracing::info!("Rasterized {} into {} page(s)", pdf.display(), images.len());
        RasterizedDocument::from_images(&images)
    }
}

/// Check if a file is a PDF by its extension or magic bytes
pub fn is_pdf(path: &Path) -> Result<bool, OcrError> {
    if let Some(ext) = path.extension() {
        if ext.to_string_lossy().eq_ignore_ascii_case("pdf") {
            return Ok(true);
        }
    }

    let mut file = File::open(path)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut magic = [0u8; 5];
    if file.read_exact(&mut magic).is_ok() {
        return Ok(&magic == b"%PDF-");
    }

    Ok(false)
}

/// Parent links followed when looking for inherited page resources
const MAX_INHERIT_DEPTH: usize = 32;

/// One image per page, in page-tree order.
///
/// Each page is represented by its largest image XObject. Images referenced
/// as another image's `/SMask` or `/Mask` are never pages. A page with no
/// decodable image is skipped.
fn extract_images_from_pdf(path: &Path) -> Result<Vec<DynamicImage>, OcrError> {
    use lopdf::Document;

    let doc = Document::load(path)
        .map_err(|e| OcrError::RasterizeError(format!("Failed to load PDF: {}", e)))?;

    let masks = mask_ids(&doc);
    let mut images = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let mut candidates = page_images(&doc, page_id, &masks);
        candidates.sort_by_key(|(_, stream)| std::cmp::Reverse(image_area(stream)));

        let decoded = candidates.into_iter().find_map(|(object_id, stream)| {
            image_from_stream(&doc, stream)
                .map_err(|e| tracing::warn!("Skipping image object {:?}: {}", object_id, e))
                .ok()
        });
        match decoded {
            Some(img) => images.push(img),
            None => tracing::warn!("Page {} has no usable image, skipping", page_number),
        }
    }

    Ok(images)
}

/// Ids of every stream used as a soft mask or stencil mask
fn mask_ids(doc: &lopdf::Document) -> HashSet<lopdf::ObjectId> {
    doc.objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| is_image(stream))
        .flat_map(|stream| {
            [&b"SMask"[..], &b"Mask"[..]]
                .into_iter()
                .filter_map(move |key| stream.dict.get(key).ok()?.as_reference().ok())
        })
        .collect()
}

/// Image XObjects named in a page's resources, masks excluded
fn page_images<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    masks: &HashSet<lopdf::ObjectId>,
) -> Vec<(lopdf::ObjectId, &'a lopdf::Stream)> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"XObject").ok())
        .and_then(|x| resolve(doc, x).as_dict().ok())
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(_, value)| value.as_reference().ok())
        .filter(|id| !masks.contains(id))
        .filter_map(|id| {
            let stream = doc.get_object(id).ok()?.as_stream().ok()?;
            is_image(stream).then_some((id, stream))
        })
        .collect()
}

/// The page's resource dictionary, inherited from the page tree if needed
fn page_resources(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Option<&lopdf::Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    obj.as_reference()
        .ok()
        .and_then(|id| doc.get_object(id).ok())
        .unwrap_or(obj)
}

fn is_image(stream: &lopdf::Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(|s| s.as_name())
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn image_area(stream: &lopdf::Stream) -> u64 {
    let side = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(|v| v.as_i64())
            .map(|v| v.max(0) as u64)
            .unwrap_or(0)
    };
    side(b"Width").saturating_mul(side(b"Height"))
}

fn image_from_stream(doc: &lopdf::Document, stream: &lopdf::Stream) -> Result<DynamicImage, OcrError> {
    if stream_filter(stream).as_deref() == Some("DCTDecode") {
        return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
            .map_err(|e| OcrError::RasterizeError(format!("Failed to decode JPEG image: {}", e)));
    }

    let dimension = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|v| v.as_i64().ok())
            .filter(|v| *v > 0)
            .map(|v| v as u32)
    };
    let width = dimension(b"Width")
        .ok_or_else(|| OcrError::RasterizeError("Missing image width".to_string()))?;
    let height = dimension(b"Height")
        .ok_or_else(|| OcrError::RasterizeError("Missing image height".to_string()))?;

    let data = if stream.dict.get(b"Filter").is_err() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| OcrError::RasterizeError(format!("Failed to decompress image: {}", e)))?
    };

    let bits_per_component = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);
    if bits_per_component != 8 {
        return Err(OcrError::RasterizeError(format!(
            "Unsupported bit depth: {} bits per component",
            bits_per_component
        )));
    }

    let too_large = || {
        OcrError::RasterizeError(format!("Image dimensions {}x{} are too large", width, height))
    };
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(too_large)?;
    let invalid = || OcrError::RasterizeError("Image data shorter than its geometry".to_string());

    match color_space(doc, stream).as_str() {
        "DeviceGray" => {
            let img = image::GrayImage::from_raw(width, height, truncate(data, pixels))
                .ok_or_else(invalid)?;
            Ok(DynamicImage::ImageLuma8(img))
        }
        "DeviceRGB" | "ICCBased" => {
            let len = pixels.checked_mul(3).ok_or_else(too_large)?;
            let img = image::RgbImage::from_raw(width, height, truncate(data, len))
                .ok_or_else(invalid)?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        "DeviceCMYK" => {
            let rgb: Vec<u8> = data
                .chunks_exact(4)
                .take(pixels)
                .flat_map(|px| {
                    let k = 1.0 - px[3] as f32 / 255.0;
                    [
                        ((1.0 - px[0] as f32 / 255.0) * k * 255.0) as u8,
                        ((1.0 - px[1] as f32 / 255.0) * k * 255.0) as u8,
                        ((1.0 - px[2] as f32 / 255.0) * k * 255.0) as u8,
                    ]
                })
                .collect();
            let img = image::RgbImage::from_raw(width, height, rgb).ok_or_else(invalid)?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        other => Err(OcrError::RasterizeError(format!(
            "Unsupported color space: {}",
            other
        ))),
    }
}

fn truncate(mut data: Vec<u8>, len: usize) -> Vec<u8> {
    data.truncate(len);
    data
}

fn stream_filter(stream: &lopdf::Stream) -> Option<String> {
    let filter = stream.dict.get(b"Filter").ok()?;
    if let Ok(name) = filter.as_name() {
        return Some(String::from_utf8_lossy(name).into_owned());
    }
    let last = filter.as_array().ok()?.last()?;
    last.as_name()
        .ok()
        .map(|name| String::from_utf8_lossy(name).into_owned())
}

/// Color space name, following one level of indirection
fn color_space(doc: &lopdf::Document, stream: &lopdf::Stream) -> String {
    let Ok(cs_obj) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    let resolved = resolve(doc, cs_obj);

    if let Ok(name) = resolved.as_name() {
        return String::from_utf8_lossy(name).into_owned();
    }

    resolved
        .as_array()
        .ok()
        .and_then(|array| array.first())
        .and_then(|first| first.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}
