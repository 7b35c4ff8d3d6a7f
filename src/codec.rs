//! Image decoding into engine-ready pages

use crate::error::OcrError;
use crate::frame::DecodedImage;
use image::codecs::gif::GifDecoder;
use image::{
    AnimationDecoder, DynamicImage, GrayImage, ImageBuffer, ImageFormat, ImageReader, Luma, LumaA,
    RgbImage, RgbaImage,
};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::ColorType;

/// Outcome of decoding a single page
pub type PageResult = Result<DecodedImage, OcrError>;

/// Turns image files into ordered pages.
///
/// A file that cannot be opened at all is an error; a page that fails on
/// its own is reported in place so the caller can skip it.
pub trait ImageCodec: Send + Sync {
    fn decode_file(&self, path: &Path) -> Result<Vec<PageResult>, OcrError>;

    fn decode_image(&self, image: &DynamicImage) -> Vec<PageResult> {
        vec![Ok(DecodedImage::from_dynamic(image))]
    }
}

/// Codec backed by the `image` crate. Animated GIF frames and TIFF
/// directories become pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode_file(&self, path: &Path) -> Result<Vec<PageResult>, OcrError> {
        let reader = ImageReader::open(path)
            .map_err(|e| OcrError::CodecError(format!("Failed to open {}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| OcrError::CodecError(format!("Failed to read {}: {}", path.display(), e)))?;

        if reader.format() == Some(ImageFormat::Gif) {
            return decode_gif_frames(path);
        }
        if reader.format() == Some(ImageFormat::Tiff) {
            return decode_tiff_pages(path);
        }

        let img = reader
            .decode()
            .map_err(|e| OcrError::CodecError(format!("Failed to load image: {}", e)))?;

        tracing::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            img.width(),
            img.height()
        );

        Ok(vec![Ok(DecodedImage::from_dynamic(&img))])
    }
}

fn decode_gif_frames(path: &Path) -> Result<Vec<PageResult>, OcrError> {
    let file = File::open(path)?;
    let decoder = GifDecoder::new(BufReader::new(file))?;

    let pages: Vec<PageResult> = decoder
        .into_frames()
        .map(|frame| {
            frame
                .map(|f| DecodedImage::from_dynamic(&DynamicImage::ImageRgba8(f.into_buffer())))
                .map_err(OcrError::from)
        })
        .collect();

    tracing::debug!("Decoded {} GIF frame(s) from {}", pages.len(), path.display());
    Ok(pages)
}

fn decode_tiff_pages(path: &Path) -> Result<Vec<PageResult>, OcrError> {
    let file = File::open(path)?;
    let mut decoder = TiffDecoder::new(BufReader::new(file))
        .map_err(|e| OcrError::CodecError(format!("Failed to read TIFF {}: {}", path.display(), e)))?;

    let mut pages = vec![tiff_page(&mut decoder)];
    while decoder.more_images() {
        if let Err(e) = decoder.next_image() {
            pages.push(Err(OcrError::CodecError(format!(
                "Failed to seek to TIFF page {}: {}",
                pages.len() + 1,
                e
            ))));
            break;
        }
        pages.push(tiff_page(&mut decoder));
    }

    tracing::debug!("Decoded {} TIFF page(s) from {}", pages.len(), path.display());
    Ok(pages)
}

/// Decode the decoder's current directory
fn tiff_page<R: Read + Seek>(decoder: &mut TiffDecoder<R>) -> PageResult {
    let failed = |e: tiff::TiffError| OcrError::CodecError(format!("Failed to decode TIFF page: {}", e));
    let (width, height) = decoder.dimensions().map_err(failed)?;
    let color = decoder.colortype().map_err(failed)?;
    let data = decoder.read_image().map_err(failed)?;

    let img = match (color, data) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => {
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (ColorType::Gray(1), DecodingResult::U8(buf)) => {
            GrayImage::from_raw(width, height, unpack_bilevel(&buf, width, height))
                .map(DynamicImage::ImageLuma8)
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (ColorType::GrayA(8), DecodingResult::U8(buf)) => {
            ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        (ColorType::RGB(8), DecodingResult::U8(buf)) => {
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        _ => {
            return Err(OcrError::CodecError(format!(
                "Unsupported TIFF color type: {:?}",
                color
            )))
        }
    };

    img.map(|img| DecodedImage::from_dynamic(&img))
        .ok_or_else(|| OcrError::CodecError("TIFF page data shorter than its geometry".to_string()))
}

/// Expand packed 1-bit rows to 8-bit luma, set bits white
fn unpack_bilevel(packed: &[u8], width: u32, height: u32) -> Vec<u8> {
    let stride = crate::frame::row_stride(width, 1);
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in packed.chunks(stride).take(height as usize) {
        for x in 0..width as usize {
            let bit = row.get(x / 8).map_or(0, |byte| (byte >> (7 - x % 8)) & 1);
            out.push(if bit == 1 { 255 } else { 0 });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_decode_png_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let mut img = GrayImage::new(8, 4);
        img.put_pixel(1, 1, Luma([200]));
        img.save(&path).unwrap();

        let pages = ImageCrateCodec.decode_file(&path).unwrap();
        assert_eq!(pages.len(), 1);
        let page = pages[0].as_ref().unwrap();
        assert_eq!((page.width, page.height, page.bits_per_pixel), (8, 4, 8));
        assert!(page.frame().is_ok());
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = ImageCrateCodec.decode_file(&path).unwrap_err();
        assert!(matches!(err, OcrError::CodecError(_)));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(ImageCrateCodec
            .decode_file(Path::new("/nonexistent/scan.png"))
            .is_err());
    }

    #[test]
    fn test_multi_page_tiff_yields_every_page() {
        use tiff::encoder::{colortype, TiffEncoder};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        {
            let mut file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(&mut file).unwrap();
            encoder
                .write_image::<colortype::Gray8>(4, 2, &[10u8; 8])
                .unwrap();
            encoder
                .write_image::<colortype::Gray8>(3, 1, &[200u8; 3])
                .unwrap();
        }

        let pages = ImageCrateCodec.decode_file(&path).unwrap();
        assert_eq!(pages.len(), 2);

        let first = pages[0].as_ref().unwrap();
        assert_eq!((first.width, first.height, first.bits_per_pixel), (4, 2, 8));
        assert_eq!(first.pixels, vec![10u8; 8]);

        let second = pages[1].as_ref().unwrap();
        assert_eq!((second.width, second.height), (3, 1));
        assert_eq!(second.pixels, vec![200u8; 3]);
    }

    #[test]
    fn test_unpack_bilevel_rows() {
        // 10 pixels wide, two bytes per row
        let packed = [0b1010_0000, 0b0100_0000, 0b0000_0000, 0b1100_0000];
        let pixels = unpack_bilevel(&packed, 10, 2);

        assert_eq!(pixels.len(), 20);
        assert_eq!(&pixels[..4], &[255, 0, 255, 0]);
        assert_eq!(pixels[9], 255);
        assert_eq!(&pixels[10..18], &[0; 8]);
        assert_eq!(&pixels[18..], &[255, 255]);
    }
}
