//! Whole-tile payloads stored as image-container streams (PNG, JPEG, GIF,
//! WEBP) or CCITT bi-level streams.
//!
//! Encoders take the raster's in-memory buffer (one byte per packed
//! sample, host byte order for 16-bit samples) and decoders hand back
//! the same layout at full resolution. Palette and packed samples travel
//! as raw index values, never as expanded colors.

use std::borrow::Cow;
use std::io::Cursor;

use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use tracing::debug;

use crate::ccitt;
use crate::compression::Compression;
use crate::error::{Rl2Error, Rl2Result};
use crate::palette::Palette;
use crate::sample::{PixelSpec, PixelType, SampleType};

/// Encode a full-resolution tile buffer with a container codec
pub(crate) fn encode(
    compression: Compression,
    spec: &PixelSpec,
    width: u32,
    height: u32,
    buffer: &[u8],
    palette: Option<&Palette>,
    quality: u8,
) -> Rl2Result<Vec<u8>> {
    compression.check_compatible(spec)?;
    let (w, h) = (width as usize, height as usize);
    match compression {
        Compression::Png => encode_png(spec, width, height, buffer),
        Compression::Jpeg => encode_jpeg(spec, width, height, buffer, quality),
        Compression::Gif => encode_gif(spec, width, height, buffer, palette),
        Compression::LossyWebp | Compression::LosslessWebp => {
            let rgb = match spec.pixel_type() {
                PixelType::Grayscale => buffer.iter().flat_map(|&v| [v, v, v]).collect(),
                _ => buffer.to_vec(),
            };
            let encoder = webp::Encoder::from_rgb(&rgb, width, height);
            let memory = if compression == Compression::LosslessWebp {
                encoder.encode_lossless()
            } else {
                encoder.encode(f32::from(quality))
            };
            Ok(memory.to_vec())
        }
        Compression::CcittFax3 => ccitt::encode_fax3(buffer, w, h),
        Compression::CcittFax4 => ccitt::encode_fax4(buffer, w, h),
        other => Err(Rl2Error::unsupported(format!("{other:?} is not a container codec"))),
    }
}

/// Decode a container payload back into a full-resolution tile buffer
pub(crate) fn decode(
    compression: Compression,
    spec: &PixelSpec,
    width: u32,
    height: u32,
    payload: &[u8],
) -> Rl2Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let buffer = match compression {
        Compression::Png => decode_image(payload, ImageFormat::Png, spec, width, height)?,
        Compression::Jpeg => decode_image(payload, ImageFormat::Jpeg, spec, width, height)?,
        Compression::Gif => decode_gif(payload, width, height)?,
        Compression::LossyWebp | Compression::LosslessWebp => {
            decode_webp(payload, spec, width, height)?
        }
        Compression::CcittFax3 => ccitt::decode_fax3(payload, w, h)?,
        Compression::CcittFax4 => ccitt::decode_fax4(payload, w, h)?,
        other => {
            return Err(Rl2Error::unsupported(format!("{other:?} is not a container codec")));
        }
    };

    let expected = spec.buffer_size(w, h);
    if buffer.len() != expected {
        return Err(Rl2Error::malformed(format!(
            "{compression:?} payload decodes to {} bytes, {w}x{h} {spec:?} needs {expected}",
            buffer.len()
        )));
    }
    if let Some(max) = spec.sample_type().packed_max()
        && buffer.iter().any(|&v| v > max)
    {
        return Err(Rl2Error::malformed(format!(
            "{compression:?} payload holds samples wider than {:?}",
            spec.sample_type()
        )));
    }
    Ok(buffer)
}

fn image_error(codec: &'static str) -> impl Fn(image::ImageError) -> Rl2Error {
    move |e| Rl2Error::codec(format!("{codec}: {e}"))
}

fn png_color_type(spec: &PixelSpec) -> ExtendedColorType {
    match (spec.pixel_type(), spec.sample_type()) {
        (PixelType::Rgb, SampleType::UInt16) => ExtendedColorType::Rgb16,
        (PixelType::Rgb, _) => ExtendedColorType::Rgb8,
        (_, SampleType::UInt16) => ExtendedColorType::L16,
        _ => ExtendedColorType::L8,
    }
}

fn encode_png(spec: &PixelSpec, width: u32, height: u32, buffer: &[u8]) -> Rl2Result<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(buffer, width, height, png_color_type(spec))
        .map_err(image_error("PNG"))?;
    Ok(out)
}

fn encode_jpeg(
    spec: &PixelSpec,
    width: u32,
    height: u32,
    buffer: &[u8],
    quality: u8,
) -> Rl2Result<Vec<u8>> {
    let mut out = Vec::new();
    let color = if spec.pixel_type() == PixelType::Rgb {
        ExtendedColorType::Rgb8
    } else {
        ExtendedColorType::L8
    };
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.max(1))
        .write_image(buffer, width, height, color)
        .map_err(image_error("JPEG"))?;
    Ok(out)
}

fn decode_image(
    payload: &[u8],
    format: ImageFormat,
    spec: &PixelSpec,
    width: u32,
    height: u32,
) -> Rl2Result<Vec<u8>> {
    let codec = if format == ImageFormat::Png { "PNG" } else { "JPEG" };
    let image = image::ImageReader::with_format(Cursor::new(payload), format)
        .decode()
        .map_err(image_error(codec))?;
    if image.width() != width || image.height() != height {
        return Err(Rl2Error::malformed(format!(
            "{codec} payload is {}x{}, header declares {width}x{height}",
            image.width(),
            image.height()
        )));
    }

    let wide = spec.sample_type() == SampleType::UInt16;
    let rgb = spec.pixel_type() == PixelType::Rgb;
    let raw = match (image, rgb, wide) {
        (DynamicImage::ImageLuma8(gray), false, false) => gray.into_raw(),
        (DynamicImage::ImageRgb8(color), true, false) => color.into_raw(),
        (DynamicImage::ImageLuma16(gray), false, true) => u16_to_ne(&gray.into_raw()),
        (DynamicImage::ImageRgb16(color), true, true) => u16_to_ne(&color.into_raw()),
        (other, false, false) => {
            debug!(color = ?other.color(), "converting {codec} payload to 8-bit gray");
            other.to_luma8().into_raw()
        }
        (other, true, false) => {
            debug!(color = ?other.color(), "converting {codec} payload to 8-bit RGB");
            other.to_rgb8().into_raw()
        }
        (other, _, true) => {
            return Err(Rl2Error::malformed(format!(
                "{codec} payload of {:?} where 16-bit samples are expected",
                other.color()
            )));
        }
    };
    Ok(raw)
}

fn u16_to_ne(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn encode_gif(
    spec: &PixelSpec,
    width: u32,
    height: u32,
    buffer: &[u8],
    palette: Option<&Palette>,
) -> Rl2Result<Vec<u8>> {
    let (w, h) = gif_dimensions(width, height)?;
    let global: Vec<u8> = match (spec.pixel_type(), palette) {
        (PixelType::Palette, Some(palette)) => palette
            .entries()
            .iter()
            .flat_map(|e| [e.red, e.green, e.blue])
            .collect(),
        _ => (0..=255u8).flat_map(|v| [v, v, v]).collect(),
    };

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, w, h, &global)
            .map_err(|e| Rl2Error::codec(format!("GIF: {e}")))?;
        let frame = gif::Frame {
            width: w,
            height: h,
            buffer: Cow::Borrowed(buffer),
            ..gif::Frame::default()
        };
        encoder
            .write_frame(&frame)
            .map_err(|e| Rl2Error::codec(format!("GIF: {e}")))?;
    }
    Ok(out)
}

fn gif_dimensions(width: u32, height: u32) -> Rl2Result<(u16, u16)> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(Rl2Error::unsupported(format!("GIF cannot hold {width}x{height} pixels"))),
    }
}

fn decode_gif(payload: &[u8], width: u32, height: u32) -> Rl2Result<Vec<u8>> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options
        .read_info(payload)
        .map_err(|e| Rl2Error::codec(format!("GIF: {e}")))?;
    let frame = decoder
        .read_next_frame()
        .map_err(|e| Rl2Error::codec(format!("GIF: {e}")))?
        .ok_or_else(|| Rl2Error::malformed("GIF payload holds no frame"))?;
    if u32::from(frame.width) != width || u32::from(frame.height) != height {
        return Err(Rl2Error::malformed(format!(
            "GIF frame is {}x{}, header declares {width}x{height}",
            frame.width, frame.height
        )));
    }
    Ok(frame.buffer.to_vec())
}

fn decode_webp(payload: &[u8], spec: &PixelSpec, width: u32, height: u32) -> Rl2Result<Vec<u8>> {
    let image = webp::Decoder::new(payload)
        .decode()
        .ok_or_else(|| Rl2Error::codec("WEBP: payload cannot be decoded"))?;
    if image.width() != width || image.height() != height {
        return Err(Rl2Error::malformed(format!(
            "WEBP payload is {}x{}, header declares {width}x{height}",
            image.width(),
            image.height()
        )));
    }
    let channels = if image.is_alpha() { 4 } else { 3 };
    let pixels = image.chunks_exact(channels);
    Ok(match spec.pixel_type() {
        PixelType::Grayscale => pixels.map(|px| px[0]).collect(),
        _ => pixels.flat_map(|px| [px[0], px[1], px[2]]).collect(),
    })
}
