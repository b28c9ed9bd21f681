//! Image data carried by PutImage and GetImage
//!
//! Layout follows the setup block: LSBFirst bit and byte order, scanlines
//! padded to 32 bits, and 32 bits per pixel for every depth above 1.

use super::errors::{X11Error, X11Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageFormat {
    Bitmap = 0,
    XYPixmap = 1,
    ZPixmap = 2,
}

impl ImageFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageFormat::Bitmap),
            1 => Some(ImageFormat::XYPixmap),
            2 => Some(ImageFormat::ZPixmap),
            _ => None,
        }
    }
}

/// Bytes in one scanline of `bits` bits, padded to 32
pub fn scanline_bytes(bits: usize) -> usize {
    bits.div_ceil(32) * 4
}

/// Pixel bits a drawable of `depth` can hold
pub fn depth_mask(depth: u8) -> u32 {
    if depth >= 32 {
        u32::MAX
    } else {
        (1u32 << depth) - 1
    }
}

/// Size of an image with this shape
pub fn image_size(format: ImageFormat, depth: u8, width: u16, height: u16, left_pad: u8) -> usize {
    let (width, height) = (width as usize, height as usize);
    let xy_row = scanline_bytes(left_pad as usize + width);
    match format {
        ImageFormat::Bitmap => xy_row * height,
        ImageFormat::XYPixmap => xy_row * height * depth as usize,
        ImageFormat::ZPixmap if depth == 1 => scanline_bytes(width) * height,
        ImageFormat::ZPixmap => width * 4 * height,
    }
}

fn bit(row: &[u8], x: usize) -> bool {
    row[x / 8] >> (x % 8) & 1 != 0
}

fn set_bit(row: &mut [u8], x: usize) {
    row[x / 8] |= 1 << (x % 8);
}

/// Decode image data to one pixel per position, row-major. Bitmap images
/// decode to 1 for set bits and 0 for clear ones.
pub fn decode_image(
    format: ImageFormat,
    depth: u8,
    width: u16,
    height: u16,
    left_pad: u8,
    data: &[u8],
) -> X11Result<Vec<u32>> {
    let size = image_size(format, depth, width, height, left_pad);
    if data.len() < size {
        return Err(X11Error::bad_length(data.len() as u32));
    }
    let (w, h) = (width as usize, height as usize);
    let mut pixels = vec![0u32; w * h];
    match format {
        ImageFormat::Bitmap | ImageFormat::XYPixmap => {
            let stride = scanline_bytes(left_pad as usize + w);
            let planes = if format == ImageFormat::Bitmap { 1 } else { depth as usize };
            for plane in 0..planes {
                // Most significant plane first
                let value = 1u32 << (planes - 1 - plane);
                let plane_data = &data[plane * stride * h..];
                for y in 0..h {
                    let row = &plane_data[y * stride..(y + 1) * stride];
                    for x in 0..w {
                        if bit(row, left_pad as usize + x) {
                            pixels[y * w + x] |= value;
                        }
                    }
                }
            }
        }
        ImageFormat::ZPixmap if depth == 1 => {
            let stride = scanline_bytes(w);
            for y in 0..h {
                let row = &data[y * stride..(y + 1) * stride];
                for x in 0..w {
                    pixels[y * w + x] = bit(row, x) as u32;
                }
            }
        }
        ImageFormat::ZPixmap => {
            let mask = depth_mask(depth);
            for (pixel, bytes) in pixels.iter_mut().zip(data.chunks_exact(4)) {
                *pixel = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & mask;
            }
        }
    }
    Ok(pixels)
}

/// Encode row-major pixels for a GetImage reply. XYPixmap carries only the
/// planes selected by `plane_mask`, most significant first.
pub fn encode_image(
    format: ImageFormat,
    depth: u8,
    width: u16,
    height: u16,
    pixels: &[u32],
    plane_mask: u32,
) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mask = plane_mask & depth_mask(depth);
    match format {
        ImageFormat::ZPixmap if depth > 1 => pixels
            .iter()
            .take(w * h)
            .flat_map(|p| (p & mask).to_le_bytes())
            .collect(),
        ImageFormat::ZPixmap => bitmap_rows(w, h, |i| pixels[i] & mask & 1 != 0),
        ImageFormat::Bitmap | ImageFormat::XYPixmap => (0..depth.min(32) as u32)
            .rev()
            .filter(|plane| mask & (1 << plane) != 0)
            .flat_map(|plane| bitmap_rows(w, h, |i| pixels[i] >> plane & 1 != 0))
            .collect(),
    }
}

fn bitmap_rows(w: usize, h: usize, lit: impl Fn(usize) -> bool) -> Vec<u8> {
    let stride = scanline_bytes(w);
    let mut out = vec![0u8; stride * h];
    for y in 0..h {
        let row = &mut out[y * stride..(y + 1) * stride];
        for x in 0..w {
            if lit(y * w + x) {
                set_bit(row, x);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorCode;

    #[test]
    fn test_bitmap_rows_are_lsb_first_and_padded() {
        // 3x2 bitmap: rows 0b101 and 0b010, each padded to 4 bytes
        let data = [0b101, 0, 0, 0, 0b010, 0, 0, 0];
        let pixels = decode_image(ImageFormat::Bitmap, 1, 3, 2, 0, &data).unwrap();
        assert_eq!(pixels, vec![1, 0, 1, 0, 1, 0]);
        assert_eq!(encode_image(ImageFormat::ZPixmap, 1, 3, 2, &pixels, 1), data);
    }

    #[test]
    fn test_left_pad_skips_leading_bits() {
        let data = [0b1100, 0, 0, 0];
        let pixels = decode_image(ImageFormat::Bitmap, 1, 2, 1, 2, &data).unwrap();
        assert_eq!(pixels, vec![1, 1]);
    }

    #[test]
    fn test_zpixmap_depth_24_uses_four_bytes() {
        let data = [0x33, 0x22, 0x11, 0xFF, 0x01, 0, 0, 0];
        let pixels = decode_image(ImageFormat::ZPixmap, 24, 2, 1, 0, &data).unwrap();
        assert_eq!(pixels, vec![0x112233, 1]);
        let encoded = encode_image(ImageFormat::ZPixmap, 24, 2, 1, &pixels, 0xFF00FF);
        assert_eq!(encoded, vec![0x33, 0, 0x11, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_xy_pixmap_planes_most_significant_first() {
        // Depth 2, one pixel of value 2: plane 1 set, plane 0 clear
        let data = [1, 0, 0, 0, 0, 0, 0, 0];
        let pixels = decode_image(ImageFormat::XYPixmap, 2, 1, 1, 0, &data).unwrap();
        assert_eq!(pixels, vec![2]);
        assert_eq!(encode_image(ImageFormat::XYPixmap, 2, 1, 1, &pixels, 0b11), data);
        // Only the low plane requested
        assert_eq!(encode_image(ImageFormat::XYPixmap, 2, 1, 1, &pixels, 0b01), [0; 4]);
    }

    #[test]
    fn test_short_data_is_length_error() {
        let err = decode_image(ImageFormat::ZPixmap, 24, 4, 4, 0, &[0; 60]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Length);
        assert_eq!(image_size(ImageFormat::ZPixmap, 24, 4, 4, 0), 64);
        assert_eq!(image_size(ImageFormat::XYPixmap, 24, 4, 4, 0), 4 * 4 * 24);
    }
}
