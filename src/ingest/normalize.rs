use anyhow::{anyhow, Result};

/// Pixel layouts a camera may hand us before normalisation to RGB24.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Rgb24,
    Bgr24,
    Yuyv,
}

impl SourceFormat {
    fn expected_len(self, width: u32, height: u32) -> Result<usize> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let bytes_per_pixel = match self {
            SourceFormat::Rgb24 | SourceFormat::Bgr24 => 3,
            SourceFormat::Yuyv => 2,
        };
        pixels
            .checked_mul(bytes_per_pixel)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))
    }
}

/// Convert `pixels` into packed RGB24, writing into `out` (which must hold `width * height * 3` bytes).
///
/// Bytes past one full frame (driver buffer padding) are ignored.
pub fn normalize_into(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: SourceFormat,
    out: &mut [u8],
) -> Result<()> {
    let expected = format.expected_len(width, height)?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {} bytes, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    let pixels = &pixels[..expected];
    let out_len = width as usize * height as usize * 3;
    if out.len() != out_len {
        return Err(anyhow!(
            "RGB output length mismatch: expected {}, got {}",
            out_len,
            out.len()
        ));
    }

    match format {
        SourceFormat::Rgb24 => out.copy_from_slice(pixels),
        SourceFormat::Bgr24 => {
            for (dst, src) in out.chunks_exact_mut(3).zip(pixels.chunks_exact(3)) {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            }
        }
        SourceFormat::Yuyv => yuyv_to_rgb(pixels, out),
    }
    Ok(())
}

// Each 4-byte group Y0 U Y1 V encodes two horizontally adjacent pixels.
fn yuyv_to_rgb(pixels: &[u8], out: &mut [u8]) {
    for (dst, src) in out.chunks_exact_mut(6).zip(pixels.chunks_exact(4)) {
        let u = src[1] as f32 - 128.0;
        let v = src[3] as f32 - 128.0;
        for (half, y) in [src[0], src[2]].into_iter().enumerate() {
            let y = y as f32;
            let offset = half * 3;
            dst[offset] = clamp_to_u8(y + 1.402_f32 * v);
            dst[offset + 1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
            dst[offset + 2] = clamp_to_u8(y + 1.772_f32 * u);
        }
    }
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        let yuyv = vec![128u8; 2 * 2 * 2];
        let mut rgb = vec![0u8; 12];
        normalize_into(&yuyv, 2, 2, SourceFormat::Yuyv, &mut rgb)?;
        assert_eq!(rgb, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn bgr_conversion_swaps_channels() -> Result<()> {
        let bgr = [1u8, 2, 3, 4, 5, 6];
        let mut rgb = [0u8; 6];
        normalize_into(&bgr, 2, 1, SourceFormat::Bgr24, &mut rgb)?;
        assert_eq!(rgb, [3, 2, 1, 6, 5, 4]);
        Ok(())
    }

    #[test]
    fn trailing_padding_is_ignored() -> Result<()> {
        let mut bgr = vec![9u8, 8, 7];
        bgr.extend_from_slice(&[0u8; 5]);
        let mut rgb = [0u8; 3];
        normalize_into(&bgr, 1, 1, SourceFormat::Bgr24, &mut rgb)?;
        assert_eq!(rgb, [7, 8, 9]);
        Ok(())
    }

    #[test]
    fn rgb_pass_through_validates_length() {
        let pixels = vec![1u8; 8];
        let mut rgb = vec![0u8; 9];
        assert!(normalize_into(&pixels, 1, 3, SourceFormat::Rgb24, &mut rgb).is_err());

        let pixels = vec![1u8; 9];
        normalize_into(&pixels, 1, 3, SourceFormat::Rgb24, &mut rgb).unwrap();
        assert_eq!(rgb, pixels);
    }
}
