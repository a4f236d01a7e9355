//! Wavelet Hash (wHash) implementation.
//!
//! wHash works by:
//! 1. Resizing the image to 32x32 and converting to grayscale
//! 2. Applying one level of a 2-D Haar wavelet transform
//! 3. Keeping the low-frequency approximation (top-left quadrant)
//! 4. Resizing that approximation down to 8x8
//! 5. Thresholding each coefficient against the median
//!
//! The Haar step makes this hash more robust to minor recompression and
//! noise than aHash/dHash, at the cost of one extra transform pass.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// Wavelet Hash (wHash) implementation
pub struct WaveletHasher {
    /// Size of the final hash grid (width and height)
    hash_size: u32,
}

impl WaveletHasher {
    /// Create a new wHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    /// One level of a 2-D Haar transform over a square image, returning the
    /// low-frequency approximation subband (half the width/height of input).
    fn haar_approximation(gray: &GrayImage) -> GrayImage {
        let width = gray.width();
        let height = gray.height();
        let out_w = width / 2;
        let out_h = height / 2;

        let mut approx = ImageBuffer::new(out_w, out_h);
        for y in 0..out_h {
            for x in 0..out_w {
                let a = gray.get_pixel(2 * x, 2 * y)[0] as f32;
                let b = gray.get_pixel(2 * x + 1, 2 * y)[0] as f32;
                let c = gray.get_pixel(2 * x, 2 * y + 1)[0] as f32;
                let d = gray.get_pixel(2 * x + 1, 2 * y + 1)[0] as f32;
                // Haar low-pass coefficient: average of the 2x2 block.
                let value = ((a + b + c + d) / 4.0).round().clamp(0.0, 255.0) as u8;
                approx.put_pixel(x, y, Luma([value]));
            }
        }
        approx
    }

    fn median(values: &mut [u8]) -> u8 {
        values.sort_unstable();
        values[values.len() / 2]
    }
}

impl HashAlgorithm for WaveletHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        // Resize to 32x32 grayscale so one Haar level halves it to 16x16,
        // which we then resize down to the target hash grid.
        let gray32 = resize_to_grayscale(image, 32, 32)?;
        let approx16 = Self::haar_approximation(&gray32);
        let approx = DynamicImage::ImageLuma8(approx16);
        let small = resize_to_grayscale(&approx, self.hash_size, self.hash_size)?;

        let mut values: Vec<u8> = small.pixels().map(|p| p[0]).collect();
        let median = Self::median(&mut values);

        let mut hash_bytes = Vec::with_capacity((self.hash_size * self.hash_size / 8) as usize + 1);
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;

        for y in 0..self.hash_size {
            for x in 0..self.hash_size {
                let pixel = small.get_pixel(x, y)[0];
                if pixel > median {
                    current_byte |= 1 << (7 - bit_position);
                }

                bit_position += 1;
                if bit_position == 8 {
                    hash_bytes.push(current_byte);
                    current_byte = 0;
                    bit_position = 0;
                }
            }
        }

        if bit_position > 0 {
            hash_bytes.push(current_byte);
        }

        Ok(ImageHashValue::new(hash_bytes, HashAlgorithmKind::Wavelet))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Wavelet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::traits::PerceptualHash;
    use image::{ImageBuffer, Rgb};

    fn create_solid_image(r: u8, g: u8, b: u8) -> DynamicImage {
        let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([r, g, b]));
        DynamicImage::ImageRgb8(img)
    }

    fn create_checkerboard(size: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(size, size, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([255u8, 255, 255])
            } else {
                Rgb([0u8, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = WaveletHasher::new(8);
        let image = create_solid_image(128, 128, 128);

        let hash1 = hasher.hash_image(&image).unwrap();
        let hash2 = hasher.hash_image(&image).unwrap();

        assert_eq!(hash1.distance(&hash2), 0);
    }

    #[test]
    fn produces_64_bit_hash() {
        let hasher = WaveletHasher::new(8);
        let image = create_checkerboard(64);

        let hash = hasher.hash_image(&image).unwrap();
        assert_eq!(hash.as_bytes().len(), 8);
    }

    #[test]
    fn kind_returns_wavelet() {
        let hasher = WaveletHasher::new(8);
        assert_eq!(hasher.kind(), HashAlgorithmKind::Wavelet);
    }

    #[test]
    fn distinct_images_can_differ() {
        let hasher = WaveletHasher::new(8);
        let solid = create_solid_image(10, 10, 10);
        let checker = create_checkerboard(64);

        let hash_a = hasher.hash_image(&solid).unwrap();
        let hash_b = hasher.hash_image(&checker).unwrap();

        assert!(hash_a.distance(&hash_b) > 0);
    }
}
