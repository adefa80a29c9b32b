//! Luminance-plane transforms used by the decode strategies.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// A copy whose longest edge is `max_edge`. `None` if the image is already that small.
pub fn downscale(img: &GrayImage, max_edge: u32) -> Option<GrayImage> {
    let longest = img.width().max(img.height());
    if longest <= max_edge || max_edge == 0 {
        return None;
    }
    let w = ((img.width() as u64 * max_edge as u64) / longest as u64).max(1) as u32;
    let h = ((img.height() as u64 * max_edge as u64) / longest as u64).max(1) as u32;
    Some(imageops::resize(img, w, h, FilterType::Triangle))
}

pub fn bottom_half(img: &GrayImage) -> GrayImage {
    let top = img.height() / 2;
    imageops::crop_imm(img, 0, top, img.width(), img.height() - top).to_image()
}

pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    imageops::resize(
        img,
        img.width().saturating_mul(factor),
        img.height().saturating_mul(factor),
        FilterType::Triangle,
    )
}

pub fn rotate(img: &GrayImage, rotation: Rotation) -> GrayImage {
    match rotation {
        Rotation::Deg0 => img.clone(),
        Rotation::Deg90 => imageops::rotate90(img),
        Rotation::Deg180 => imageops::rotate180(img),
        Rotation::Deg270 => imageops::rotate270(img),
    }
}

/// Linear ×1.5 stretch about mid-grey.
pub fn enhance_contrast(img: &GrayImage) -> GrayImage {
    map_pixels(img, |p| ((p as i32 - 128) * 3 / 2 + 128).clamp(0, 255) as u8)
}

/// Dark-on-light binarization: black where luminance is below `threshold`.
pub fn threshold(img: &GrayImage, threshold: u8) -> GrayImage {
    map_pixels(img, |p| if p < threshold { 0 } else { 255 })
}

/// Light-on-dark binarization: black where luminance reaches `threshold`.
pub fn inverted_threshold(img: &GrayImage, threshold: u8) -> GrayImage {
    map_pixels(img, |p| if p >= threshold { 0 } else { 255 })
}

/// The centred region covering `percent` of each dimension.
pub fn center_crop(img: &GrayImage, percent: u32) -> GrayImage {
    let percent = percent.clamp(1, 100);
    let w = (img.width() * percent / 100).max(1).min(img.width());
    let h = (img.height() * percent / 100).max(1).min(img.height());
    let x = (img.width() - w) / 2;
    let y = (img.height() - h) / 2;
    imageops::crop_imm(img, x, y, w, h).to_image()
}

fn map_pixels(img: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| Luma([f(img.get_pixel(x, y)[0])]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| Luma([(x * 255 / (width - 1)) as u8]))
    }

    #[test]
    fn downscale_keeps_aspect_ratio() {
        let img = GrayImage::new(2000, 1000);
        let small = downscale(&img, 400).unwrap();
        assert_eq!((small.width(), small.height()), (400, 200));
    }

    #[test]
    fn downscale_skips_small_images() {
        assert!(downscale(&GrayImage::new(300, 200), 400).is_none());
    }

    #[test]
    fn bottom_half_of_odd_height() {
        let half = bottom_half(&GrayImage::new(10, 21));
        assert_eq!((half.width(), half.height()), (10, 11));
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let img = GrayImage::new(30, 10);
        assert_eq!(rotate(&img, Rotation::Deg90).dimensions(), (10, 30));
        assert_eq!(rotate(&img, Rotation::Deg180).dimensions(), (30, 10));
    }

    #[test]
    fn contrast_stretches_about_midpoint() {
        let img: GrayImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([[128u8, 200, 20][x as usize]]));
        let out = enhance_contrast(&img);
        assert_eq!(out.get_pixel(0, 0)[0], 128);
        assert_eq!(out.get_pixel(1, 0)[0], 236);
        assert_eq!(out.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn threshold_and_inverse_are_complementary() {
        let img = gradient(256, 1);
        let normal = threshold(&img, 128);
        let inverted = inverted_threshold(&img, 128);
        for x in 0..256 {
            let n = normal.get_pixel(x, 0)[0];
            let i = inverted.get_pixel(x, 0)[0];
            assert!(n == 0 || n == 255);
            assert_ne!(n, i);
        }
        assert_eq!(normal.get_pixel(127, 0)[0], 0);
        assert_eq!(normal.get_pixel(128, 0)[0], 255);
    }

    #[test]
    fn center_crop_seventy_percent() {
        let roi = center_crop(&GrayImage::new(100, 200), 70);
        assert_eq!(roi.dimensions(), (70, 140));
    }
}
