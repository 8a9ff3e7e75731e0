//! Fixtures shared by unit tests.

use image::{Rgb, RgbImage};

use crate::sampler::encode_jpeg;

pub fn solid_image(width: u32, height: u32, shade: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([shade, shade / 2, 255 - shade]))
}

pub fn tiny_jpeg(shade: u8) -> Vec<u8> {
    encode_jpeg(&solid_image(8, 8, shade), 80).expect("encode test jpeg")
}
