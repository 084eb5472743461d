//! Offline capabilities built on the `image` crate
//!
//! These stand in for remote services when running without network access:
//! - Grayscale: drops color, a cheap document preprocessing step
//! - ContrastBoost: stretches contrast for legibility
//! - ImageSummary: text report with dimensions and an RGB histogram digest
//!
//! Decoding and re-encoding are CPU-bound, so each call runs on the
//! blocking pool like the editor's preview generation.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::capability::{ImageCapability, TextCapability};
use crate::error::CapabilityError;
use crate::payload::{Payload, PayloadCodec};

/// Decode a payload into pixels
fn load(input: &Payload) -> Result<DynamicImage, CapabilityError> {
    let decoded =
        PayloadCodec::decode(input).map_err(|e| CapabilityError::InvalidOutput(e.to_string()))?;
    image::load_from_memory(&decoded.bytes)
        .map_err(|e| CapabilityError::InvalidOutput(format!("cannot decode image: {}", e)))
}

/// Encode pixels back into a PNG payload
fn store(img: &DynamicImage) -> Result<Payload, CapabilityError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CapabilityError::Unavailable(format!("cannot encode PNG: {}", e)))?;
    Ok(PayloadCodec::encode(
        ImageFormat::Png.to_mime_type(),
        &out.into_inner(),
    ))
}

/// Run a pixel operation on the blocking pool
async fn on_pixels<T, F>(input: &Payload, op: F) -> Result<T, CapabilityError>
where
    T: Send + 'static,
    F: FnOnce(DynamicImage) -> Result<T, CapabilityError> + Send + 'static,
{
    let input = input.clone();
    tokio::task::spawn_blocking(move || op(load(&input)?))
        .await
        .map_err(|e| CapabilityError::Unavailable(format!("Task join error: {}", e)))?
}

#[derive(Debug, Default)]
pub struct Grayscale;

#[async_trait]
impl ImageCapability for Grayscale {
    fn name(&self) -> &str {
        "local-grayscale"
    }

    async fn transform(&self, input: &Payload, _instruction: &str) -> Result<Payload, CapabilityError> {
        on_pixels(input, |img| store(&DynamicImage::ImageLuma8(img.to_luma8()))).await
    }
}

/// Contrast adjustment in percent (-100.0 to +100.0)
#[derive(Debug)]
pub struct ContrastBoost {
    pub amount: f32,
}

impl Default for ContrastBoost {
    fn default() -> Self {
        Self { amount: 35.0 }
    }
}

#[async_trait]
impl ImageCapability for ContrastBoost {
    fn name(&self) -> &str {
        "local-contrast"
    }

    async fn transform(&self, input: &Payload, _instruction: &str) -> Result<Payload, CapabilityError> {
        let amount = self.amount.clamp(-100.0, 100.0);
        on_pixels(input, move |img| store(&img.adjust_contrast(amount))).await
    }
}

/// RGB histogram: [R[256], G[256], B[256]]
fn histogram(img: &DynamicImage) -> [[u32; 256]; 3] {
    let mut data = [[0u32; 256]; 3];
    for pixel in img.to_rgb8().pixels() {
        for (channel, &value) in pixel.0.iter().enumerate() {
            data[channel][value as usize] += 1;
        }
    }
    data
}

fn channel_mean(bins: &[u32; 256]) -> f64 {
    let (sum, count) = bins
        .iter()
        .enumerate()
        .fold((0u64, 0u64), |(sum, count), (value, &n)| {
            (sum + value as u64 * n as u64, count + n as u64)
        });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Describes the image in plain text; the instruction is ignored
#[derive(Debug, Default)]
pub struct ImageSummary;

#[async_trait]
impl TextCapability for ImageSummary {
    fn name(&self) -> &str {
        "local-summary"
    }

    async fn extract(&self, input: &Payload, _instruction: &str) -> Result<String, CapabilityError> {
        on_pixels(input, |img| {
            let data = histogram(&img);
            let total = (img.width() as u64 * img.height() as u64).max(1) as f64;

            // Shadows and highlights measured on the green channel (closest to luminance)
            let dark: u32 = data[1][..32].iter().sum();
            let bright: u32 = data[1][224..].iter().sum();

            Ok(format!(
                "{}x{} px\nmean R {:.1} G {:.1} B {:.1}\nshadows {:.1}% highlights {:.1}%",
                img.width(),
                img.height(),
                channel_mean(&data[0]),
                channel_mean(&data[1]),
                channel_mean(&data[2]),
                dark as f64 / total * 100.0,
                bright as f64 / total * 100.0,
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample() -> Payload {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([200, 40, 40]));
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        store(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[tokio::test]
    async fn test_grayscale_output_is_single_channel_png() {
        let out = Grayscale.transform(&sample(), "").await.unwrap();
        assert_eq!(out.mime_type(), "image/png");
        let img = load(&out).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
        assert_eq!(img.color(), image::ColorType::L8);
    }

    #[tokio::test]
    async fn test_contrast_keeps_dimensions() {
        let out = ContrastBoost::default().transform(&sample(), "").await.unwrap();
        let img = load(&out).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
    }

    #[tokio::test]
    async fn test_summary_reports_dimensions() {
        let text = ImageSummary.extract(&sample(), "").await.unwrap();
        assert!(text.starts_with("4x2 px"));
        assert!(text.contains("mean R 175.0"));
        assert!(text.contains("shadows 12.5%"));
    }

    #[tokio::test]
    async fn test_undecodable_input_is_invalid() {
        let garbage = PayloadCodec::encode("image/png", b"not a png");
        let err = Grayscale.transform(&garbage, "").await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidOutput(_)));
    }
}
