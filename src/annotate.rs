//! Draws detection boxes onto images.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::Detection;

const BOX_THICKNESS: i32 = 3;
const LABEL_SCALE: f32 = 18.0;

const PALETTE: &[[u8; 3]] = &[
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
];

/// Box colour for a class index.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Renders detections onto a copy of the input image.
///
/// Without a font only the boxes are drawn.
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font used for `label 0.81` captions.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(&self, image: &DynamicImage, detections: &[Detection]) -> DynamicImage {
        let mut canvas = image.to_rgb8();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        DynamicImage::ImageRgb8(canvas)
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let (width, height) = canvas.dimensions();
        let x1 = detection.bbox.x1.max(0.0).min(width as f32) as i32;
        let y1 = detection.bbox.y1.max(0.0).min(height as f32) as i32;
        let x2 = detection.bbox.x2.max(0.0).min(width as f32) as i32;
        let y2 = detection.bbox.y2.max(0.0).min(height as f32) as i32;
        if x2 <= x1 || y2 <= y1 {
            return;
        }
        let color = class_color(detection.class_id);

        for offset in 0..BOX_THICKNESS {
            let w = (x2 - x1) - 2 * offset;
            let h = (y2 - y1) - 2 * offset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + offset, y1 + offset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        let Some(font) = &self.font else {
            return;
        };
        let caption = format!("{} {:.2}", detection.label, detection.confidence);
        let scale = PxScale::from(LABEL_SCALE);
        let (text_w, text_h) = text_size(scale, font, &caption);
        if text_w == 0 || text_h == 0 {
            return;
        }
        let bg_h = text_h as i32 + 4;
        let bg_y = if y1 >= bg_h { y1 - bg_h } else { y1 };
        draw_filled_rect_mut(
            canvas,
            Rect::at(x1, bg_y).of_size(text_w + 4, bg_h as u32),
            color,
        );
        draw_text_mut(
            canvas,
            Rgb([255, 255, 255]),
            x1 + 2,
            bg_y + 2,
            scale,
            font,
            &caption,
        );
    }
}
