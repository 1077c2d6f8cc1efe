//! Captured pixel buffers and color primitives.
//!
//! A [`Frame`] is an owned RGB grid tagged with the screen rectangle it was
//! captured from and the instant of capture. Frames are never mutated after
//! construction; detection borrows [`Image`] views into them instead of
//! copying pixels.

use std::time::Instant;

use anyhow::{Context, Result};

use crate::ScreenRect;

/// Owned RGB frame (no alpha).
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<Color>,
    region: ScreenRect,
    captured_at: Instant,
}

impl Frame {
    /// Build a `Frame` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(region: ScreenRect, width: u32, bytes: &[u8]) -> Self {
        let width = width.max(1);
        let height = (bytes.len() / width as usize / 4) as u32;
        let data = bytes
            .chunks_exact(4)
            .take((width * height) as usize)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width,
            height,
            data,
            region,
            captured_at: Instant::now(),
        }
    }

    /// Synthesize a frame covering `region` by evaluating `f` at every pixel.
    pub fn from_fn(region: ScreenRect, mut f: impl FnMut(u32, u32) -> Color) -> Self {
        let (width, height) = (region.width, region.height);
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }

        Self {
            width,
            height,
            data,
            region,
            captured_at: Instant::now(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Screen rectangle this frame was captured from.
    #[inline]
    pub fn region(&self) -> ScreenRect {
        self.region
    }

    #[inline]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(x + y * self.width) as usize])
    }

    /// True if the (sub-pixel) position lies on this frame.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px.is_finite()
            && py.is_finite()
            && px >= 0.0
            && py >= 0.0
            && px < self.width as f32
            && py < self.height as f32
    }

    /// Copy out the part of this frame covering `region` (screen coordinates).
    ///
    /// The copy keeps this frame's capture instant. `None` when `region` is
    /// empty or not fully inside the frame.
    pub fn crop(&self, region: ScreenRect) -> Option<Frame> {
        if region.is_empty() || !self.region.contains_rect(&region) {
            return None;
        }
        let ox = (region.x - self.region.x) as u32;
        let oy = (region.y - self.region.y) as u32;
        // The pixel grid can be smaller than the region it was tagged with.
        if ox + region.width > self.width || oy + region.height > self.height {
            return None;
        }
        let mut data = Vec::with_capacity((region.width * region.height) as usize);
        for y in oy..oy + region.height {
            let start = (ox + y * self.width) as usize;
            data.extend_from_slice(&self.data[start..start + region.width as usize]);
        }
        Some(Frame {
            width: region.width,
            height: region.height,
            data,
            region,
            captured_at: self.captured_at,
        })
    }

    /// Create a borrowed view of this entire frame.
    pub fn as_image(&self) -> Image<'_> {
        Image {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Binary mask (255 = match) of the pixels falling in any of `ranges`.
    pub fn mask(&self, ranges: &[ColorRange]) -> image::GrayImage {
        let mut out = image::GrayImage::new(self.width, self.height);
        for (i, c) in self.data.iter().enumerate() {
            if ranges.iter().any(|r| r.contains(*c)) {
                let i = i as u32;
                out.put_pixel(i % self.width, i / self.width, image::Luma([255]));
            }
        }
        out
    }
}

// ----------

/// Borrowed image view into a [`Frame`].
#[derive(Clone, Copy)]
pub struct Image<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [Color],
}

impl<'a> Image<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[inline(always)]
    fn pixel(&self, x: u32, y: u32) -> &Color {
        &self.data[(x + y * self.true_width) as usize]
    }

    /// Iterate `(x, y, color)` relative to this view.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, Color)> + '_ {
        (self.y1..self.y2).flat_map(move |y| {
            (self.x1..self.x2).map(move |x| (x - self.x1, y - self.y1, *self.pixel(x, y)))
        })
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; (self.width() * self.height() * 3) as usize];
        let mut i = 0;
        for y in self.y1..self.y2 {
            for x in self.x1..self.x2 {
                let clr = self.pixel(x, y);
                bytes[i] = clr.r;
                bytes[i + 1] = clr.g;
                bytes[i + 2] = clr.b;
                i += 3;
            }
        }
        bytes
    }

    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let bytes = self.get_bytes();
        let img = image::RgbImage::from_raw(self.width(), self.height(), bytes)
            .context("RgbImage::from_raw failed")?;
        img.save_with_format(path, image::ImageFormat::Png)
            .context("save png")?;
        Ok(())
    }

    /// Create an arbitrary subimage (relative coordinates), clamped to this view.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }
}

/// Write `frame` as `./debug_<label>.png` when `MAPCUE_WRITE_IMAGE=1`.
pub fn debug_snapshot(frame: &Frame, label: &str) {
    if std::env::var("MAPCUE_WRITE_IMAGE").as_deref() != Ok("1") {
        return;
    }
    let name: String = label.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').take(40).collect();
    if let Err(err) = frame.as_image().save_png(format!("./debug_{name}.png")) {
        tracing::warn!(error = %err, "failed to write debug snapshot");
    }
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Largest per-channel absolute difference.
    #[inline]
    pub fn max_channel_diff(&self, other: Color) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
    }
}

/// A color plus a per-channel tolerance.
///
/// Matches any color whose channels are each within `tolerance` of `center`,
/// i.e. the box `center ± tolerance` clamped to `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ColorRange {
    pub center: Color,
    pub tolerance: u8,
}

impl ColorRange {
    pub const fn new(center: Color, tolerance: u8) -> Self {
        Self { center, tolerance }
    }

    #[inline]
    pub fn contains(&self, color: Color) -> bool {
        self.center.max_channel_diff(color) <= self.tolerance
    }

    /// 1.0 at the center, falling linearly towards 0.0 at the edge of the range.
    /// Colors outside the range score 0.0.
    pub fn closeness(&self, color: Color) -> f32 {
        let diff = self.center.max_channel_diff(color);
        if diff > self.tolerance {
            return 0.0;
        }
        1.0 - diff as f32 / (self.tolerance as f32 + 1.0)
    }
}
