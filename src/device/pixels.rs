use crate::color::PixelColor;

/// The colors currently shown by the strip.
///
/// Values are stored gamma corrected. Correction happens exactly once, when a
/// color is written; reads never correct again. Brightness is only applied to
/// snapshots.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    pixels: Vec<PixelColor>,
}

impl PixelBuffer {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            pixels: vec![PixelColor::BLACK; pixel_count],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Writes a raw color; out of range indices are ignored.
    pub fn set(&mut self, index: usize, color: PixelColor) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color.gamma_corrected();
        }
    }

    pub fn fill(&mut self, color: PixelColor) {
        let corrected = color.gamma_corrected();
        self.pixels.fill(corrected);
    }

    pub fn clear(&mut self) {
        self.pixels.fill(PixelColor::BLACK);
    }

    /// Stored value at `index`, gamma corrected and unscaled.
    pub fn get(&self, index: usize) -> Option<PixelColor> {
        self.pixels.get(index).copied()
    }

    pub fn as_slice(&self) -> &[PixelColor] {
        &self.pixels
    }

    pub fn snapshot(&self, brightness: u8) -> Vec<PixelColor> {
        self.pixels
            .iter()
            .map(|pixel| pixel.scaled(brightness))
            .collect()
    }
}
