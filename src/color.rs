use serde::{Deserialize, Serialize};

const GAMMA: f64 = 2.8;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PixelColor {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Gamma corrects every channel.
    pub fn gamma_corrected(self) -> Self {
        Self::new(gamma(self.r), gamma(self.g), gamma(self.b))
    }

    /// Scales every channel by `brightness / 255`, rounded.
    pub fn scaled(self, brightness: u8) -> Self {
        Self::new(
            scale(self.r, brightness),
            scale(self.g, brightness),
            scale(self.b, brightness),
        )
    }
}

/// Power-law remapping compensating for the non-linear LED response.
pub fn gamma(value: u8) -> u8 {
    let normalized = f64::from(value) / 255.0;
    (normalized.powf(GAMMA) * 255.0).round() as u8
}

pub fn scale(value: u8, brightness: u8) -> u8 {
    // Exact rounding: value * brightness / 255 never lands on .5.
    ((u32::from(value) * u32::from(brightness) + 127) / 255) as u8
}

/// Maps a hue position to a color, cycling red -> green -> blue -> red.
pub fn wheel(position: u8) -> PixelColor {
    let position = 255 - position;

    if position < 85 {
        return PixelColor::new(255 - position * 3, 0, position * 3);
    }

    if position < 170 {
        let position = position - 85;
        return PixelColor::new(0, position * 3, 255 - position * 3);
    }

    let position = position - 170;
    PixelColor::new(position * 3, 255 - position * 3, 0)
}
