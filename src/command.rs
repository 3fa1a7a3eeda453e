use crate::color::PixelColor;
use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OFF: u8 = 0;
pub const BRIGHTNESS: u8 = 1;
pub const PIXEL_COLOR: u8 = 2;
pub const FILL_COLOR: u8 = 3;
pub const FILL_PATTERN: u8 = 4;
pub const RAINBOW: u8 = 5;
pub const RAINBOW_CYCLE: u8 = 6;
pub const THEATER_CHASE: u8 = 7;
pub const RESET_INFO: u8 = 253;
pub const UPTIME: u8 = 254;
pub const READBACK: u8 = 255;

/// Revision of the command set spoken on the wire.
pub const PROTOCOL_VERSION: u8 = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandCategory {
    /// Affects all future rendering, e.g. brightness.
    Global,
    /// A selectable routine.
    Normal,
    /// Hidden diagnostic command, e.g. readback.
    System,
}

/// Frame delay in milliseconds, sent as a big endian `u16`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delay(u32);

impl Delay {
    pub const fn from_millis(milliseconds: u32) -> Self {
        Self(milliseconds)
    }

    pub fn as_millis(&self) -> u32 {
        self.0
    }

    /// Values of 65536 ms and above wrap around.
    pub fn to_bytes(self) -> [u8; 2] {
        let mut bytes = [0; 2];
        BigEndian::write_u16(&mut bytes, self.0 as u16);
        bytes
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u32::from(BigEndian::read_u16(&bytes)))
    }
}

impl From<Delay> for Duration {
    fn from(delay: Delay) -> Self {
        Duration::from_millis(u64::from(delay.0))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Off,
    Brightness {
        level: u8,
    },
    PixelColor {
        offset: u8,
        color: PixelColor,
    },
    FillColor {
        color: PixelColor,
    },
    FillPattern {
        colors: Vec<PixelColor>,
    },
    Rainbow {
        repeating: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<Delay>,
    },
    RainbowCycle {
        repeating: bool,
    },
    TheaterChase {
        repeating: bool,
        color: PixelColor,
    },
    ResetInfo,
    Uptime,
    Readback,
}

impl Command {
    pub fn id(&self) -> u8 {
        match self {
            Self::Off => OFF,
            Self::Brightness { .. } => BRIGHTNESS,
            Self::PixelColor { .. } => PIXEL_COLOR,
            Self::FillColor { .. } => FILL_COLOR,
            Self::FillPattern { .. } => FILL_PATTERN,
            Self::Rainbow { .. } => RAINBOW,
            Self::RainbowCycle { .. } => RAINBOW_CYCLE,
            Self::TheaterChase { .. } => THEATER_CHASE,
            Self::ResetInfo => RESET_INFO,
            Self::Uptime => UPTIME,
            Self::Readback => READBACK,
        }
    }

    pub fn category(&self) -> CommandCategory {
        match self {
            Self::Off | Self::Brightness { .. } => CommandCategory::Global,
            Self::PixelColor { .. }
            | Self::FillColor { .. }
            | Self::FillPattern { .. }
            | Self::Rainbow { .. }
            | Self::RainbowCycle { .. }
            | Self::TheaterChase { .. } => CommandCategory::Normal,
            Self::ResetInfo | Self::Uptime | Self::Readback => CommandCategory::System,
        }
    }

    /// Whether a user interface should offer this command.
    pub fn is_selectable(&self) -> bool {
        self.category() != CommandCategory::System
    }

    pub fn is_animated(&self) -> bool {
        matches!(
            self,
            Self::Rainbow { .. } | Self::RainbowCycle { .. } | Self::TheaterChase { .. }
        )
    }

    pub fn repeating(&self) -> bool {
        match self {
            Self::Rainbow { repeating, .. }
            | Self::RainbowCycle { repeating }
            | Self::TheaterChase { repeating, .. } => *repeating,
            _ => false,
        }
    }

    /// Raw payload bytes following the command byte.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Off | Self::ResetInfo | Self::Uptime | Self::Readback => vec![],
            Self::Brightness { level } => vec![*level],
            Self::PixelColor { offset, color } => {
                let mut payload = Vec::with_capacity(4);
                payload.push(*offset);
                payload.extend(color.to_bytes());
                payload
            }
            Self::FillColor { color } => color.to_bytes().to_vec(),
            Self::FillPattern { colors } => {
                let mut payload = Vec::with_capacity(1 + colors.len() * 3);
                payload.push(colors.len() as u8);

                for color in colors {
                    payload.extend(color.to_bytes());
                }

                payload
            }
            Self::Rainbow { repeating, delay } => {
                let mut payload = Vec::with_capacity(3);
                payload.push(u8::from(*repeating));

                if let Some(delay) = delay {
                    payload.extend(delay.to_bytes());
                }

                payload
            }
            Self::RainbowCycle { repeating } => vec![u8::from(*repeating)],
            Self::TheaterChase { repeating, color } => {
                let mut payload = Vec::with_capacity(4);
                payload.push(u8::from(*repeating));
                payload.extend(color.to_bytes());
                payload
            }
        }
    }
}
