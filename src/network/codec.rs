use crate::color::PixelColor;
use crate::command::{self, Command, Delay};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(u8),
    #[error("invalid payload length {length} for command {command}")]
    InvalidLength { command: u8, length: usize },
    #[error("pixel offset {offset} out of range for {pixel_count} pixels")]
    PixelOutOfRange { offset: u8, pixel_count: usize },
    #[error("invalid pattern color count {count} for {pixel_count} pixels")]
    InvalidPatternCount { count: u8, pixel_count: usize },
}

/// A single command as it travels on the wire: one command byte followed by
/// its payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datagram {
    command: u8,
    payload: Vec<u8>,
}

impl Datagram {
    pub fn new(command: u8, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    pub fn len(&self) -> usize {
        1 + self.payload.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.push(self.command);
        bytes.extend(self.payload);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&command, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;

        Ok(Self::new(command, payload.to_vec()))
    }

    /// Validates the payload against the shape expected for the command byte.
    pub fn decode(&self, pixel_count: usize) -> Result<Command, DecodeError> {
        let invalid_length = || DecodeError::InvalidLength {
            command: self.command,
            length: self.payload.len(),
        };

        match (self.command, self.payload.as_slice()) {
            (command::OFF, []) => Ok(Command::Off),
            (command::BRIGHTNESS, &[level]) => Ok(Command::Brightness { level }),
            (command::PIXEL_COLOR, &[offset, r, g, b]) => {
                if usize::from(offset) >= pixel_count {
                    return Err(DecodeError::PixelOutOfRange {
                        offset,
                        pixel_count,
                    });
                }

                Ok(Command::PixelColor {
                    offset,
                    color: PixelColor::new(r, g, b),
                })
            }
            (command::FILL_COLOR, &[r, g, b]) => Ok(Command::FillColor {
                color: PixelColor::new(r, g, b),
            }),
            (command::FILL_PATTERN, [count, colors @ ..]) => {
                let count = *count;

                if colors.len() != usize::from(count) * 3 {
                    return Err(invalid_length());
                }

                if count == 0 || usize::from(count) > pixel_count {
                    return Err(DecodeError::InvalidPatternCount { count, pixel_count });
                }

                Ok(Command::FillPattern {
                    colors: colors
                        .chunks_exact(3)
                        .map(|chunk| PixelColor::new(chunk[0], chunk[1], chunk[2]))
                        .collect(),
                })
            }
            (command::RAINBOW, &[repeating]) => Ok(Command::Rainbow {
                repeating: repeating != 0,
                delay: None,
            }),
            (command::RAINBOW, &[repeating, high, low]) => Ok(Command::Rainbow {
                repeating: repeating != 0,
                delay: Some(Delay::from_bytes([high, low])),
            }),
            (command::RAINBOW_CYCLE, &[repeating]) => Ok(Command::RainbowCycle {
                repeating: repeating != 0,
            }),
            (command::THEATER_CHASE, &[repeating, r, g, b]) => Ok(Command::TheaterChase {
                repeating: repeating != 0,
                color: PixelColor::new(r, g, b),
            }),
            (command::RESET_INFO, _) => Ok(Command::ResetInfo),
            (command::UPTIME, _) => Ok(Command::Uptime),
            (command::READBACK, _) => Ok(Command::Readback),
            (
                command::OFF
                | command::BRIGHTNESS
                | command::PIXEL_COLOR
                | command::FILL_COLOR
                | command::FILL_PATTERN
                | command::RAINBOW
                | command::RAINBOW_CYCLE
                | command::THEATER_CHASE,
                _,
            ) => Err(invalid_length()),
            (code, _) => Err(DecodeError::UnknownCommand(code)),
        }
    }
}

impl From<&Command> for Datagram {
    fn from(command: &Command) -> Self {
        Self::new(command.id(), command.payload())
    }
}

pub fn encode(command: &Command) -> Vec<u8> {
    Datagram::from(command).into_bytes()
}

pub fn decode(bytes: &[u8], pixel_count: usize) -> Result<Command, DecodeError> {
    Datagram::from_bytes(bytes)?.decode(pixel_count)
}
