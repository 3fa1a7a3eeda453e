use crate::command::{Command, CommandCategory};
use crate::config::AnimationConfig;
use crate::device::animation::{Animation, AnimationScheduler};
use crate::device::broadcast::{Broadcaster, StateSnapshot, Subscription};
use crate::device::pixels::PixelBuffer;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct LastCommand {
    id: u8,
    repeat: bool,
}

/// All mutable state of the device, owned by a single task.
#[derive(Debug)]
pub struct Device {
    pixels: PixelBuffer,
    brightness: u8,
    scheduler: AnimationScheduler,
    broadcaster: Broadcaster,
    last_command: LastCommand,
    config: AnimationConfig,
}

impl Device {
    pub fn new(pixel_count: usize, config: AnimationConfig, publish_interval: Duration) -> Self {
        let pixels = PixelBuffer::new(pixel_count);
        let brightness = u8::MAX;
        let last_command = LastCommand {
            id: 0,
            repeat: false,
        };
        let initial = snapshot_of(&pixels, brightness, last_command);

        Self {
            pixels,
            brightness,
            scheduler: AnimationScheduler::new(),
            broadcaster: Broadcaster::new(publish_interval, initial),
            last_command,
            config,
        }
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> StateSnapshot {
        snapshot_of(&self.pixels, self.brightness, self.last_command)
    }

    /// Applies a command. Any running animation is discarded first; commands
    /// with out of range fields leave the device untouched.
    pub fn dispatch(&mut self, command: Command, now: Instant) {
        if command.category() == CommandCategory::System {
            debug!(
                "diagnostic command {} is answered by the transport",
                command.id()
            );
            return;
        }

        if !self.fits(&command) {
            debug!("ignoring out of range command: {:?}", command);
            return;
        }

        self.scheduler.cancel();
        self.last_command = LastCommand {
            id: command.id(),
            repeat: command.repeating(),
        };

        if command.is_animated() {
            info!(
                "starting animation {} (repeating: {})",
                command.id(),
                command.repeating()
            );
        }

        match command {
            Command::Off => self.pixels.clear(),
            Command::Brightness { level } => {
                info!("brightness set to {}", level);
                self.brightness = level;
            }
            Command::PixelColor { offset, color } => self.pixels.set(usize::from(offset), color),
            Command::FillColor { color } => self.pixels.fill(color),
            Command::FillPattern { colors } => {
                for i in 0..self.pixels.len() {
                    self.pixels.set(i, colors[i % colors.len()]);
                }
            }
            Command::Rainbow { repeating, delay } => {
                let delay = delay.map_or(self.config.rainbow_delay(), Duration::from);
                self.scheduler.install(Animation::rainbow(delay, repeating));
            }
            Command::RainbowCycle { repeating } => {
                self.scheduler.install(Animation::rainbow_cycle(
                    self.config.rainbow_cycle_delay(),
                    repeating,
                ));
            }
            Command::TheaterChase { repeating, color } => {
                self.scheduler.install(Animation::theater_chase(
                    color,
                    self.config.theater_chase_delay(),
                    repeating,
                ));
            }
            Command::ResetInfo | Command::Uptime | Command::Readback => {}
        }

        self.notify_changed(now);
    }

    /// Advances the active animation by at most one frame. Returns whether a
    /// frame was rendered.
    pub fn tick(&mut self, now: Instant) -> bool {
        let rendered = self.scheduler.tick(now, &mut self.pixels);

        if rendered {
            self.notify_changed(now);
        }

        rendered
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe(self.snapshot())
    }

    /// Publishes a change deferred by the rate limit, if any.
    pub fn flush(&mut self, now: Instant) {
        let Self {
            pixels,
            brightness,
            last_command,
            broadcaster,
            ..
        } = self;

        broadcaster.flush(now, || snapshot_of(pixels, *brightness, *last_command));
    }

    fn notify_changed(&mut self, now: Instant) {
        let Self {
            pixels,
            brightness,
            last_command,
            broadcaster,
            ..
        } = self;

        broadcaster.notify(now, || snapshot_of(pixels, *brightness, *last_command));
    }

    fn fits(&self, command: &Command) -> bool {
        match command {
            Command::PixelColor { offset, .. } => usize::from(*offset) < self.pixels.len(),
            Command::FillPattern { colors } => {
                !colors.is_empty() && colors.len() <= self.pixels.len()
            }
            _ => true,
        }
    }
}

fn snapshot_of(pixels: &PixelBuffer, brightness: u8, last_command: LastCommand) -> StateSnapshot {
    StateSnapshot {
        pixels: pixels.snapshot(brightness),
        brightness,
        command: last_command.id,
        repeat: last_command.repeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelColor;
    use crate::command::Delay;
    use crate::network::codec::decode;

    const PIXEL_COUNT: usize = 106;

    fn device() -> Device {
        Device::new(
            PIXEL_COUNT,
            AnimationConfig::default(),
            Duration::from_millis(50),
        )
    }

    fn all_pixels_are(device: &Device, color: PixelColor) -> bool {
        device.pixels().as_slice().iter().all(|p| *p == color)
    }

    #[test]
    fn test_fill_pattern_tiles_colors() {
        let a = PixelColor::new(255, 0, 0);
        let b = PixelColor::new(0, 0, 255);
        let mut device = device();
        device.dispatch(
            Command::FillPattern {
                colors: vec![a, b],
            },
            Instant::now(),
        );

        for i in 0..PIXEL_COUNT {
            let expected = if i % 2 == 0 { a } else { b };
            assert_eq!(device.pixels().get(i), Some(expected), "pixel {i}");
        }
    }

    #[test]
    fn test_fill_pattern_partial_last_cycle() {
        let colors = vec![
            PixelColor::new(255, 0, 0),
            PixelColor::new(0, 255, 0),
            PixelColor::new(0, 0, 255),
        ];
        let mut device = device();
        device.dispatch(
            Command::FillPattern {
                colors: colors.clone(),
            },
            Instant::now(),
        );

        assert_eq!(device.pixels().get(105), Some(colors[0]));
        assert_eq!(device.pixels().get(104), Some(colors[2]));
    }

    #[test]
    fn test_oversized_fill_pattern_is_rejected() {
        let mut device = device();
        let fill = PixelColor::new(0, 255, 0);
        device.dispatch(Command::FillColor { color: fill }, Instant::now());
        device.dispatch(
            Command::FillPattern {
                colors: vec![PixelColor::WHITE; PIXEL_COUNT + 1],
            },
            Instant::now(),
        );

        assert!(all_pixels_are(&device, fill));
        assert_eq!(device.snapshot().command, crate::command::FILL_COLOR);
    }

    #[test]
    fn test_out_of_range_pixel_keeps_animation() {
        let mut device = device();
        device.dispatch(
            Command::RainbowCycle { repeating: true },
            Instant::now(),
        );
        device.dispatch(
            Command::PixelColor {
                offset: 200,
                color: PixelColor::WHITE,
            },
            Instant::now(),
        );

        assert!(device.scheduler().is_active());
    }

    #[test]
    fn test_fill_color_supersedes_animation() {
        let mut device = device();
        let start = Instant::now();
        device.dispatch(
            Command::Rainbow {
                repeating: true,
                delay: Some(Delay::from_millis(10)),
            },
            start,
        );
        device.tick(start);
        assert!(device.scheduler().is_active());

        let fill = PixelColor::new(0, 0, 255);
        device.dispatch(Command::FillColor { color: fill }, start);
        assert!(!device.scheduler().is_active());

        device.tick(start + Duration::from_millis(10));
        device.tick(start + Duration::from_millis(20));
        assert!(all_pixels_are(&device, fill));
    }

    #[test]
    fn test_brightness_only_affects_snapshot() {
        let mut device = device();
        device.dispatch(
            Command::PixelColor {
                offset: 0,
                color: PixelColor::WHITE,
            },
            Instant::now(),
        );
        device.dispatch(Command::Brightness { level: 128 }, Instant::now());

        assert_eq!(device.brightness(), 128);
        assert_eq!(device.pixels().get(0), Some(PixelColor::WHITE));
        assert_eq!(device.snapshot().pixels[0], PixelColor::new(128, 128, 128));
    }

    #[test]
    fn test_off_clears_strip() {
        let mut device = device();
        device.dispatch(
            Command::FillColor {
                color: PixelColor::WHITE,
            },
            Instant::now(),
        );
        device.dispatch(Command::Off, Instant::now());

        assert!(all_pixels_are(&device, PixelColor::BLACK));
    }

    #[test]
    fn test_malformed_datagram_changes_nothing() {
        let mut device = device();
        let before = device.snapshot();

        if let Ok(command) = decode(&[crate::command::BRIGHTNESS, 10, 20], PIXEL_COUNT) {
            device.dispatch(command, Instant::now());
        }

        assert_eq!(device.snapshot(), before);
        assert_eq!(device.brightness(), 255);
    }

    #[test]
    fn test_snapshot_reports_last_command() {
        let mut device = device();
        device.dispatch(
            Command::TheaterChase {
                repeating: true,
                color: PixelColor::WHITE,
            },
            Instant::now(),
        );

        let snapshot = device.snapshot();
        assert_eq!(snapshot.command, crate::command::THEATER_CHASE);
        assert!(snapshot.repeat);
    }

    #[test]
    fn test_diagnostics_do_not_touch_animation() {
        let mut device = device();
        device.dispatch(
            Command::RainbowCycle { repeating: false },
            Instant::now(),
        );
        device.dispatch(Command::Readback, Instant::now());

        assert!(device.scheduler().is_active());
        assert_eq!(device.snapshot().command, crate::command::RAINBOW_CYCLE);
    }

    fn assert_frame_spacing(command: Command, delay: Duration) {
        let mut device = device();
        let start = Instant::now();
        device.dispatch(command, start);

        assert!(device.tick(start), "first frame is due immediately");
        assert!(!device.tick(start + delay - Duration::from_millis(1)));
        assert!(device.tick(start + delay));
    }

    #[test]
    fn test_rainbow_uses_its_own_delay() {
        assert_frame_spacing(
            Command::Rainbow {
                repeating: false,
                delay: Some(Delay::from_millis(37)),
            },
            Duration::from_millis(37),
        );
    }

    #[test]
    fn test_animations_fall_back_to_configured_delays() {
        assert_frame_spacing(
            Command::Rainbow {
                repeating: true,
                delay: None,
            },
            Duration::from_millis(100),
        );
        assert_frame_spacing(
            Command::RainbowCycle { repeating: false },
            Duration::from_millis(20),
        );
        assert_frame_spacing(
            Command::TheaterChase {
                repeating: false,
                color: PixelColor::WHITE,
            },
            Duration::from_millis(200),
        );
    }

    #[test]
    fn test_configured_delay_overrides_default() {
        let config = AnimationConfig {
            theater_chase_delay_ms: 80,
            ..AnimationConfig::default()
        };
        let mut device = Device::new(PIXEL_COUNT, config, Duration::from_millis(50));
        let start = Instant::now();
        device.dispatch(
            Command::TheaterChase {
                repeating: true,
                color: PixelColor::WHITE,
            },
            start,
        );

        assert!(device.tick(start));
        assert!(!device.tick(start + Duration::from_millis(79)));
        assert!(device.tick(start + Duration::from_millis(80)));
    }

    #[test]
    fn test_subscriber_receives_frames() {
        let mut device = device();
        let subscription = device.subscribe();
        assert!(subscription
            .current
            .pixels
            .iter()
            .all(|p| *p == PixelColor::BLACK));
        let mut updates = subscription.updates;

        let start = Instant::now();
        device.dispatch(Command::RainbowCycle { repeating: true }, start);
        assert!(updates.has_changed().unwrap());
        assert_eq!(
            updates.borrow_and_update().command,
            crate::command::RAINBOW_CYCLE
        );

        device.tick(start);
        assert!(!updates.has_changed().unwrap());

        device.flush(start + Duration::from_millis(50));
        assert!(updates.has_changed().unwrap());
        assert!(updates
            .borrow_and_update()
            .pixels
            .iter()
            .any(|p| *p != PixelColor::BLACK));
    }
}
