use crate::color::{wheel, PixelColor};
use crate::device::pixels::PixelBuffer;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const RAINBOW_STEPS: u16 = 256;
const RAINBOW_CYCLE_STEPS: u16 = 256 * 5;
const THEATER_CHASE_PHASES: u8 = 3;
const THEATER_CHASE_CYCLES: u8 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnimationKind {
    Rainbow { step: u16 },
    RainbowCycle { step: u16 },
    TheaterChase { color: PixelColor, phase: u8, cycles: u8 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Frame {
    Continue,
    Finished,
}

#[derive(Clone, Debug)]
pub struct Animation {
    kind: AnimationKind,
    delay: Duration,
    repeating: bool,
    next_frame_at: Option<Instant>,
}

impl Animation {
    pub fn rainbow(delay: Duration, repeating: bool) -> Self {
        Self::new(AnimationKind::Rainbow { step: 0 }, delay, repeating)
    }

    pub fn rainbow_cycle(delay: Duration, repeating: bool) -> Self {
        Self::new(AnimationKind::RainbowCycle { step: 0 }, delay, repeating)
    }

    pub fn theater_chase(color: PixelColor, delay: Duration, repeating: bool) -> Self {
        Self::new(
            AnimationKind::TheaterChase {
                color,
                phase: 0,
                cycles: 0,
            },
            delay,
            repeating,
        )
    }

    fn new(kind: AnimationKind, delay: Duration, repeating: bool) -> Self {
        Self {
            kind,
            delay,
            repeating,
            next_frame_at: None,
        }
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    pub fn repeating(&self) -> bool {
        self.repeating
    }

    fn is_due(&self, now: Instant) -> bool {
        self.next_frame_at.map_or(true, |at| now >= at)
    }

    fn render(&mut self, pixels: &mut PixelBuffer) -> Frame {
        let pixel_count = pixels.len();

        let wrapped = match &mut self.kind {
            AnimationKind::Rainbow { step } => {
                for i in 0..pixel_count {
                    pixels.set(i, wheel(((i + usize::from(*step)) & 255) as u8));
                }

                *step = (*step + 1) % RAINBOW_STEPS;
                *step == 0
            }
            AnimationKind::RainbowCycle { step } => {
                for i in 0..pixel_count {
                    let position = i * 256 / pixel_count + usize::from(*step);
                    pixels.set(i, wheel((position & 255) as u8));
                }

                *step = (*step + 1) % RAINBOW_CYCLE_STEPS;
                *step == 0
            }
            AnimationKind::TheaterChase {
                color,
                phase,
                cycles,
            } => {
                pixels.clear();

                for i in (usize::from(*phase)..pixel_count).step_by(3) {
                    pixels.set(i, *color);
                }

                *phase = (*phase + 1) % THEATER_CHASE_PHASES;
                let mut finished = false;

                if *phase == 0 {
                    *cycles += 1;

                    if *cycles >= THEATER_CHASE_CYCLES {
                        *cycles = 0;
                        finished = true;
                    }
                }

                finished
            }
        };

        if wrapped && !self.repeating {
            Frame::Finished
        } else {
            Frame::Continue
        }
    }
}

/// Holds the single active animation and renders its frames when due.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    active: Option<Animation>,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, animation: Animation) {
        self.active = Some(animation);
    }

    pub fn cancel(&mut self) {
        if self.active.take().is_some() {
            debug!("animation cancelled");
        }
    }

    pub fn active(&self) -> Option<&Animation> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Renders at most one frame. Returns whether the buffer changed.
    pub fn tick(&mut self, now: Instant, pixels: &mut PixelBuffer) -> bool {
        let Some(animation) = self.active.as_mut() else {
            return false;
        };

        if !animation.is_due(now) {
            return false;
        }

        let frame = animation.render(pixels);
        animation.next_frame_at = Some(now + animation.delay);

        if frame == Frame::Finished {
            debug!("animation finished: {:?}", animation.kind);
            self.active = None;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL_COUNT: usize = 106;
    const DELAY: Duration = Duration::from_millis(20);

    fn run_frames(
        scheduler: &mut AnimationScheduler,
        pixels: &mut PixelBuffer,
        start: Instant,
        frames: u32,
    ) -> Instant {
        let mut now = start;

        for _ in 0..frames {
            assert!(scheduler.tick(now, pixels));
            now += DELAY;
        }

        now
    }

    #[test]
    fn test_idle_tick_does_nothing() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);

        assert!(!scheduler.tick(Instant::now(), &mut pixels));
    }

    #[test]
    fn test_frame_waits_for_delay() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        let start = Instant::now();
        scheduler.install(Animation::rainbow(DELAY, true));

        assert!(scheduler.tick(start, &mut pixels));
        assert!(!scheduler.tick(start + Duration::from_millis(5), &mut pixels));
        assert!(!scheduler.tick(start + Duration::from_millis(19), &mut pixels));
        assert!(scheduler.tick(start + DELAY, &mut pixels));
    }

    #[test]
    fn test_rainbow_first_frame() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::rainbow(DELAY, false));
        scheduler.tick(Instant::now(), &mut pixels);

        for i in 0..PIXEL_COUNT {
            assert_eq!(
                pixels.get(i),
                Some(wheel(i as u8).gamma_corrected()),
                "pixel {i}"
            );
        }
    }

    #[test]
    fn test_non_repeating_rainbow_stops_after_256_frames() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::rainbow(DELAY, false));

        let now = run_frames(&mut scheduler, &mut pixels, Instant::now(), 255);
        assert!(scheduler.is_active());

        assert!(scheduler.tick(now, &mut pixels));
        assert!(!scheduler.is_active());
        assert!(!scheduler.tick(now + DELAY, &mut pixels));
    }

    #[test]
    fn test_repeating_rainbow_never_clears() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::rainbow(DELAY, true));

        run_frames(&mut scheduler, &mut pixels, Instant::now(), 256 * 3);
        assert!(scheduler.is_active());
        assert_eq!(
            scheduler.active().map(Animation::kind),
            Some(AnimationKind::Rainbow { step: 0 })
        );
    }

    #[test]
    fn test_rainbow_cycle_spreads_wheel_over_strip() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::rainbow_cycle(DELAY, false));
        let now = run_frames(&mut scheduler, &mut pixels, Instant::now(), 2);

        for i in 0..PIXEL_COUNT {
            let position = (i * 256 / PIXEL_COUNT + 1) & 255;
            assert_eq!(pixels.get(i), Some(wheel(position as u8).gamma_corrected()));
        }

        run_frames(&mut scheduler, &mut pixels, now, 256 * 5 - 2);
        assert!(!scheduler.is_active());
    }

    #[test]
    fn test_theater_chase_stops_after_ten_cycles() {
        let color = PixelColor::new(255, 0, 0);
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::theater_chase(color, DELAY, false));

        let now = run_frames(&mut scheduler, &mut pixels, Instant::now(), 29);
        assert!(scheduler.is_active());
        run_frames(&mut scheduler, &mut pixels, now, 1);
        assert!(!scheduler.is_active());

        for i in 0..PIXEL_COUNT {
            let expected = if i % 3 == 2 { color } else { PixelColor::BLACK };
            assert_eq!(pixels.get(i), Some(expected), "pixel {i}");
        }
    }

    #[test]
    fn test_repeating_theater_chase_resets_cycles() {
        let mut scheduler = AnimationScheduler::new();
        let mut pixels = PixelBuffer::new(PIXEL_COUNT);
        scheduler.install(Animation::theater_chase(PixelColor::WHITE, DELAY, true));

        run_frames(&mut scheduler, &mut pixels, Instant::now(), 31);
        assert_eq!(
            scheduler.active().map(Animation::kind),
            Some(AnimationKind::TheaterChase {
                color: PixelColor::WHITE,
                phase: 1,
                cycles: 0,
            })
        );
    }

    #[test]
    fn test_cancel_clears_slot() {
        let mut scheduler = AnimationScheduler::new();
        scheduler.install(Animation::rainbow(DELAY, true));
        scheduler.cancel();

        assert!(!scheduler.is_active());
    }
}
