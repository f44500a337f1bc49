//! Humanized scrolling
//!
//! Produces touch-gesture scroll traffic resembling manual mobile browsing.
//! Step counts, swipe geometry and pacing are drawn fresh per invocation,
//! and nothing in here can fail the enclosing task.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::errors::SessionError;

/// The page surface the simulator drives. Implemented by the live session;
/// tests provide a synthetic surface.
#[async_trait]
pub trait GestureSurface {
    /// Viewport size as (width, height) in CSS pixels.
    async fn viewport(&self) -> Result<(f64, f64), SessionError>;

    async fn touch_start(&self, x: f64, y: f64) -> Result<(), SessionError>;

    async fn touch_move(&self, x: f64, y: f64) -> Result<(), SessionError>;

    async fn touch_end(&self) -> Result<(), SessionError>;

    /// Programmatic scroll fallback for when touch dispatch fails.
    async fn scroll_by(&self, dy: f64) -> Result<(), SessionError>;

    /// Whether the viewport bottom is within `tolerance` px of the document bottom.
    async fn at_bottom(&self, tolerance: f64) -> Result<bool, SessionError>;
}

/// Randomized scroll-gesture simulator
pub struct ScrollSimulator;

impl ScrollSimulator {
    /// Run one simulated browsing pass. Internal errors are logged and
    /// swallowed; the caller always proceeds to cleanup.
    pub async fn run<S: GestureSurface + Sync>(surface: &S) {
        if let Err(e) = Self::run_inner(surface).await {
            warn!("Scroll simulation aborted: {}", e);
        }
    }

    async fn run_inner<S: GestureSurface + Sync>(surface: &S) -> Result<(), SessionError> {
        let mut rng = StdRng::from_entropy();

        let steps: u32 = rng.gen_range(8..=23);
        let total_ms = rng.gen_range(10_000..=30_000) as f64;
        let (width, height) = surface.viewport().await?;

        debug!("Simulating {} scroll gestures over ~{:.0}s", steps, total_ms / 1000.0);

        for step in 0..steps {
            let distance = rng.gen_range(150.0..=550.0);
            let center = width / 2.0;
            let start_x = center + rng.gen_range(-30.0..=30.0);
            let end_x = center + rng.gen_range(-30.0..=30.0);
            // swipe starts low on the screen and moves up, scrolling content down
            let start_y = height * rng.gen_range(0.6..=0.9);
            let end_y = (start_y - distance).max(0.0);

            if let Err(e) = Self::swipe(surface, &mut rng, start_x, start_y, end_x, end_y).await {
                debug!("Touch gesture failed ({}), falling back to scroll", e);
                if let Err(e) = surface.scroll_by(distance).await {
                    debug!("Fallback scroll failed: {}", e);
                }
            }

            // pace the gestures around total / steps with heavy jitter
            let base = total_ms / steps as f64;
            let pause = (base * (1.0 + rng.gen_range(-0.8..=0.8))).max(0.0) as u64;
            sleep(Duration::from_millis(pause)).await;

            if rng.gen_bool(0.25) {
                let reading = rng.gen_range(500..=3500);
                sleep(Duration::from_millis(reading)).await;
            }

            match surface.at_bottom(20.0).await {
                Ok(true) => {
                    debug!("Reached page bottom after {} gestures", step + 1);
                    sleep(Duration::from_millis(rng.gen_range(1000..=3000))).await;
                    break;
                }
                Ok(false) => {}
                Err(e) => debug!("Bottom check failed: {}", e),
            }
        }

        Ok(())
    }

    async fn swipe<S: GestureSurface + Sync>(
        surface: &S,
        rng: &mut StdRng,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
    ) -> Result<(), SessionError> {
        surface.touch_start(start_x, start_y).await?;
        sleep(Duration::from_millis(rng.gen_range(50..=120))).await;

        let moves: u32 = rng.gen_range(3..=10);
        for i in 1..=moves {
            let t = i as f64 / moves as f64;
            let x = start_x + (end_x - start_x) * t;
            let y = start_y + (end_y - start_y) * t;
            surface.touch_move(x, y).await?;
            sleep(Duration::from_millis(rng.gen_range(10..=30))).await;
        }

        surface.touch_end().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Synthetic surface recording the calls the simulator makes.
    #[derive(Default)]
    struct FakeSurface {
        fail_touches: bool,
        bottom_after_checks: Option<u32>,
        touch_starts: AtomicU32,
        touch_moves: AtomicU32,
        touch_ends: AtomicU32,
        fallback_scrolls: AtomicU32,
        bottom_checks: AtomicU32,
    }

    #[async_trait]
    impl GestureSurface for FakeSurface {
        async fn viewport(&self) -> Result<(f64, f64), SessionError> {
            Ok((390.0, 844.0))
        }

        async fn touch_start(&self, x: f64, y: f64) -> Result<(), SessionError> {
            if self.fail_touches {
                return Err(SessionError::JavaScriptError("touch unsupported".into()));
            }
            assert!((165.0..=225.0).contains(&x), "start x {} outside center band", x);
            assert!((506.0..=760.0).contains(&y), "start y {} outside bottom band", y);
            self.touch_starts.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn touch_move(&self, _x: f64, _y: f64) -> Result<(), SessionError> {
            self.touch_moves.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn touch_end(&self) -> Result<(), SessionError> {
            self.touch_ends.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn scroll_by(&self, dy: f64) -> Result<(), SessionError> {
            assert!((150.0..=550.0).contains(&dy));
            self.fallback_scrolls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn at_bottom(&self, tolerance: f64) -> Result<bool, SessionError> {
            assert_eq!(tolerance, 20.0);
            let checks = self.bottom_checks.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(self
                .bottom_after_checks
                .map(|after| checks >= after)
                .unwrap_or(false))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_bounded_number_of_gestures() {
        let surface = FakeSurface::default();
        ScrollSimulator::run(&surface).await;

        let starts = surface.touch_starts.load(Ordering::Relaxed);
        let ends = surface.touch_ends.load(Ordering::Relaxed);
        let moves = surface.touch_moves.load(Ordering::Relaxed);

        assert!((8..=23).contains(&starts), "{} gestures outside 8..=23", starts);
        assert_eq!(starts, ends);
        assert!(moves >= starts * 3 && moves <= starts * 10);
        assert_eq!(surface.fallback_scrolls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_when_bottom_is_reached() {
        let surface = FakeSurface {
            bottom_after_checks: Some(2),
            ..Default::default()
        };
        ScrollSimulator::run(&surface).await;

        assert_eq!(surface.bottom_checks.load(Ordering::Relaxed), 2);
        assert_eq!(surface.touch_starts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_scrolling_when_touch_fails() {
        let surface = FakeSurface {
            fail_touches: true,
            bottom_after_checks: Some(3),
            ..Default::default()
        };
        ScrollSimulator::run(&surface).await;

        assert_eq!(surface.touch_starts.load(Ordering::Relaxed), 0);
        assert_eq!(surface.fallback_scrolls.load(Ordering::Relaxed), 3);
    }
}
