//! The sampling loop: acquire, smooth, periodically persist, drive display.
//!
//! All loop state (the three ring buffers, the flush timer, the display
//! mode) lives in an explicit [`Sampler`] so each step is a method call
//! that tests can drive directly, without real sensors or real time.

use crate::buffer::SampleBuffer;
use crate::config::{SamplingConfig, StationConfig};
use crate::display::{self, DisplayMode};
use crate::hal::{ButtonEvent, SenseHat};
use crate::store::{Reading, ReadingStore};
use anyhow::Result;
use chrono::Local;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// One raw acquisition, one scalar per metric.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentalSample {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Moving averages over the configured smoothing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Mutable state of the sampling loop.
pub struct Sampler {
    temperature: SampleBuffer,
    humidity: SampleBuffer,
    pressure: SampleBuffer,
    window: usize,
    log_interval: Duration,
    last_flush: Option<Instant>,
    mode: DisplayMode,
}

impl Sampler {
    pub fn new(cfg: &SamplingConfig) -> Self {
        let capacity = cfg.buffer_capacity();
        Self {
            temperature: SampleBuffer::with_capacity(capacity),
            humidity: SampleBuffer::with_capacity(capacity),
            pressure: SampleBuffer::with_capacity(capacity),
            window: cfg.smoothing_window,
            log_interval: cfg.log_interval(),
            last_flush: None,
            mode: DisplayMode::Compass,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Push one raw sample per metric and return the smoothed values.
    pub fn ingest(&mut self, sample: EnvironmentalSample) -> Smoothed {
        self.temperature.push(sample.temperature);
        self.humidity.push(sample.humidity);
        self.pressure.push(sample.pressure);
        Smoothed {
            temperature: self.temperature.moving_average(self.window),
            humidity: self.humidity.moving_average(self.window),
            pressure: self.pressure.moving_average(self.window),
        }
    }

    /// True when the log interval has elapsed since the last flush (always
    /// true on the first call). Resets the flush timer when it fires.
    pub fn should_flush(&mut self, now: Instant) -> bool {
        let due = match self.last_flush {
            None => true,
            Some(last) => now.duration_since(last) >= self.log_interval,
        };
        if due {
            self.last_flush = Some(now);
        }
        due
    }

    /// Apply one joystick message and return the new mode. The caller is
    /// responsible for clearing the matrix on a transition.
    pub fn handle_button(&mut self, event: ButtonEvent) -> DisplayMode {
        match event {
            ButtonEvent::Pressed => self.mode = self.mode.next(),
        }
        self.mode
    }
}

/// The unbounded cooperative loop. Runs until the process dies or a sensor
/// or store failure surfaces through `?`.
pub async fn run(
    hal: &dyn SenseHat,
    store: &dyn ReadingStore,
    cfg: &StationConfig,
    mut buttons: UnboundedReceiver<ButtonEvent>,
) -> Result<()> {
    let mut sampler = Sampler::new(&cfg.sampling);
    tracing::info!(
        "Sampling every {}ms, flushing every {}ms to {}",
        cfg.sampling.read_interval_ms,
        cfg.sampling.log_interval_ms,
        cfg.store.path.display()
    );

    loop {
        // Joystick messages accumulated since the last wake.
        while let Ok(event) = buttons.try_recv() {
            let mode = sampler.handle_button(event);
            hal.clear()?;
            tracing::info!("Display mode -> {:?}", mode);
        }

        let sample = EnvironmentalSample {
            temperature: hal.get_temperature()?,
            humidity: hal.get_humidity()?,
            pressure: hal.get_pressure()?,
        };
        let smoothed = sampler.ingest(sample);

        if sampler.should_flush(Instant::now()) {
            let reading = Reading::new(
                Local::now(),
                smoothed.temperature,
                smoothed.humidity,
                smoothed.pressure,
                hal.get_extended()?,
            );
            store.append(&reading)?;
        }

        display::render(hal, sampler.mode(), &smoothed, &cfg.display)?;

        // The compass redraws every frame; hold it briefly so the arrow is
        // visible instead of strobing at the read interval.
        if sampler.mode() == DisplayMode::Compass {
            tokio::time::sleep(Duration::from_millis(cfg.display.compass_refresh_ms)).await;
        }
        tokio::time::sleep(cfg.sampling.read_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> Sampler {
        Sampler::new(&StationConfig::default().sampling)
    }

    fn sample(t: f64) -> EnvironmentalSample {
        EnvironmentalSample { temperature: t, humidity: 40.0, pressure: 1000.0 }
    }

    #[test]
    fn smoothing_tracks_partial_window() {
        // Three samples against a window of 10: the average degrades to
        // the mean of what exists.
        let mut s = sampler();
        assert_eq!(s.ingest(sample(20.0)).temperature, 20.0);
        assert_eq!(s.ingest(sample(21.0)).temperature, 20.5);
        assert_eq!(s.ingest(sample(22.0)).temperature, 21.0);
    }

    #[test]
    fn first_flush_fires_immediately() {
        let mut s = sampler();
        let t0 = Instant::now();
        assert!(s.should_flush(t0));
    }

    #[test]
    fn flush_respects_log_interval() {
        let mut s = sampler();
        let t0 = Instant::now();
        assert!(s.should_flush(t0));
        // Default log interval is 500ms.
        assert!(!s.should_flush(t0 + Duration::from_millis(100)));
        assert!(!s.should_flush(t0 + Duration::from_millis(499)));
        assert!(s.should_flush(t0 + Duration::from_millis(500)));
        // Timer was reset by the flush above.
        assert!(!s.should_flush(t0 + Duration::from_millis(900)));
        assert!(s.should_flush(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn button_presses_cycle_modes() {
        let mut s = sampler();
        assert_eq!(s.mode(), DisplayMode::Compass);
        assert_eq!(s.handle_button(ButtonEvent::Pressed), DisplayMode::Temperature);
        assert_eq!(s.handle_button(ButtonEvent::Pressed), DisplayMode::Humidity);
        assert_eq!(s.handle_button(ButtonEvent::Pressed), DisplayMode::Pressure);
        assert_eq!(s.handle_button(ButtonEvent::Pressed), DisplayMode::Compass);
    }
}
