//! LED matrix display controller.
//!
//! A four-state mode machine driven by joystick presses: compass arrow or
//! one of the three smoothed environmental values as scrolling text. No
//! error states; a pixel that falls off the 8x8 grid is dropped, not
//! clamped.

use crate::config::DisplayConfig;
use crate::hal::{Rgb, SenseHat};
use crate::sampler::Smoothed;
use anyhow::Result;

const GRID_MAX: i32 = 7;
const ARROW_LEN: usize = 5;
const ARROW_TRAIL: Rgb = (255, 255, 255);
const ARROW_TIP: Rgb = (255, 0, 0);

/// What the matrix is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Compass,
    Temperature,
    Humidity,
    Pressure,
}

impl DisplayMode {
    /// Cyclic successor: (index + 1) mod 4.
    pub fn next(self) -> Self {
        match self {
            Self::Compass => Self::Temperature,
            Self::Temperature => Self::Humidity,
            Self::Humidity => Self::Pressure,
            Self::Pressure => Self::Compass,
        }
    }
}

/// Pixels of a 5-long arrow anchored at the grid center and rotated by
/// `-yaw` degrees, trail first, tip last. Off-grid points are dropped.
pub fn compass_arrow(yaw_degrees: f64) -> Vec<(u8, u8)> {
    let (cx, cy) = (3.5, 3.5);
    let angle = (-yaw_degrees).to_radians();

    let mut pixels = Vec::with_capacity(ARROW_LEN);
    for i in 0..ARROW_LEN {
        let x = cx + i as f64 * angle.sin();
        let y = cy - i as f64 * angle.cos();
        let (xi, yi) = (x.round() as i32, y.round() as i32);
        if (0..=GRID_MAX).contains(&xi) && (0..=GRID_MAX).contains(&yi) {
            pixels.push((xi as u8, yi as u8));
        }
    }
    pixels
}

/// Render the current mode onto the matrix.
///
/// Scroll modes block for the scroll duration; that head-of-line delay on
/// the sampling loop is accepted behavior, not a defect.
pub fn render(hal: &dyn SenseHat, mode: DisplayMode, smoothed: &Smoothed, cfg: &DisplayConfig) -> Result<()> {
    let color: Rgb = (cfg.text_color[0], cfg.text_color[1], cfg.text_color[2]);
    match mode {
        DisplayMode::Compass => {
            let yaw = hal.get_orientation()?.yaw;
            let pixels = compass_arrow(yaw);
            hal.clear()?;
            if let Some((&tip, trail)) = pixels.split_last() {
                for &(x, y) in trail {
                    hal.set_pixel(x, y, ARROW_TRAIL)?;
                }
                hal.set_pixel(tip.0, tip.1, ARROW_TIP)?;
            }
        }
        DisplayMode::Temperature => {
            hal.show_message(&format!("T {:.1}C", smoothed.temperature), color, cfg.scroll_speed_ms)?;
        }
        DisplayMode::Humidity => {
            hal.show_message(&format!("H {:.1}%", smoothed.humidity), color, cfg.scroll_speed_ms)?;
        }
        DisplayMode::Pressure => {
            hal.show_message(&format!("P {:.1}hPa", smoothed.pressure), color, cfg.scroll_speed_ms)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_cycle_wraps_after_four_presses() {
        let mut mode = DisplayMode::Compass;
        for _ in 0..4 {
            mode = mode.next();
        }
        assert_eq!(mode, DisplayMode::Compass);
    }

    #[test]
    fn mode_cycle_order() {
        assert_eq!(DisplayMode::Compass.next(), DisplayMode::Temperature);
        assert_eq!(DisplayMode::Temperature.next(), DisplayMode::Humidity);
        assert_eq!(DisplayMode::Humidity.next(), DisplayMode::Pressure);
        assert_eq!(DisplayMode::Pressure.next(), DisplayMode::Compass);
    }

    #[test]
    fn north_arrow_clips_off_grid_tip() {
        // yaw 0: arrow runs straight up from center; the 5th point rounds
        // to y = -1 and is dropped rather than clamped.
        let pixels = compass_arrow(0.0);
        assert_eq!(pixels, vec![(4, 4), (4, 3), (4, 2), (4, 1)]);
    }

    #[test]
    fn east_arrow_points_east() {
        // yaw 270: -270 degrees points the arrow toward +x.
        let pixels = compass_arrow(270.0);
        let (tip_x, tip_y) = *pixels.last().unwrap();
        assert!(tip_x >= 6, "tip should move east, got ({}, {})", tip_x, tip_y);
        let (base_x, _) = pixels[0];
        assert_eq!(base_x, 4);
    }

    #[test]
    fn arrow_never_leaves_grid() {
        for deg in 0..360 {
            for &(x, y) in &compass_arrow(deg as f64) {
                assert!(x <= 7 && y <= 7, "yaw {} produced ({}, {})", deg, x, y);
            }
        }
    }
}
