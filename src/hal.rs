//! ==============================================================================
//! hal.rs - Sense HAT Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     provides a unified interface for the Sense HAT board: environmental
//!     sensors, the IMU, the 8x8 LED matrix, and the joystick.
//!     abstracts away the difference between running on a real Raspberry Pi
//!     and a development machine (using a simulator).
//!
//! design philosophy:
//!     - "Compile Anywhere": The station should compile on Windows/Mac/Linux.
//!     - The sampling pipeline only ever sees this trait; it never touches
//!       hardware directly.
//!
//! relationships:
//!     - used by: sampler.rs (acquisition), display.rs (matrix output)
//!     - uses: python3/sense_hat (on feature="hardware", via subprocess)
//!
//! ==============================================================================

use anyhow::Result;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;

/// LED matrix color.
pub type Rgb = (u8, u8, u8);

/// Joystick event delivered to the sampling loop as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
}

/// IMU fusion output, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Extra IMU channels attached to a stored reading when the acquisition
/// source supplies them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedSample {
    pub orientation: BTreeMap<String, f64>,
    pub magnetometer: BTreeMap<String, f64>,
    pub accelerometer: BTreeMap<String, f64>,
    pub gyroscope: BTreeMap<String, f64>,
}

pub trait SenseHat: Send + Sync {
    fn get_temperature(&self) -> Result<f64>;
    fn get_humidity(&self) -> Result<f64>;
    fn get_pressure(&self) -> Result<f64>;
    fn get_orientation(&self) -> Result<Orientation>;

    /// Full IMU snapshot for persistence. `None` when the source has no IMU.
    fn get_extended(&self) -> Result<Option<ExtendedSample>> {
        Ok(None)
    }

    fn clear(&self) -> Result<()>;
    fn set_pixel(&self, x: u8, y: u8, color: Rgb) -> Result<()>;

    /// Scroll `text` across the matrix. Blocks for the scroll duration.
    fn show_message(&self, text: &str, color: Rgb, scroll_speed_ms: u64) -> Result<()>;

    /// Start delivering middle-button presses on `tx` until the sender closes.
    fn watch_joystick(&self, tx: UnboundedSender<ButtonEvent>) -> Result<()>;
}

// ==============================================================================================
// SIMULATED IMPLEMENTATION (For development machines / CI)
// ==============================================================================================
#[cfg(not(feature = "hardware"))]
pub struct Hal {
    started: std::time::Instant,
}

#[cfg(not(feature = "hardware"))]
impl Hal {
    pub fn new() -> Self {
        tracing::info!("Using SIMULATED Sense HAT (no hardware access)");
        Self { started: std::time::Instant::now() }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[cfg(not(feature = "hardware"))]
impl Default for Hal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "hardware"))]
impl SenseHat for Hal {
    // Slow sinusoidal wobble around realistic indoor baselines, so smoothing
    // and charts have something plausible to chew on.
    fn get_temperature(&self) -> Result<f64> {
        Ok(22.0 + 2.0 * (self.elapsed_secs() / 60.0).sin())
    }

    fn get_humidity(&self) -> Result<f64> {
        Ok(45.0 + 5.0 * (self.elapsed_secs() / 90.0 + 1.0).sin())
    }

    fn get_pressure(&self) -> Result<f64> {
        Ok(1013.0 + 3.0 * (self.elapsed_secs() / 120.0 + 2.0).sin())
    }

    fn get_orientation(&self) -> Result<Orientation> {
        // One full rotation every 30 seconds.
        let yaw = (self.elapsed_secs() * 12.0) % 360.0;
        Ok(Orientation { yaw, pitch: 0.5, roll: -0.3 })
    }

    fn get_extended(&self) -> Result<Option<ExtendedSample>> {
        let o = self.get_orientation()?;
        let mut ext = ExtendedSample::default();
        ext.orientation.insert("yaw_degrees".into(), o.yaw);
        ext.orientation.insert("pitch_degrees".into(), o.pitch);
        ext.orientation.insert("roll_degrees".into(), o.roll);
        ext.magnetometer.insert("compass_heading_degrees".into(), o.yaw);
        ext.magnetometer.insert("x_microtesla".into(), 21.4);
        ext.magnetometer.insert("y_microtesla".into(), -3.8);
        ext.magnetometer.insert("z_microtesla".into(), 40.1);
        ext.accelerometer.insert("x_g".into(), 0.01);
        ext.accelerometer.insert("y_g".into(), -0.01);
        ext.accelerometer.insert("z_g".into(), 0.99);
        ext.gyroscope.insert("x_rad_per_sec".into(), 0.0);
        ext.gyroscope.insert("y_rad_per_sec".into(), 0.0);
        ext.gyroscope.insert("z_rad_per_sec".into(), 0.21);
        Ok(Some(ext))
    }

    fn clear(&self) -> Result<()> {
        tracing::debug!("[SIM MATRIX] clear");
        Ok(())
    }

    fn set_pixel(&self, x: u8, y: u8, color: Rgb) -> Result<()> {
        tracing::debug!("[SIM MATRIX] pixel ({}, {}) = {:?}", x, y, color);
        Ok(())
    }

    fn show_message(&self, text: &str, color: Rgb, scroll_speed_ms: u64) -> Result<()> {
        tracing::debug!(
            "[SIM MATRIX] scroll {:?} color {:?} speed {}ms",
            text,
            color,
            scroll_speed_ms
        );
        Ok(())
    }

    fn watch_joystick(&self, _tx: UnboundedSender<ButtonEvent>) -> Result<()> {
        tracing::debug!("[SIM JOYSTICK] no event source; display mode stays put");
        Ok(())
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi + Sense HAT)
// ==============================================================================================
//
// Bridges to the python sense_hat library via one-shot subprocesses. The
// IMU fusion and the LED matrix text renderer live in that library and have
// no reliable native equivalent, so the host shells out the same way it
// would for any vendor-blob peripheral.
#[cfg(feature = "hardware")]
pub struct Hal {}

#[cfg(feature = "hardware")]
impl Hal {
    pub fn new() -> Self {
        tracing::info!("Using REAL Sense HAT (python3 sense_hat bridge)");
        Self {}
    }

    fn run_python(script: &str) -> Result<String> {
        use std::process::Command;
        let output = Command::new("python3")
            .args(["-c", script])
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to run python3: {}", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("sense_hat bridge error: {}", stderr);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn read_scalar(getter: &str) -> Result<f64> {
        let script = format!(
            r#"
from sense_hat import SenseHat
print(SenseHat().{}())
"#,
            getter
        );
        let stdout = Self::run_python(&script)?;
        stdout
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("Bad sensor value {:?}: {}", stdout, e))
    }
}

#[cfg(feature = "hardware")]
impl Default for Hal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "hardware")]
impl SenseHat for Hal {
    fn get_temperature(&self) -> Result<f64> {
        Self::read_scalar("get_temperature")
    }

    fn get_humidity(&self) -> Result<f64> {
        Self::read_scalar("get_humidity")
    }

    fn get_pressure(&self) -> Result<f64> {
        Self::read_scalar("get_pressure")
    }

    fn get_orientation(&self) -> Result<Orientation> {
        let script = r#"
from sense_hat import SenseHat
import json
o = SenseHat().get_orientation()
print(json.dumps({"yaw": o["yaw"], "pitch": o["pitch"], "roll": o["roll"]}))
"#;
        let stdout = Self::run_python(script)?;
        let v: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| anyhow::anyhow!("JSON parse error: {} (got: {})", e, stdout))?;
        Ok(Orientation {
            yaw: v["yaw"].as_f64().unwrap_or(0.0),
            pitch: v["pitch"].as_f64().unwrap_or(0.0),
            roll: v["roll"].as_f64().unwrap_or(0.0),
        })
    }

    fn get_extended(&self) -> Result<Option<ExtendedSample>> {
        let script = r#"
from sense_hat import SenseHat
import json
s = SenseHat()
o = s.get_orientation()
m = s.get_compass_raw()
a = s.get_accelerometer_raw()
g = s.get_gyroscope_raw()
print(json.dumps({
    "orientation": {"yaw_degrees": o["yaw"], "pitch_degrees": o["pitch"], "roll_degrees": o["roll"]},
    "magnetometer": {"x_microtesla": m["x"], "y_microtesla": m["y"], "z_microtesla": m["z"],
                     "compass_heading_degrees": s.get_compass()},
    "accelerometer": {"x_g": a["x"], "y_g": a["y"], "z_g": a["z"]},
    "gyroscope": {"x_rad_per_sec": g["x"], "y_rad_per_sec": g["y"], "z_rad_per_sec": g["z"]}
}))
"#;
        let stdout = Self::run_python(script)?;
        let v: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| anyhow::anyhow!("JSON parse error: {} (got: {})", e, stdout))?;

        let section = |name: &str| -> BTreeMap<String, f64> {
            v[name]
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, val)| val.as_f64().map(|f| (k.clone(), f)))
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(Some(ExtendedSample {
            orientation: section("orientation"),
            magnetometer: section("magnetometer"),
            accelerometer: section("accelerometer"),
            gyroscope: section("gyroscope"),
        }))
    }

    fn clear(&self) -> Result<()> {
        Self::run_python(
            r#"
from sense_hat import SenseHat
SenseHat().clear()
"#,
        )?;
        Ok(())
    }

    fn set_pixel(&self, x: u8, y: u8, color: Rgb) -> Result<()> {
        let script = format!(
            r#"
from sense_hat import SenseHat
SenseHat().set_pixel({}, {}, ({}, {}, {}))
"#,
            x, y, color.0, color.1, color.2
        );
        Self::run_python(&script)?;
        Ok(())
    }

    fn show_message(&self, text: &str, color: Rgb, scroll_speed_ms: u64) -> Result<()> {
        // Blocks until the full message has scrolled off the matrix.
        let script = format!(
            r#"
from sense_hat import SenseHat
SenseHat().show_message({:?}, text_colour=({}, {}, {}), scroll_speed={})
"#,
            text,
            color.0,
            color.1,
            color.2,
            scroll_speed_ms as f64 / 1000.0
        );
        Self::run_python(&script)?;
        Ok(())
    }

    fn watch_joystick(&self, tx: UnboundedSender<ButtonEvent>) -> Result<()> {
        use std::io::{BufRead, BufReader};
        use std::process::{Command, Stdio};

        let script = r#"
from sense_hat import SenseHat
import time
sense = SenseHat()
while True:
    for event in sense.stick.get_events():
        if event.action == "pressed" and event.direction == "middle":
            print("pressed", flush=True)
    time.sleep(0.05)
"#;
        let mut child = Command::new("python3")
            .args(["-c", script])
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to start joystick watcher: {}", e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Joystick watcher has no stdout"))?;

        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) if l.trim() == "pressed" => {
                        if tx.send(ButtonEvent::Pressed).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Joystick watcher read error: {}", e);
                        break;
                    }
                }
            }
            tracing::warn!("Joystick watcher exited");
            let _ = child.kill();
        });
        Ok(())
    }
}
