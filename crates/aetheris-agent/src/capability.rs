//! Narrow capability interfaces for the agent's peripherals (§4.A hardware
//! degradation): IMU, sonar, camera, servo bus, GPIO status light. Each has
//! a `Real` implementation that talks to the device and a `Simulated`
//! fallback that produces synthetic but schema-valid values. Acquisition of
//! the real implementation is attempted once at startup; on failure the
//! simulated implementation takes over for the life of the process and the
//! transition is logged (`tracing::warn!`).

use rand::Rng;
use std::fmt;
use tracing::warn;

/// Where a sample actually came from, carried as the `source` tag on every
/// emitted reading so downstream consumers can distinguish real telemetry
/// from synthetic fill-in (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Real,
    Simulated,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Real => "real",
            Source::Simulated => "simulated",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure acquiring or reading a peripheral. Acquisition failure at
/// startup triggers the simulated fallback; a read failure after
/// acquisition succeeded is treated as a transient sampling error local to
/// that task's tick (§4.A: "sampling errors for one task do not affect
/// others").
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("failed to acquire {peripheral}: {detail}")]
    Acquisition { peripheral: &'static str, detail: String },
    #[error("read error on {peripheral}: {detail}")]
    Read { peripheral: &'static str, detail: String },
}

/// Six-axis IMU reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuReading {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
}

pub trait Imu: Send + Sync {
    fn read(&self) -> Result<ImuReading, CapabilityError>;
}

pub trait Sonar: Send + Sync {
    /// Distance in centimetres.
    fn read(&self) -> Result<f64, CapabilityError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionReading {
    pub detected: bool,
    pub label: Option<String>,
    pub confidence: Option<f64>,
}

pub trait Camera: Send + Sync {
    fn capture(&self) -> Result<VisionReading, CapabilityError>;
}

/// One servo's raw reading off the bus, before it is tagged with the
/// agent's `(servo_id, servo_name)` from `servo_table`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoSample {
    pub id: u32,
    pub position: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub torque_enabled: bool,
}

pub trait ServoBus: Send + Sync {
    fn read_all(&self, servo_ids: &[u32]) -> Result<Vec<ServoSample>, CapabilityError>;
}

pub trait GpioLight: Send + Sync {
    fn set(&self, on: bool) -> Result<(), CapabilityError>;
}

/// Attempts to open the named hardware device; `Err` means "no such device
/// on this host", which is exactly the acquisition-failure case §4.A asks
/// the caller to fall back from.
fn probe_device_path(path: &str) -> Result<(), String> {
    std::fs::metadata(path).map(|_| ()).map_err(|e| e.to_string())
}

pub struct RealImu {
    #[allow(dead_code)]
    device_path: String,
}

impl RealImu {
    pub fn probe(device_path: &str) -> Result<Self, CapabilityError> {
        probe_device_path(device_path).map_err(|detail| CapabilityError::Acquisition {
            peripheral: "imu",
            detail,
        })?;
        Ok(Self {
            device_path: device_path.to_string(),
        })
    }
}

impl Imu for RealImu {
    fn read(&self) -> Result<ImuReading, CapabilityError> {
        // Hardware register reads are not modeled; a real deployment would
        // go through the platform's I2C driver here.
        Err(CapabilityError::Read {
            peripheral: "imu",
            detail: "hardware driver not available in this build".to_string(),
        })
    }
}

pub struct SimulatedImu;

impl Imu for SimulatedImu {
    fn read(&self) -> Result<ImuReading, CapabilityError> {
        let mut rng = rand::rng();
        Ok(ImuReading {
            accel_x: rng.random_range(-1.0..1.0),
            accel_y: rng.random_range(-1.0..1.0),
            accel_z: rng.random_range(9.0..10.0),
            gyro_x: rng.random_range(-2.0..2.0),
            gyro_y: rng.random_range(-2.0..2.0),
            gyro_z: rng.random_range(-2.0..2.0),
        })
    }
}

pub struct RealSonar {
    #[allow(dead_code)]
    device_path: String,
}

impl RealSonar {
    pub fn probe(device_path: &str) -> Result<Self, CapabilityError> {
        probe_device_path(device_path).map_err(|detail| CapabilityError::Acquisition {
            peripheral: "sonar",
            detail,
        })?;
        Ok(Self {
            device_path: device_path.to_string(),
        })
    }
}

impl Sonar for RealSonar {
    fn read(&self) -> Result<f64, CapabilityError> {
        Err(CapabilityError::Read {
            peripheral: "sonar",
            detail: "hardware driver not available in this build".to_string(),
        })
    }
}

pub struct SimulatedSonar;

impl Sonar for SimulatedSonar {
    fn read(&self) -> Result<f64, CapabilityError> {
        Ok(rand::rng().random_range(15.0..200.0))
    }
}

pub struct RealCamera {
    #[allow(dead_code)]
    device_path: String,
}

impl RealCamera {
    pub fn probe(device_path: &str) -> Result<Self, CapabilityError> {
        probe_device_path(device_path).map_err(|detail| CapabilityError::Acquisition {
            peripheral: "camera",
            detail,
        })?;
        Ok(Self {
            device_path: device_path.to_string(),
        })
    }
}

impl Camera for RealCamera {
    fn capture(&self) -> Result<VisionReading, CapabilityError> {
        Err(CapabilityError::Read {
            peripheral: "camera",
            detail: "hardware driver not available in this build".to_string(),
        })
    }
}

pub struct SimulatedCamera;

impl Camera for SimulatedCamera {
    fn capture(&self) -> Result<VisionReading, CapabilityError> {
        // No change-detection hardware to poll; the simulated camera never
        // reports a detection, so the `vision` task's on-change trigger
        // simply never fires in simulated mode.
        Ok(VisionReading {
            detected: false,
            label: None,
            confidence: None,
        })
    }
}

pub struct RealServoBus {
    #[allow(dead_code)]
    device_path: String,
}

impl RealServoBus {
    pub fn probe(device_path: &str) -> Result<Self, CapabilityError> {
        probe_device_path(device_path).map_err(|detail| CapabilityError::Acquisition {
            peripheral: "servo_bus",
            detail,
        })?;
        Ok(Self {
            device_path: device_path.to_string(),
        })
    }
}

impl ServoBus for RealServoBus {
    fn read_all(&self, _servo_ids: &[u32]) -> Result<Vec<ServoSample>, CapabilityError> {
        Err(CapabilityError::Read {
            peripheral: "servo_bus",
            detail: "hardware driver not available in this build".to_string(),
        })
    }
}

pub struct SimulatedServoBus;

impl ServoBus for SimulatedServoBus {
    fn read_all(&self, servo_ids: &[u32]) -> Result<Vec<ServoSample>, CapabilityError> {
        let mut rng = rand::rng();
        Ok(servo_ids
            .iter()
            .map(|&id| ServoSample {
                id,
                position: rng.random_range(200.0..800.0),
                temperature: rng.random_range(30.0..45.0),
                voltage: rng.random_range(6.5..8.4),
                torque_enabled: true,
            })
            .collect())
    }
}

pub struct RealGpioLight {
    #[allow(dead_code)]
    device_path: String,
}

impl RealGpioLight {
    pub fn probe(device_path: &str) -> Result<Self, CapabilityError> {
        probe_device_path(device_path).map_err(|detail| CapabilityError::Acquisition {
            peripheral: "gpio_light",
            detail,
        })?;
        Ok(Self {
            device_path: device_path.to_string(),
        })
    }
}

impl GpioLight for RealGpioLight {
    fn set(&self, _on: bool) -> Result<(), CapabilityError> {
        Err(CapabilityError::Read {
            peripheral: "gpio_light",
            detail: "hardware driver not available in this build".to_string(),
        })
    }
}

pub struct SimulatedGpioLight;

impl GpioLight for SimulatedGpioLight {
    fn set(&self, _on: bool) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// Device paths probed at startup. Not user-configurable in the
/// distilled spec; kept as constants matching the TonyPi reference wiring.
pub mod device_paths {
    pub const IMU: &str = "/dev/tonypi/imu";
    pub const SONAR: &str = "/dev/tonypi/sonar";
    pub const CAMERA: &str = "/dev/tonypi/camera";
    pub const SERVO_BUS: &str = "/dev/tonypi/servo_bus";
    pub const GPIO_LIGHT: &str = "/dev/tonypi/gpio_light";
}

/// The full set of acquired peripherals, each tagged with whether it ended
/// up real or simulated.
pub struct AgentCapabilities {
    pub imu: Box<dyn Imu>,
    pub imu_source: Source,
    pub sonar: Box<dyn Sonar>,
    pub sonar_source: Source,
    pub camera: Box<dyn Camera>,
    pub camera_source: Source,
    pub servo_bus: Box<dyn ServoBus>,
    pub servo_bus_source: Source,
    pub gpio_light: Box<dyn GpioLight>,
    pub gpio_light_source: Source,
}

impl AgentCapabilities {
    /// Probes every peripheral, falling back to the simulated implementation
    /// and logging a warning wherever acquisition fails (§4.A).
    pub fn acquire() -> Self {
        let (imu, imu_source): (Box<dyn Imu>, Source) = match RealImu::probe(device_paths::IMU) {
            Ok(real) => (Box::new(real), Source::Real),
            Err(e) => {
                warn!(peripheral = "imu", error = %e, "falling back to simulated capability");
                (Box::new(SimulatedImu), Source::Simulated)
            }
        };

        let (sonar, sonar_source): (Box<dyn Sonar>, Source) = match RealSonar::probe(device_paths::SONAR) {
            Ok(real) => (Box::new(real), Source::Real),
            Err(e) => {
                warn!(peripheral = "sonar", error = %e, "falling back to simulated capability");
                (Box::new(SimulatedSonar), Source::Simulated)
            }
        };

        let (camera, camera_source): (Box<dyn Camera>, Source) = match RealCamera::probe(device_paths::CAMERA) {
            Ok(real) => (Box::new(real), Source::Real),
            Err(e) => {
                warn!(peripheral = "camera", error = %e, "falling back to simulated capability");
                (Box::new(SimulatedCamera), Source::Simulated)
            }
        };

        let (servo_bus, servo_bus_source): (Box<dyn ServoBus>, Source) =
            match RealServoBus::probe(device_paths::SERVO_BUS) {
                Ok(real) => (Box::new(real), Source::Real),
                Err(e) => {
                    warn!(peripheral = "servo_bus", error = %e, "falling back to simulated capability");
                    (Box::new(SimulatedServoBus), Source::Simulated)
                }
            };

        let (gpio_light, gpio_light_source): (Box<dyn GpioLight>, Source) =
            match RealGpioLight::probe(device_paths::GPIO_LIGHT) {
                Ok(real) => (Box::new(real), Source::Real),
                Err(e) => {
                    warn!(peripheral = "gpio_light", error = %e, "falling back to simulated capability");
                    (Box::new(SimulatedGpioLight), Source::Simulated)
                }
            };

        Self {
            imu,
            imu_source,
            sonar,
            sonar_source,
            camera,
            camera_source,
            servo_bus,
            servo_bus_source,
            gpio_light,
            gpio_light_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_probe_fails_when_device_absent() {
        assert!(RealImu::probe("/no/such/device").is_err());
    }

    #[test]
    fn simulated_sonar_reads_in_declared_range() {
        let sonar = SimulatedSonar;
        for _ in 0..20 {
            let d = sonar.read().unwrap();
            assert!((0.0..=500.0).contains(&d));
        }
    }

    #[test]
    fn simulated_servo_bus_reports_every_requested_id() {
        let bus = SimulatedServoBus;
        let ids = [1, 2, 3];
        let samples = bus.read_all(&ids).unwrap();
        assert_eq!(samples.len(), 3);
    }

    #[test]
    fn acquire_falls_back_to_simulated_without_hardware() {
        let caps = AgentCapabilities::acquire();
        assert_eq!(caps.imu_source, Source::Simulated);
        assert_eq!(caps.sonar_source, Source::Simulated);
        assert_eq!(caps.camera_source, Source::Simulated);
        assert_eq!(caps.servo_bus_source, Source::Simulated);
        assert_eq!(caps.gpio_light_source, Source::Simulated);
    }
}
