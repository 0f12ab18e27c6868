//! Motion sensor input.
//!
//! A passive-infrared sensor drives a single digital line high while it sees
//! motion. The line is read through the Linux sysfs GPIO interface:
//!
//! - `<root>/export` / `<root>/unexport` claim and release the line
//! - `<root>/gpio<N>/direction` is set to `in`
//! - `<root>/gpio<N>/value` reads `0` or `1`

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::SensorError;

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Something that can be asked "is there motion right now?".
///
/// Sampling is a quick blocking read and happens on the control task.
pub trait MotionSampler: Send {
    fn sample(&mut self) -> Result<bool, SensorError>;

    /// Give the input line back to the system. Further samples fail.
    fn release(&mut self);
}

/// How the configured pin number is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinNumbering {
    /// Physical position on the 40-pin header.
    Board,
    /// Broadcom GPIO number.
    Bcm,
}

impl FromStr for PinNumbering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "board" => Ok(PinNumbering::Board),
            "bcm" => Ok(PinNumbering::Bcm),
            other => Err(format!("expected `board` or `bcm`, got `{other}`")),
        }
    }
}

/// Map a physical header pin to its BCM GPIO number.
///
/// Power, ground and ID EEPROM pins have no GPIO and return `None`.
pub fn board_to_bcm(pin: u8) -> Option<u32> {
    let bcm = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(bcm)
}

/// Resolve a configured pin to the sysfs line number.
///
/// `base` is the chip's sysfs offset (non-zero on newer kernels, e.g. 512).
pub fn resolve_line(pin: u8, numbering: PinNumbering, base: u32) -> Result<u32, SensorError> {
    let bcm = match numbering {
        PinNumbering::Board => board_to_bcm(pin).ok_or(SensorError::NotGpio(pin))?,
        PinNumbering::Bcm => u32::from(pin),
    };
    Ok(base + bcm)
}

/// Motion sampler backed by a sysfs GPIO line.
#[derive(Debug)]
pub struct SysfsMotionSampler {
    root: PathBuf,
    line: u32,
    released: bool,
}

impl SysfsMotionSampler {
    /// Claim `line` under the default sysfs root and configure it as an input.
    pub fn open(line: u32) -> Result<Self, SensorError> {
        Self::open_at(SYSFS_GPIO_ROOT, line)
    }

    /// Claim `line` under a custom sysfs root.
    pub fn open_at(root: impl AsRef<Path>, line: u32) -> Result<Self, SensorError> {
        let root = root.as_ref().to_path_buf();
        let io = |source| SensorError::Io { line, source };

        if !root.join(format!("gpio{line}")).exists() {
            match fs::write(root.join("export"), line.to_string()) {
                Ok(()) => {}
                // Already exported by someone else.
                Err(e) if e.kind() == ErrorKind::ResourceBusy => {}
                Err(e) => return Err(io(e)),
            }
        }

        fs::write(root.join(format!("gpio{line}/direction")), "in").map_err(io)?;

        info!(line, "Motion sensor line claimed");
        Ok(Self {
            root,
            line,
            released: false,
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn value_path(&self) -> PathBuf {
        self.root.join(format!("gpio{}/value", self.line))
    }
}

impl MotionSampler for SysfsMotionSampler {
    fn sample(&mut self) -> Result<bool, SensorError> {
        if self.released {
            return Err(SensorError::Released);
        }

        let raw = fs::read_to_string(self.value_path()).map_err(|source| SensorError::Io {
            line: self.line,
            source,
        })?;

        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(SensorError::InvalidValue {
                line: self.line,
                value: other.to_string(),
            }),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::write(self.root.join("unexport"), self.line.to_string()) {
            Ok(()) => debug!(line = self.line, "Motion sensor line released"),
            Err(e) => warn!(line = self.line, error = %e, "Failed to release motion sensor line"),
        }
    }
}

impl Drop for SysfsMotionSampler {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(line: u32) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(format!("gpio{line}"))).unwrap();
        fs::write(dir.path().join(format!("gpio{line}/value")), "0\n").unwrap();
        dir
    }

    #[test]
    fn test_board_pin_mapping() {
        assert_eq!(board_to_bcm(29), Some(5));
        assert_eq!(board_to_bcm(7), Some(4));
        assert_eq!(board_to_bcm(40), Some(21));
        assert_eq!(board_to_bcm(1), None);
        assert_eq!(board_to_bcm(6), None);
        assert_eq!(board_to_bcm(27), None);
    }

    #[test]
    fn test_resolve_line() {
        assert_eq!(resolve_line(29, PinNumbering::Board, 0).unwrap(), 5);
        assert_eq!(resolve_line(29, PinNumbering::Board, 512).unwrap(), 517);
        assert_eq!(resolve_line(17, PinNumbering::Bcm, 0).unwrap(), 17);
        assert!(matches!(
            resolve_line(2, PinNumbering::Board, 0),
            Err(SensorError::NotGpio(2))
        ));
    }

    #[test]
    fn test_pin_numbering_parse() {
        assert_eq!("BOARD".parse::<PinNumbering>().unwrap(), PinNumbering::Board);
        assert_eq!("bcm".parse::<PinNumbering>().unwrap(), PinNumbering::Bcm);
        assert!("wiringpi".parse::<PinNumbering>().is_err());
    }

    #[test]
    fn test_open_sets_direction_and_samples() {
        let dir = fake_sysfs(5);
        let mut sampler = SysfsMotionSampler::open_at(dir.path(), 5).unwrap();

        let direction = fs::read_to_string(dir.path().join("gpio5/direction")).unwrap();
        assert_eq!(direction, "in");

        assert!(!sampler.sample().unwrap());
        fs::write(dir.path().join("gpio5/value"), "1\n").unwrap();
        assert!(sampler.sample().unwrap());
    }

    #[test]
    fn test_garbage_value_is_an_error() {
        let dir = fake_sysfs(5);
        let mut sampler = SysfsMotionSampler::open_at(dir.path(), 5).unwrap();
        fs::write(dir.path().join("gpio5/value"), "high").unwrap();

        assert!(matches!(
            sampler.sample(),
            Err(SensorError::InvalidValue { line: 5, .. })
        ));
    }

    #[test]
    fn test_release_unexports_once() {
        let dir = fake_sysfs(5);
        let mut sampler = SysfsMotionSampler::open_at(dir.path(), 5).unwrap();

        sampler.release();
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "5");
        assert!(matches!(sampler.sample(), Err(SensorError::Released)));

        fs::remove_file(dir.path().join("unexport")).unwrap();
        drop(sampler);
        assert!(!dir.path().join("unexport").exists());
    }

    #[test]
    fn test_drop_releases_line() {
        let dir = fake_sysfs(5);
        {
            let _sampler = SysfsMotionSampler::open_at(dir.path(), 5).unwrap();
        }
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "5");
    }
}
