// SPDX-License-Identifier: GPL-3.0-only

//! Interface orientation and the view-space to device-space point mapping
//! used for tap-to-focus

use crate::errors::{CameraError, ParameterError};
use serde::{Deserialize, Serialize};

/// Orientation of the host interface relative to the device
///
/// Capture devices deliver frames in their sensor-native (landscape)
/// orientation; this enum describes how the interface is rotated relative to
/// that, which drives the focus-point mapping below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Upright portrait, home indicator at the bottom
    #[default]
    #[serde(rename = "portrait")]
    Portrait,
    /// Landscape, home indicator on the left
    #[serde(rename = "landscape-left")]
    LandscapeLeft,
    /// Upside-down portrait, home indicator at the top
    #[serde(rename = "portrait-upside-down")]
    PortraitUpsideDown,
    /// Landscape, home indicator on the right
    #[serde(rename = "landscape-right")]
    LandscapeRight,
}

impl Orientation {
    /// Parse from the wire union used by host applications
    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value {
            "portrait" => Ok(Orientation::Portrait),
            "landscape-left" => Ok(Orientation::LandscapeLeft),
            "portrait-upside-down" => Ok(Orientation::PortraitUpsideDown),
            "landscape-right" => Ok(Orientation::LandscapeRight),
            other => Err(ParameterError::Invalid {
                name: "orientation".into(),
                value: other.into(),
            }
            .into()),
        }
    }

    /// Clockwise rotation in degrees relative to portrait
    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Portrait => 0,
            Orientation::LandscapeLeft => 90,
            Orientation::PortraitUpsideDown => 180,
            Orientation::LandscapeRight => 270,
        }
    }

    /// The orientation one 90° clockwise step further
    pub fn rotated_right(&self) -> Orientation {
        match self {
            Orientation::Portrait => Orientation::LandscapeLeft,
            Orientation::LandscapeLeft => Orientation::PortraitUpsideDown,
            Orientation::PortraitUpsideDown => Orientation::LandscapeRight,
            Orientation::LandscapeRight => Orientation::Portrait,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Orientation::Portrait => "portrait",
            Orientation::LandscapeLeft => "landscape-left",
            Orientation::PortraitUpsideDown => "portrait-upside-down",
            Orientation::LandscapeRight => "landscape-right",
        };
        write!(f, "{}", value)
    }
}

/// A 2D point; either in view pixels or normalized [0,1] device coordinates
/// depending on context
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Convert a tap point in view coordinates to normalized device coordinates
///
/// Device coordinates are sensor-native: (0,0) is the top-left of the
/// landscape frame, (1,1) the bottom-right. The view is rotated by
/// `orientation` relative to that frame, and front cameras preview mirrored,
/// so the x axis flips for them.
pub fn view_point_to_device_point(
    point: Point,
    view_width: f64,
    view_height: f64,
    orientation: Orientation,
    mirrored: bool,
) -> Point {
    // normalize into the view's own space first
    let nx = (point.x / view_width).clamp(0.0, 1.0);
    let ny = (point.y / view_height).clamp(0.0, 1.0);

    // undo the interface rotation to land in the sensor frame
    let rotated = match orientation {
        Orientation::Portrait => Point::new(ny, 1.0 - nx),
        Orientation::LandscapeLeft => Point::new(nx, ny),
        Orientation::PortraitUpsideDown => Point::new(1.0 - ny, nx),
        Orientation::LandscapeRight => Point::new(1.0 - nx, 1.0 - ny),
    };

    if mirrored {
        Point::new(rotated.x, 1.0 - rotated.y)
    } else {
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parsing_roundtrip() {
        for value in ["portrait", "landscape-left", "portrait-upside-down", "landscape-right"] {
            let orientation = Orientation::parse(value).unwrap();
            assert_eq!(orientation.to_string(), value);
        }
        assert!(Orientation::parse("sideways").is_err());
    }

    #[test]
    fn test_rotation_stepping_cycles() {
        let mut orientation = Orientation::Portrait;
        for _ in 0..4 {
            orientation = orientation.rotated_right();
        }
        assert_eq!(orientation, Orientation::Portrait);
        assert_eq!(Orientation::Portrait.rotated_right().degrees(), 90);
    }

    #[test]
    fn test_portrait_center_maps_to_center() {
        let device = view_point_to_device_point(
            Point::new(50.0, 100.0),
            100.0,
            200.0,
            Orientation::Portrait,
            false,
        );
        assert!((device.x - 0.5).abs() < 1e-9);
        assert!((device.y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_portrait_corner_mapping() {
        // top-left of a portrait view lands on the bottom-left of the
        // landscape sensor frame
        let device = view_point_to_device_point(
            Point::new(0.0, 0.0),
            100.0,
            200.0,
            Orientation::Portrait,
            false,
        );
        assert!((device.x - 0.0).abs() < 1e-9);
        assert!((device.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_landscape_left_is_identity() {
        let device = view_point_to_device_point(
            Point::new(25.0, 75.0),
            100.0,
            100.0,
            Orientation::LandscapeLeft,
            false,
        );
        assert!((device.x - 0.25).abs() < 1e-9);
        assert!((device.y - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_mirrored_front_camera_flips() {
        let plain = view_point_to_device_point(
            Point::new(25.0, 75.0),
            100.0,
            100.0,
            Orientation::LandscapeLeft,
            false,
        );
        let mirrored = view_point_to_device_point(
            Point::new(25.0, 75.0),
            100.0,
            100.0,
            Orientation::LandscapeLeft,
            true,
        );
        assert!((mirrored.y - (1.0 - plain.y)).abs() < 1e-9);
        assert!((mirrored.x - plain.x).abs() < 1e-9);
    }

    #[test]
    fn test_points_outside_view_are_clamped() {
        let device = view_point_to_device_point(
            Point::new(-10.0, 500.0),
            100.0,
            200.0,
            Orientation::LandscapeLeft,
            false,
        );
        assert_eq!(device, Point::new(0.0, 1.0));
    }
}
