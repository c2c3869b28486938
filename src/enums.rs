use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three medical axes, indexed the way the reslice cursor stores its
/// planes (0 = sagittal, 1 = coronal, 2 = axial).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Sagittal,
    Coronal,
    Axial,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Sagittal,
        Orientation::Coronal,
        Orientation::Axial,
    ];

    pub fn index(self) -> usize {
        match self {
            Orientation::Sagittal => 0,
            Orientation::Coronal => 1,
            Orientation::Axial => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Plane normal of this axis when the cursor is at rest
    pub fn default_normal(self) -> DVec3 {
        match self {
            Orientation::Sagittal => DVec3::new(-1.0, 0.0, 0.0),
            Orientation::Coronal => DVec3::new(0.0, 1.0, 0.0),
            Orientation::Axial => DVec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Screen "up" of this axis when the cursor is at rest
    pub fn default_view_up(self) -> DVec3 {
        match self {
            Orientation::Sagittal | Orientation::Coronal => DVec3::Z,
            Orientation::Axial => DVec3::new(0.0, -1.0, 0.0),
        }
    }

    /// The two axes whose planes a cursor drag in this axis rotates
    pub fn others(self) -> [Orientation; 2] {
        match self {
            Orientation::Sagittal => [Orientation::Coronal, Orientation::Axial],
            Orientation::Coronal => [Orientation::Sagittal, Orientation::Axial],
            Orientation::Axial => [Orientation::Sagittal, Orientation::Coronal],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Sagittal => "sagittal",
            Orientation::Coronal => "coronal",
            Orientation::Axial => "axial",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

impl Interpolation {
    /// Maps the integer code used by preset tables (0 = nearest, 1 = linear).
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Interpolation::Nearest
        } else {
            Interpolation::Linear
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
