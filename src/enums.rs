use crate::error::InputError;
use crate::geometry::Vector3D;
use serde::{Deserialize, Serialize};

/// Reformation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Per-point direction field, surface centered on the centerline
    Straight,
    /// Fixed sweep axis across the whole volume extent
    Stretched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Select the axis whose component of a one-hot vector is 1.
    pub fn from_one_hot(dir: [i32; 3]) -> Result<Self, InputError> {
        match dir {
            [1, 0, 0] => Ok(Axis::X),
            [0, 1, 0] => Ok(Axis::Y),
            [0, 0, 1] => Ok(Axis::Z),
            _ => Err(InputError::InvalidSweepAxis(dir)),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vector3D {
        match self {
            Axis::X => Vector3D::x(),
            Axis::Y => Vector3D::y(),
            Axis::Z => Vector3D::z(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_axis() {
        assert_eq!(Axis::from_one_hot([0, 1, 0]), Ok(Axis::Y));
        assert_eq!(Axis::from_one_hot([0, 0, 1]).map(Axis::index), Ok(2));
        assert_eq!(
            Axis::from_one_hot([1, 1, 0]),
            Err(InputError::InvalidSweepAxis([1, 1, 0]))
        );
        assert!(Axis::from_one_hot([0, 0, 0]).is_err());
        assert!(Axis::from_one_hot([0, -1, 0]).is_err());
    }

    #[test]
    fn test_method_names() {
        let method: Method = serde_json::from_str("\"stretched\"").unwrap();
        assert_eq!(method, Method::Stretched);
        let method: Method = serde_json::from_str("\"straight\"").unwrap();
        assert_eq!(method, Method::Straight);
    }
}
