//! Landmark collections produced by the hand networks.

use nalgebra::Point2;

type Position = [f32; 3];

/// Landmark positions decoded from a network output.
///
/// Positions are `[x, y, z]`, normalized either to the crop the network ran on or, after
/// projection, to the full image. Z has the same scale as X.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Vec<Position>,
}

impl Landmarks {
    /// Decodes a flat network output buffer.
    ///
    /// `values` holds `dims` coordinates per landmark (2 or 3). All coordinates are divided by
    /// `input_size`, the side length of the square network input. Missing Z coordinates are 0.
    pub fn from_flat(values: &[f32], dims: usize, input_size: u32) -> anyhow::Result<Self> {
        if !(2..=3).contains(&dims) {
            anyhow::bail!("landmarks must have 2 or 3 coordinates, got {}", dims);
        }
        if values.len() % dims != 0 {
            anyhow::bail!(
                "network output of length {} is not a multiple of {}",
                values.len(),
                dims
            );
        }
        if input_size == 0 {
            anyhow::bail!("network input size must be non-zero");
        }

        let scale = input_size as f32;
        let positions = values
            .chunks_exact(dims)
            .map(|c| {
                let z = c.get(2).copied().unwrap_or(0.0);
                [c[0] / scale, c[1] / scale, z / scale]
            })
            .collect();
        Ok(Self { positions })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the X/Y position of the landmark at `index`, or [`None`] if out of range.
    pub fn point(&self, index: usize) -> Option<Point2<f32>> {
        self.positions.get(index).map(|&[x, y, _]| Point2::new(x, y))
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Replaces every position with the result of `f`.
    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in &mut self.positions {
            *pos = f(*pos);
        }
    }
}

/// Names for the hand landmarks output by the landmark network.
///
/// MCP joints are the knuckles near the palm, PIP and DIP are the middle and upper finger joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Number of landmarks in a full hand.
pub const NUM_HAND_LANDMARKS: usize = 21;

/// Pairs of landmarks connected by bones, for drawing.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flat_normalizes() {
        let lms = Landmarks::from_flat(&[128.0, 64.0, 256.0, 0.0], 2, 256).unwrap();
        assert_eq!(lms.len(), 2);
        assert_eq!(lms.positions(), &[[0.5, 0.25, 0.0], [1.0, 0.0, 0.0]]);
        assert_eq!(lms.point(0), Some(Point2::new(0.5, 0.25)));
        assert_eq!(lms.point(2), None);

        let lms = Landmarks::from_flat(&[112.0, 56.0, 28.0], 3, 224).unwrap();
        assert_eq!(lms.positions()[0][2], 0.125);
    }

    #[test]
    fn from_flat_rejects_bad_shapes() {
        assert!(Landmarks::from_flat(&[1.0, 2.0, 3.0], 2, 256).is_err());
        assert!(Landmarks::from_flat(&[1.0, 2.0], 4, 256).is_err());
        assert!(Landmarks::from_flat(&[1.0, 2.0], 2, 0).is_err());
        assert!(Landmarks::from_flat(&[], 3, 224).unwrap().is_empty());
    }

    #[test]
    fn map_positions() {
        let mut lms = Landmarks::from_flat(&[1.0, 2.0, 3.0, 4.0], 2, 1).unwrap();
        lms.map_positions(|[x, y, z]| [x * 2.0, y, z + 1.0]);
        assert_eq!(lms.positions(), &[[2.0, 2.0, 1.0], [6.0, 4.0, 1.0]]);
    }

    #[test]
    fn connectivity_indices_in_range() {
        for (a, b) in CONNECTIVITY {
            assert!((*a as usize) < NUM_HAND_LANDMARKS);
            assert!((*b as usize) < NUM_HAND_LANDMARKS);
        }
    }
}
