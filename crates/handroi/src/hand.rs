//! Two-stage hand landmark estimation.
//!
//! 1. The keypoint region ([`hand_roi`]) is cropped and fed to the re-crop network, which predicts
//!    two alignment points.
//! 2. The alignment points are projected into the image and turned into a refined region
//!    ([`alignment_rect`]).
//! 3. If a landmark network is configured, the refined region is cropped and the network's
//!    landmarks are projected into the image. A final region is derived from two of them.

use nalgebra::Point2;

use crate::image::{draw, rect::RotatedRect, Color, Crop, Image, Resolution};
use crate::landmark::{LandmarkIdx, Landmarks, CONNECTIVITY, NUM_HAND_LANDMARKS};
use crate::nn::{ColorMapper, Network};
use crate::projection::NormalizedRect;
use crate::recrop::{alignment_rect, AlignmentParams};
use crate::roi::{hand_roi, HandKeypoints, RoiParams};
use crate::timer::Timer;

/// Parameters of the [`HandLandmarker`] pipeline.
#[derive(Debug, Clone)]
pub struct HandPipelineParams {
    roi: RoiParams,
    alignment: AlignmentParams,
    recrop_size: u32,
    landmark_size: u32,
    landmark_dims: usize,
    anchors: (usize, usize),
}

impl Default for HandPipelineParams {
    fn default() -> Self {
        Self {
            roi: RoiParams::default(),
            alignment: AlignmentParams::default(),
            recrop_size: 256,
            landmark_size: 224,
            landmark_dims: 3,
            anchors: (
                LandmarkIdx::Wrist as usize,
                LandmarkIdx::MiddleFingerMcp as usize,
            ),
        }
    }
}

impl HandPipelineParams {
    pub fn with_roi(mut self, roi: RoiParams) -> Self {
        self.roi = roi;
        self
    }

    pub fn with_alignment(mut self, alignment: AlignmentParams) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets the side length of the crop fed to the re-crop network.
    ///
    /// Defaults to 256.
    pub fn with_recrop_size(mut self, size: u32) -> Self {
        self.recrop_size = size;
        self
    }

    /// Sets the side length of the crop fed to the landmark network.
    ///
    /// Defaults to 224.
    pub fn with_landmark_size(mut self, size: u32) -> Self {
        self.landmark_size = size;
        self
    }

    /// Sets the number of coordinates per landmark in the landmark network output, 2 or 3.
    ///
    /// Defaults to 3.
    pub fn with_landmark_dims(mut self, dims: usize) -> Self {
        self.landmark_dims = dims;
        self
    }

    /// Sets the landmark indices used to derive the final hand region: the first one becomes the
    /// center, the distance to the second one determines the size.
    ///
    /// Defaults to the wrist and the middle finger knuckle.
    pub fn with_anchors(mut self, center: usize, scale: usize) -> Self {
        self.anchors = (center, scale);
        self
    }

    pub fn roi(&self) -> &RoiParams {
        &self.roi
    }

    pub fn recrop_size(&self) -> u32 {
        self.recrop_size
    }

    pub fn landmark_size(&self) -> u32 {
        self.landmark_size
    }
}

/// Results of running the [`HandLandmarker`] on one image.
#[derive(Debug, Clone)]
pub struct HandEstimate {
    roi: RotatedRect,
    alignment_points: [Point2<f32>; 2],
    refined: RotatedRect,
    landmarks: Option<Landmarks>,
    final_rect: Option<RotatedRect>,
}

impl HandEstimate {
    /// Returns the region computed from the input keypoints, in pixel coordinates.
    pub fn roi(&self) -> &RotatedRect {
        &self.roi
    }

    /// Returns the two alignment points predicted by the re-crop network, in normalized image
    /// coordinates.
    pub fn alignment_points(&self) -> [Point2<f32>; 2] {
        self.alignment_points
    }

    /// Returns the region derived from the alignment points, in pixel coordinates.
    pub fn refined_rect(&self) -> &RotatedRect {
        &self.refined
    }

    /// Returns the hand landmarks in normalized image coordinates, if a landmark network ran.
    pub fn landmarks(&self) -> Option<&Landmarks> {
        self.landmarks.as_ref()
    }

    /// Returns the region derived from the final landmarks, in pixel coordinates.
    pub fn final_rect(&self) -> Option<&RotatedRect> {
        self.final_rect.as_ref()
    }

    /// Draws the regions and landmarks onto `target`, which must have the resolution of the image
    /// they were estimated on.
    pub fn draw(&self, target: &mut Image) {
        let res = target.resolution();
        let px = |p: Point2<f32>| {
            (
                (p.x * res.width() as f32).round() as i32,
                (p.y * res.height() as f32).round() as i32,
            )
        };

        draw::rotated_rect(target, self.roi).color(Color::YELLOW);
        draw::rotated_rect(target, self.refined).color(Color::RED);
        if let Some(rect) = self.final_rect {
            draw::rotated_rect(target, rect).color(Color::GREEN);
        }

        let [a, b] = self.alignment_points.map(px);
        draw::line(target, a.0, a.1, b.0, b.1).color(Color::from_rgb8(127, 127, 127));
        draw::marker(target, a.0, a.1).color(Color::RED);
        draw::marker(target, b.0, b.1).color(Color::BLUE);

        if let Some(landmarks) = &self.landmarks {
            for (a, b) in CONNECTIVITY {
                if let (Some(a), Some(b)) =
                    (landmarks.point(*a as usize), landmarks.point(*b as usize))
                {
                    let (a, b) = (px(a), px(b));
                    draw::line(target, a.0, a.1, b.0, b.1).color(Color::GREEN);
                }
            }
            for i in 0..landmarks.len() {
                if let Some(p) = landmarks.point(i) {
                    let (x, y) = px(p);
                    draw::marker(target, x, y).size(3);
                }
            }
        }

        let (x, y) = (self.roi.center().x as i32, self.roi.center().y as i32);
        let label = format!("{:.1} deg", self.refined.rotation_radians().to_degrees());
        draw::text(target, x, y, &label).align_top();
    }
}

/// Runs the re-crop network and, optionally, the landmark network on hand keypoints.
pub struct HandLandmarker {
    recrop: Box<dyn Network>,
    landmark: Option<Box<dyn Network>>,
    params: HandPipelineParams,
    mapper: ColorMapper,
    t_crop: Timer,
    t_infer: Timer,
    t_project: Timer,
}

impl HandLandmarker {
    /// Creates a landmarker using only the re-crop network.
    ///
    /// Returns an error if the network input does not match the configured crop size.
    pub fn new<N: Network + 'static>(recrop: N, params: HandPipelineParams) -> anyhow::Result<Self> {
        check_input(&recrop, params.recrop_size, "re-crop")?;
        Ok(Self {
            recrop: Box::new(recrop),
            landmark: None,
            params,
            mapper: ColorMapper::linear(0.0..=1.0),
            t_crop: Timer::new("crop"),
            t_infer: Timer::new("infer"),
            t_project: Timer::new("project"),
        })
    }

    /// Adds a landmark network that runs on the refined region.
    pub fn with_landmark_network<N: Network + 'static>(
        mut self,
        landmark: N,
    ) -> anyhow::Result<Self> {
        check_input(&landmark, self.params.landmark_size, "landmark")?;
        if !(2..=3).contains(&self.params.landmark_dims) {
            anyhow::bail!(
                "landmarks must have 2 or 3 coordinates, got {}",
                self.params.landmark_dims
            );
        }
        self.landmark = Some(Box::new(landmark));
        Ok(self)
    }

    pub fn params(&self) -> &HandPipelineParams {
        &self.params
    }

    /// Returns the timers of the crop, inference and projection stages.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_crop, &self.t_infer, &self.t_project]
    }

    /// Runs the pipeline on `image` for the hand described by `keypoints`.
    ///
    /// If the keypoints are rejected, the returned error wraps a
    /// [`RoiRejection`][crate::roi::RoiRejection] that callers can recover with
    /// [`anyhow::Error::downcast_ref`].
    pub fn estimate(
        &self,
        image: &Image,
        keypoints: &HandKeypoints,
    ) -> anyhow::Result<HandEstimate> {
        let res = image.resolution();
        let roi = hand_roi(keypoints, &self.params.roi)?;

        let crop = self
            .t_crop
            .time(|| Crop::extract(image, &roi, self.params.recrop_size))?;
        let outputs = self
            .t_infer
            .time(|| self.recrop.estimate(crop.image(), &self.mapper))?;
        let points = outputs.flat(0)?;
        if points.len() < 4 {
            anyhow::bail!(
                "re-crop network output has {} values, expected at least 4",
                points.len()
            );
        }

        let alignment_points = self.t_project.time(|| {
            let size = self.params.recrop_size as f32;
            let rect = NormalizedRect::from_pixel_rect(&roi, res);
            [
                rect.project_point(Point2::new(points[0] / size, points[1] / size)),
                rect.project_point(Point2::new(points[2] / size, points[3] / size)),
            ]
        });
        let [center, scale] = alignment_points.map(|p| to_pixels(p, res));
        let refined = alignment_rect(center, scale, &self.params.alignment)?;

        let mut estimate = HandEstimate {
            roi,
            alignment_points,
            refined,
            landmarks: None,
            final_rect: None,
        };

        if let Some(landmark) = &self.landmark {
            let crop = self
                .t_crop
                .time(|| Crop::extract(image, &refined, self.params.landmark_size))?;
            let outputs = self
                .t_infer
                .time(|| landmark.estimate(crop.image(), &self.mapper))?;
            let values = outputs.flat(0)?;
            let dims = self.params.landmark_dims;
            if values.len() != NUM_HAND_LANDMARKS * dims {
                anyhow::bail!(
                    "landmark network output has {} values, expected {} landmarks with {} coordinates",
                    values.len(),
                    NUM_HAND_LANDMARKS,
                    dims
                );
            }
            let mut landmarks = Landmarks::from_flat(&values, dims, self.params.landmark_size)?;

            self.t_project.time(|| {
                NormalizedRect::from_pixel_rect(&refined, res).project_landmarks(&mut landmarks)
            });

            let (c, s) = self.params.anchors;
            estimate.final_rect = match (landmarks.point(c), landmarks.point(s)) {
                (Some(c), Some(s)) => {
                    match alignment_rect(to_pixels(c, res), to_pixels(s, res), &self.params.alignment)
                    {
                        Ok(rect) => Some(rect),
                        Err(e) => {
                            log::debug!("no final hand region: {}", e);
                            None
                        }
                    }
                }
                _ => {
                    log::warn!(
                        "anchor landmarks {:?} out of range for {} landmarks",
                        self.params.anchors,
                        landmarks.len()
                    );
                    None
                }
            };
            estimate.landmarks = Some(landmarks);
        }

        Ok(estimate)
    }
}

fn to_pixels(p: Point2<f32>, res: Resolution) -> Point2<f32> {
    Point2::new(p.x * res.width() as f32, p.y * res.height() as f32)
}

fn check_input(net: &dyn Network, size: u32, what: &str) -> anyhow::Result<()> {
    let res = net.input_resolution();
    if res != Resolution::square(size) {
        anyhow::bail!(
            "{} network takes {} inputs, but the pipeline is configured for {}x{} crops",
            what,
            res,
            size,
            size
        );
    }
    Ok(())
}
