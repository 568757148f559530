use std::f32::consts::{PI, TAU};

use approx::assert_abs_diff_eq;
use handroi::{
    image::{
        rect::{Rect, RotatedRect},
        Color, Crop, Image, Resolution,
    },
    num::normalize_radians,
    projection::NormalizedRect,
    recrop::{alignment_rect, AlignmentParams},
    roi::{hand_roi, HandKeypoints, RoiParams, RoiRejection},
};
use nalgebra::{Point2, Vector2};

fn keypoints(wrist: [f32; 2], pinky: [f32; 2], index: [f32; 2], confidence: f32) -> HandKeypoints {
    HandKeypoints {
        wrist: wrist.into(),
        pinky: pinky.into(),
        index: index.into(),
        confidence,
    }
}

fn same_angle(a: f32, b: f32) -> bool {
    let d = (a - b).abs();
    d < 1e-3 || (TAU - d).abs() < 1e-3
}

#[test]
fn angle_normalization() {
    let mut rng = fastrand::Rng::with_seed(0x0123_4567);
    for _ in 0..1000 {
        let angle = (rng.f32() - 0.5) * 200.0;
        let norm = normalize_radians(angle);
        assert!((-PI..PI).contains(&norm), "{angle} -> {norm}");
        assert!(same_angle(norm, normalize_radians(angle + TAU)));
        assert!(same_angle(norm, normalize_radians(angle - 3.0 * TAU)));
        assert_abs_diff_eq!(norm.sin(), angle.sin(), epsilon = 1e-3);
        assert_abs_diff_eq!(norm.cos(), angle.cos(), epsilon = 1e-3);
    }
}

#[test]
fn crop_center_projects_to_rect_center() {
    for rotation in [0.0, 0.3, -1.2, PI / 2.0, -PI] {
        let rect = NormalizedRect::new(Point2::new(0.5, 0.5), Vector2::new(0.4, 0.4), rotation);
        assert_eq!(rect.project_point(Point2::new(0.5, 0.5)), Point2::new(0.5, 0.5));

        let rect = NormalizedRect::new(Point2::new(0.3, 0.7), Vector2::new(0.2, 0.1), rotation);
        assert_eq!(rect.project_point(Point2::new(0.5, 0.5)), Point2::new(0.3, 0.7));
    }
}

#[test]
fn corner_round_trip() {
    let res = Resolution::new(640, 480);
    let image = Image::filled(res, Color::WHITE);
    let size = 256;

    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..50 {
        let side = 20.0 + rng.f32() * 400.0;
        let rect = RotatedRect::new(
            Rect::from_center(rng.f32() * 640.0, rng.f32() * 480.0, side, side),
            (rng.f32() - 0.5) * TAU,
        );
        let crop = Crop::extract(&image, &rect, size).unwrap();
        let projector = NormalizedRect::from_pixel_rect(&rect, res);

        for corner in rect.rotated_corners() {
            let in_crop = crop.transform().apply(corner);
            let normalized = Point2::new(in_crop.x / size as f32, in_crop.y / size as f32);
            let projected = projector.project_point(normalized);
            let expected = Point2::new(corner.x / 640.0, corner.y / 480.0);
            assert_abs_diff_eq!(projected, expected, epsilon = 1e-4);
        }
    }
}

#[test]
fn corners_land_on_crop_corners() {
    let image = Image::filled(Resolution::new(640, 480), Color::WHITE);
    let rect = RotatedRect::new(Rect::from_center(300.0, 200.0, 120.0, 120.0), 0.8);
    let crop = Crop::extract(&image, &rect, 64).unwrap();

    let [tl, tr, br, bl] = rect.rotated_corners().map(|c| crop.transform().apply(c));
    assert_abs_diff_eq!(tl, Point2::new(0.0, 0.0), epsilon = 1e-3);
    assert_abs_diff_eq!(tr, Point2::new(64.0, 0.0), epsilon = 1e-3);
    assert_abs_diff_eq!(br, Point2::new(64.0, 64.0), epsilon = 1e-3);
    assert_abs_diff_eq!(bl, Point2::new(0.0, 64.0), epsilon = 1e-3);
}

#[test]
fn threshold_gating() {
    let params = RoiParams::default();
    let threshold = params.threshold();
    let wrist = [100.0, 200.0];
    let fingers = [100.0, 100.0];

    let err = hand_roi(&keypoints(wrist, fingers, fingers, threshold), &params).unwrap_err();
    assert!(matches!(err, RoiRejection::BelowThreshold { .. }));

    let just_above = f32::from_bits(threshold.to_bits() + 1);
    assert!(hand_roi(&keypoints(wrist, fingers, fingers, just_above), &params).is_ok());

    let err = hand_roi(&keypoints(wrist, fingers, fingers, f32::NAN), &params).unwrap_err();
    assert!(matches!(err, RoiRejection::BelowThreshold { .. }));
}

#[test]
fn degenerate_keypoints() {
    let params = RoiParams::default();
    let p = [50.0, 50.0];
    let err = hand_roi(&keypoints(p, p, p, 0.9), &params).unwrap_err();
    assert_eq!(err, RoiRejection::Degenerate { box_size: 0.0 });

    let nan = [f32::NAN, 0.0];
    let err = hand_roi(&keypoints(p, nan, p, 0.9), &params).unwrap_err();
    assert!(matches!(err, RoiRejection::Degenerate { .. }));

    let err = alignment_rect(p.into(), p.into(), &AlignmentParams::default()).unwrap_err();
    assert!(matches!(err, RoiRejection::Degenerate { .. }));
}

#[test]
fn alignment_rect_is_bit_identical() {
    let params = AlignmentParams::default();
    let mut rng = fastrand::Rng::with_seed(99);
    for _ in 0..100 {
        let center = Point2::new(rng.f32() * 640.0, rng.f32() * 480.0);
        let scale = Point2::new(rng.f32() * 640.0, rng.f32() * 480.0);
        let (Ok(a), Ok(b)) = (
            alignment_rect(center, scale, &params),
            alignment_rect(center, scale, &params),
        ) else {
            continue;
        };

        assert_eq!(a.center().x.to_bits(), b.center().x.to_bits());
        assert_eq!(a.center().y.to_bits(), b.center().y.to_bits());
        assert_eq!(a.size().x.to_bits(), b.size().x.to_bits());
        assert_eq!(a.rotation_radians().to_bits(), b.rotation_radians().to_bits());
    }
}

#[test]
fn roi_crop_is_upright() {
    // A hand pointing to the right of the image: after cropping, the fingers point up.
    let res = Resolution::new(400, 400);
    let image = Image::from_fn(res, |x, _| if x >= 200 { Color::RED } else { Color::BLUE });
    let kp = keypoints([150.0, 200.0], [200.0, 200.0], [200.0, 200.0], 0.9);
    let rect = hand_roi(&kp, &RoiParams::default()).unwrap();
    assert_abs_diff_eq!(rect.rotation_radians(), PI / 2.0, epsilon = 1e-5);

    let crop = Crop::extract(&image, &rect, 32).unwrap();
    assert_eq!(crop.image().get(16, 2), Color::RED);
    assert_eq!(crop.image().get(16, 29), Color::BLUE);
}
