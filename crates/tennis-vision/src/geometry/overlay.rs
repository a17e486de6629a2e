//! Drawing court lines onto frames, for debug overlays and synthetic footage.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tennis_models::{court, Point2};

use super::Homography;

/// A line segment in court metres.
pub type CourtSegment = (Point2, Point2);

/// Every painted line of a singles/doubles court, plus the net.
pub fn court_segments() -> Vec<CourtSegment> {
    let p = Point2::new;
    let far_service = court::NET_Y - court::SERVICE_LINE_FROM_NET;
    let near_service = court::NET_Y + court::SERVICE_LINE_FROM_NET;
    vec![
        (p(0.0, 0.0), p(court::WIDTH, 0.0)),
        (p(0.0, court::LENGTH), p(court::WIDTH, court::LENGTH)),
        (p(0.0, 0.0), p(0.0, court::LENGTH)),
        (p(court::WIDTH, 0.0), p(court::WIDTH, court::LENGTH)),
        (p(court::SINGLES_LEFT, 0.0), p(court::SINGLES_LEFT, court::LENGTH)),
        (p(court::SINGLES_RIGHT, 0.0), p(court::SINGLES_RIGHT, court::LENGTH)),
        (p(court::SINGLES_LEFT, far_service), p(court::SINGLES_RIGHT, far_service)),
        (p(court::SINGLES_LEFT, near_service), p(court::SINGLES_RIGHT, near_service)),
        (p(court::CENTER_X, far_service), p(court::CENTER_X, near_service)),
        (p(0.0, court::NET_Y), p(court::WIDTH, court::NET_Y)),
    ]
}

/// Draw court-space segments through `court_to_pixel` with the given stroke width.
pub fn draw_segments(
    image: &mut RgbImage,
    court_to_pixel: &Homography,
    segments: &[CourtSegment],
    thickness: u32,
    color: Rgb<u8>,
) {
    let half = thickness as i32 / 2;
    for (a, b) in segments {
        let (Some(pa), Some(pb)) = (court_to_pixel.project(*a), court_to_pixel.project(*b)) else {
            continue;
        };
        for dx in -half..=half {
            for dy in -half..=half {
                draw_line_segment_mut(
                    image,
                    ((pa.x + dx as f64) as f32, (pa.y + dy as f64) as f32),
                    ((pb.x + dx as f64) as f32, (pb.y + dy as f64) as f32),
                    color,
                );
            }
        }
    }
}

/// Full court in white on the given image.
pub fn draw_court(image: &mut RgbImage, court_to_pixel: &Homography, thickness: u32) {
    draw_segments(
        image,
        court_to_pixel,
        &court_segments(),
        thickness,
        Rgb([255, 255, 255]),
    );
}
