use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::font;
use super::result::{BoundingBox, Detection};
use crate::frame::Image;

const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;

/// Label text drawn above a detection box.
pub fn label_for(detection: &Detection) -> String {
    format!("{}: {:.2}", detection.threat_type(), detection.confidence())
}

/// Font scale for an image: 1 up to 799 rows, at most 3.
pub fn label_scale(image: &Image) -> u32 {
    (image.height() / 400).clamp(1, 3)
}

/// Copy of `image` with every detection drawn on it.
pub fn annotate(image: &Image, detections: &[Detection]) -> Image {
    let mut canvas = image.clone();
    if canvas.width() == 0 || canvas.height() == 0 {
        return canvas;
    }
    let scale = label_scale(&canvas);
    for detection in detections {
        draw_detection(&mut canvas, detection, scale);
    }
    canvas
}

/// Whether any part of `bbox` falls inside a `width`×`height` frame.
fn overlaps_frame(bbox: &BoundingBox, width: u32, height: u32) -> bool {
    bbox.x1() < width as f32 && bbox.y1() < height as f32 && bbox.x2() > 0.0 && bbox.y2() > 0.0
}

fn draw_detection(canvas: &mut Image, detection: &Detection, scale: u32) {
    let color = detection.threat_type().color();
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let bbox = detection.bbox();
    if !overlaps_frame(bbox, canvas.width(), canvas.height()) {
        return;
    }

    let x1 = (bbox.x1().floor() as i32).clamp(0, width - 1);
    let y1 = (bbox.y1().floor() as i32).clamp(0, height - 1);
    let x2 = (bbox.x2().ceil() as i32).clamp(x1 + 1, width);
    let y2 = (bbox.y2().ceil() as i32).clamp(y1 + 1, height);
    let (w, h) = (x2 - x1, y2 - y1);

    for inset in 0..BOX_THICKNESS {
        let (iw, ih) = (w - 2 * inset, h - 2 * inset);
        if iw <= 0 || ih <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x1 + inset, y1 + inset).of_size(iw as u32, ih as u32),
            color,
        );
    }

    let text = label_for(detection);
    let (text_w, text_h) = font::text_size(&text, scale);
    let bg_w = text_w as i32 + 2 * LABEL_PADDING;
    let bg_h = text_h as i32 + 2 * LABEL_PADDING;

    // Above the box when it fits, otherwise just inside its top edge.
    let bg_y = if y1 - bg_h >= 0 { y1 - bg_h } else { y1 };
    let bg_x = x1.min(width - bg_w).max(0);
    let bg_w = bg_w.min(width - bg_x).max(1);
    let bg_h = bg_h.min(height - bg_y).max(1);

    draw_filled_rect_mut(
        canvas,
        Rect::at(bg_x, bg_y).of_size(bg_w as u32, bg_h as u32),
        color,
    );
    font::draw_text(
        canvas,
        (bg_x + LABEL_PADDING) as i64,
        (bg_y + LABEL_PADDING) as i64,
        &text,
        scale,
        LABEL_TEXT,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::taxonomy::ThreatType;

    fn det(t: ThreatType, conf: f64, bbox: [f32; 4]) -> Detection {
        Detection::new(t, conf, BoundingBox::from_corners(bbox).unwrap()).unwrap()
    }

    #[test]
    fn label_uses_two_decimals() {
        let d = det(ThreatType::SuspiciousObject, 0.456, [0.0, 0.0, 5.0, 5.0]);
        assert_eq!(label_for(&d), "suspicious_object: 0.46");
    }

    #[test]
    fn no_detections_leaves_image_untouched() {
        let image = Image::from_fn(32, 32, |x, y| Rgb([x as u8, y as u8, 7]));
        assert_eq!(annotate(&image, &[]), image);
    }

    #[test]
    fn box_outline_uses_threat_colour() {
        let image = Image::from_pixel(200, 200, Rgb([0, 0, 0]));
        let d = det(ThreatType::Submarine, 0.92, [100.0, 100.0, 180.0, 180.0]);
        let out = annotate(&image, &[d]);
        assert_eq!(out.get_pixel(100, 150).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(101, 150).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(179, 150).0, [255, 0, 0]);
        // Interior stays untouched.
        assert_eq!(out.get_pixel(140, 150).0, [0, 0, 0]);
        // Label background sits above the box.
        assert_ne!(out.get_pixel(100, 90).0, [0, 0, 0]);
    }

    #[test]
    fn label_is_clamped_inside_the_image() {
        let image = Image::from_pixel(60, 40, Rgb([0, 0, 0]));
        let d = det(ThreatType::Drone, 0.5, [50.0, 0.0, 60.0, 10.0]);
        let out = annotate(&image, &[d]);
        assert_eq!(out.dimensions(), (60, 40));
        assert!(out.get_pixel(0, 0).0 != [0, 0, 0] || out.get_pixel(59, 1).0 != [0, 0, 0]);
    }

    #[test]
    fn boxes_outside_the_frame_are_not_drawn() {
        let image = Image::from_pixel(100, 100, Rgb([0, 0, 0]));
        let outside = [
            det(ThreatType::Submarine, 0.9, [200.0, 200.0, 300.0, 300.0]),
            det(ThreatType::Diver, 0.8, [-40.0, 10.0, 0.0, 30.0]),
            det(ThreatType::Drone, 0.7, [10.0, 100.0, 30.0, 140.0]),
        ];
        assert_eq!(annotate(&image, &outside), image);
    }

    #[test]
    fn boxes_past_the_edge_do_not_panic() {
        let image = Image::from_pixel(20, 20, Rgb([0, 0, 0]));
        let d = det(ThreatType::Mine, 0.9, [-50.0, -50.0, 500.0, 500.0]);
        let out = annotate(&image, &[d]);
        assert_eq!(out.get_pixel(0, 10).0, [255, 165, 0]);
    }
}
