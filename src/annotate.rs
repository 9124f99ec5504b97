//! Frame annotation: a class-coloured box per detection plus a
//! `"<name> <conf>%"` label drawn with a built-in 5×7 bitmap font.

use image::{Rgb, RgbImage};

use crate::classes::ClassTable;
use crate::engine::Detection;

const BOX_THICKNESS: u32 = 2;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_ADVANCE: u32 = 6;
/// Band height: 7 glyph rows plus one pixel of padding above and below.
const LABEL_HEIGHT: u32 = 9;
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const PALETTE: [Rgb<u8>; 8] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([255, 178, 29]),
    Rgb([207, 210, 49]),
    Rgb([72, 249, 10]),
    Rgb([26, 147, 52]),
    Rgb([0, 212, 187]),
];

pub fn class_colour(class_id: u32) -> Rgb<u8> {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// `"lion 87%"`; IDs missing from the table render as `"class <id>"`.
pub fn label_text(det: &Detection, table: &ClassTable) -> String {
    let name = table
        .name_of(det.class_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("class {}", det.class_id));
    format!("{} {:.0}%", name, det.confidence * 100.0)
}

/// Pixel box (left, top, right, bottom) of a normalised detection.
fn pixel_box(det: &Detection, w: u32, h: u32) -> (u32, u32, u32, u32) {
    let (x1, y1, x2, y2) = det.bbox_norm;
    let to_px = |v: f32, extent: u32| ((v.clamp(0.0, 1.0) * (extent - 1) as f32).round()) as u32;
    (
        to_px(x1.min(x2), w),
        to_px(y1.min(y2), h),
        to_px(x1.max(x2), w),
        to_px(y1.max(y2), h),
    )
}

/// Draw every detection's box, then every label on top.
pub fn draw_detections(frame: &RgbImage, detections: &[Detection], table: &ClassTable) -> RgbImage {
    let mut out = frame.clone();
    let (w, h) = out.dimensions();
    if w == 0 || h == 0 {
        return out;
    }

    for det in detections {
        let (left, top, right, bottom) = pixel_box(det, w, h);
        draw_rectangle(&mut out, left, top, right, bottom, class_colour(det.class_id));
    }

    for det in detections {
        let (left, top, _, _) = pixel_box(det, w, h);
        // above the box, or just inside it when there is no room
        let y = if top >= LABEL_HEIGHT { top - LABEL_HEIGHT } else { top + BOX_THICKNESS };
        draw_label(&mut out, left, y, &label_text(det, table), class_colour(det.class_id));
    }
    out
}

fn draw_rectangle(image: &mut RgbImage, left: u32, top: u32, right: u32, bottom: u32, colour: Rgb<u8>) {
    for t in 0..BOX_THICKNESS {
        let (l, r) = (left.saturating_add(t).min(right), right.saturating_sub(t).max(left));
        let (tp, b) = (top.saturating_add(t).min(bottom), bottom.saturating_sub(t).max(top));
        for x in l..=r {
            image.put_pixel(x, tp, colour);
            image.put_pixel(x, b, colour);
        }
        for y in tp..=b {
            image.put_pixel(l, y, colour);
            image.put_pixel(r, y, colour);
        }
    }
}

/// Filled rectangle, clipped to the image.
fn fill_rect(image: &mut RgbImage, left: u32, top: u32, right: u32, bottom: u32, colour: Rgb<u8>) {
    let (w, h) = image.dimensions();
    if left >= w || top >= h {
        return;
    }
    for y in top..=bottom.min(h - 1) {
        for x in left..=right.min(w - 1) {
            image.put_pixel(x, y, colour);
        }
    }
}

/// Dark band at (`left`, `top`) with `text` drawn in `colour`, clipped.
fn draw_label(image: &mut RgbImage, left: u32, top: u32, text: &str, colour: Rgb<u8>) {
    let (w, h) = image.dimensions();
    let width = text.chars().count() as u32 * GLYPH_ADVANCE;
    fill_rect(image, left, top, left + width, top + LABEL_HEIGHT - 1, LABEL_BACKGROUND);

    let mut x = left + 1;
    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                let py = top + 1 + row as u32;
                for col in 0..GLYPH_WIDTH {
                    let px = x + col;
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 && px < w && py < h {
                        image.put_pixel(px, py, colour);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

/// 5×7 rows, MSB is the leftmost column. Covers the class names, digits and `%`.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgb<u8> = Rgb([100, 100, 100]);

    fn det(class_id: u32, confidence: f32, bbox_norm: (f32, f32, f32, f32)) -> Detection {
        Detection { class_id, confidence, bbox_norm }
    }

    #[test]
    fn test_label_text() {
        let table = ClassTable::default();
        assert_eq!(label_text(&det(21, 0.9, (0.0, 0.0, 1.0, 1.0)), &table), "lion 90%");
        assert_eq!(label_text(&det(99, 0.504, (0.0, 0.0, 1.0, 1.0)), &table), "class 99 50%");
    }

    #[test]
    fn test_label_band_drawn_above_box() {
        let table = ClassTable::default();
        let frame = RgbImage::from_pixel(100, 60, GREY);
        // box spans x 20..=79, y 30..=53; label "lion 90%" is 48px wide
        let out = draw_detections(&frame, &[det(21, 0.9, (0.2, 0.5, 0.8, 0.9))], &table);
        let colour = class_colour(21);

        assert_eq!(*out.get_pixel(20, 30), colour);
        assert_eq!(*out.get_pixel(79, 53), colour);
        assert_eq!(*out.get_pixel(50, 40), GREY);

        // band occupies rows 21..=29 from x = 20
        assert_eq!(*out.get_pixel(20, 21), LABEL_BACKGROUND);
        assert_eq!(*out.get_pixel(68, 29), LABEL_BACKGROUND);
        assert_eq!(*out.get_pixel(20, 20), GREY);
        assert_eq!(*out.get_pixel(69, 25), GREY);

        let text_pixels = (22..=28)
            .flat_map(|y| (21..68).map(move |x| (x, y)))
            .filter(|&(x, y)| *out.get_pixel(x, y) == colour)
            .count();
        assert!(text_pixels > 20, "only {} text pixels", text_pixels);

        // source frame untouched
        assert_eq!(*frame.get_pixel(20, 21), GREY);
    }

    #[test]
    fn test_label_moves_inside_box_at_top_edge() {
        let table = ClassTable::default();
        let frame = RgbImage::from_pixel(64, 64, GREY);
        // inverted, out-of-range box: x 0..=63, y 6..=57
        let out = draw_detections(&frame, &[det(1, 0.5, (1.4, 0.9, -0.2, 0.1))], &table);
        let colour = class_colour(1);

        assert_eq!(*out.get_pixel(30, 6), colour);
        assert_eq!(*out.get_pixel(63, 57), colour);
        assert_eq!(*out.get_pixel(0, 30), colour);
        // band starts below the two-pixel outline
        assert_eq!(*out.get_pixel(40, 8), LABEL_BACKGROUND);
        assert_eq!(*out.get_pixel(30, 5), GREY);
    }

    #[test]
    fn test_every_class_name_has_glyphs() {
        let table = ClassTable::default();
        for class in table.classes() {
            for ch in class.name.chars().flat_map(char::to_uppercase) {
                assert!(glyph(ch).is_some(), "no glyph for {:?} in {}", ch, class.name);
            }
        }
    }
}
