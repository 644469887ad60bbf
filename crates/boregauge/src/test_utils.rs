//! Synthetic part images for unit tests.

use image::{GrayImage, Luma};

/// Background gray level of rendered parts.
pub(crate) const BG_PIX: u8 = 200;
/// Gray level of the chamfer bands.
pub(crate) const BAND_PIX: u8 = 80;
/// Gray level of the bore.
pub(crate) const BORE_PIX: u8 = 30;

/// Render filled disks `(center, radius)` on a uniform background.
pub(crate) fn draw_disk_image(
    w: u32,
    h: u32,
    disks: &[([f32; 2], f32)],
    disk_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg_pix]));
    paint_disks(&mut img, disks, disk_pix);
    img
}

fn paint_disks(img: &mut GrayImage, disks: &[([f32; 2], f32)], pix: u8) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let inside = disks.iter().any(|(c, r)| {
                let dx = x as f32 - c[0];
                let dy = y as f32 - c[1];
                (dx * dx + dy * dy).sqrt() <= *r
            });
            if inside {
                img.put_pixel(x, y, Luma([pix]));
            }
        }
    }
}

/// Render a part: bore disks plus optional chamfer edges.
///
/// Rows above `top_edge` and below `bottom_edge` are painted with the band
/// level; the edge row itself holds the midpoint so the gradient peaks on
/// exactly that row.
pub(crate) fn draw_part_image(
    w: u32,
    h: u32,
    bores: &[([f32; 2], f32)],
    top_edge: Option<u32>,
    bottom_edge: Option<u32>,
) -> GrayImage {
    let mid = ((BAND_PIX as u16 + BG_PIX as u16) / 2) as u8;
    let mut img = GrayImage::from_pixel(w, h, Luma([BG_PIX]));
    for y in 0..h {
        let level = match (top_edge, bottom_edge) {
            (Some(t), _) if y < t => BAND_PIX,
            (Some(t), _) if y == t => mid,
            (_, Some(b)) if y > b => BAND_PIX,
            (_, Some(b)) if y == b => mid,
            _ => continue,
        };
        for x in 0..w {
            img.put_pixel(x, y, Luma([level]));
        }
    }
    paint_disks(&mut img, bores, BORE_PIX);
    img
}
