//! Diagnostic overlay of a measured image.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::config::AnnotateConfig;
use crate::pipeline::ImageAnalysis;

/// Draw the bore outline, its center and the accepted chamfer lines onto
/// `image`. Stroke width scales with image width.
pub fn annotate(image: &mut RgbImage, analysis: &ImageAnalysis, cfg: &AnnotateConfig) {
    let stroke = cfg.stroke_width(image.width()) as i32;
    let circle_color = Rgb(cfg.circle_color);
    let line_color = Rgb(cfg.line_color);

    if let Some(c) = &analysis.circle {
        let center = (c.center[0].round() as i32, c.center[1].round() as i32);
        let r = c.radius.round() as i32;
        for k in 0..stroke {
            let rr = r - stroke / 2 + k;
            if rr > 0 {
                draw_hollow_circle_mut(image, center, rr, circle_color);
            }
        }
        draw_filled_circle_mut(image, center, 2 + stroke, circle_color);
        tracing::debug!(
            "bore diameter {:.2} mm",
            analysis.bore_diameter_mm.unwrap_or(f64::NAN)
        );
    }

    for line in &analysis.lines {
        // Lines are near-horizontal, so thicken vertically.
        for k in 0..stroke {
            let dy = (k - stroke / 2) as f32;
            draw_line_segment_mut(
                image,
                (line.p1[0] as f32, line.p1[1] as f32 + dy),
                (line.p2[0] as f32, line.p2[1] as f32 + dy),
                line_color,
            );
        }
    }
    for (i, edge) in analysis.edges.iter().enumerate() {
        if let Some(d) = edge.distance_mm {
            tracing::debug!("edge {} at y={:.1}: {:.2} mm", i + 1, edge.y_mean, d);
        }
    }
}
