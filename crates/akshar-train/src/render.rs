//! PNG output: sample grids and loss curves.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use image::{GrayImage, Luma, Rgb, RgbImage};

use akshar_core::error::{GanError, GanResult, IoResultExt};

use crate::trace::LossHistory;

/// Blank pixels between grid cells.
pub const GUTTER: usize = 2;

const MARGIN: u32 = 12;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID_LINE: Rgb<u8> = Rgb([225, 225, 225]);
/// Discriminator curve colour.
pub const D_COLOUR: Rgb<u8> = Rgb([220, 30, 30]);
/// Generator curve colour.
pub const G_COLOUR: Rgb<u8> = Rgb([30, 60, 220]);

/// Map a value in [-1, 1] to a grey level.
pub fn to_pixel(v: f32) -> u8 {
    ((v + 1.0) / 2.0 * 255.0).round().clamp(0.0, 255.0) as u8
}

fn render_error(path: &Path, err: image::ImageError) -> GanError {
    GanError::Render(format!("{}: {}", path.display(), err))
}

/// Tile up to `rows * cols` images of a `[N, 1, H, W]` batch into one picture.
///
/// Cells are filled row-major; cells past the end of the batch stay blank.
pub fn render_grid(images: &Tensor, rows: usize, cols: usize) -> GanResult<GrayImage> {
    if rows == 0 || cols == 0 {
        return Err(GanError::Render(format!("empty grid {}x{}", rows, cols)));
    }
    let (n, channels, h, w) = images.dims4()?;
    if channels != 1 {
        return Err(GanError::Render(format!(
            "expected single-channel images, got {} channels",
            channels
        )));
    }

    let width = cols * w + (cols - 1) * GUTTER;
    let height = rows * h + (rows - 1) * GUTTER;
    let mut canvas = GrayImage::from_pixel(width as u32, height as u32, Luma([255]));

    let count = n.min(rows * cols);
    if count == 0 {
        return Ok(canvas);
    }
    let values = images
        .narrow(0, 0, count)?
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .flatten_all()?
        .to_vec1::<f32>()?;

    for (idx, cell) in values.chunks_exact(h * w).enumerate() {
        let x0 = (idx % cols) * (w + GUTTER);
        let y0 = (idx / cols) * (h + GUTTER);
        for (i, &v) in cell.iter().enumerate() {
            let (x, y) = (x0 + i % w, y0 + i / w);
            canvas.put_pixel(x as u32, y as u32, Luma([to_pixel(v)]));
        }
    }
    Ok(canvas)
}

/// Render a grid and write it to `path` (format from the extension).
pub fn save_grid(images: &Tensor, rows: usize, cols: usize, path: &Path) -> GanResult<()> {
    render_grid(images, rows, cols)?
        .save(path)
        .map_err(|e| render_error(path, e))
}

/// Draw a line, silently clipping anything off-canvas.
fn draw_line(img: &mut RgbImage, (x0, y0): (i64, i64), (x1, y1): (i64, i64), colour: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            img.put_pixel(x as u32, y as u32, colour);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Plot both loss traces against their record index on a shared y-range.
///
/// Non-finite values are skipped and break the line.
pub fn render_loss_curves(d: &[f64], g: &[f64], width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    if width <= 2 * MARGIN || height <= 2 * MARGIN {
        return img;
    }
    let (left, top) = (MARGIN as i64, MARGIN as i64);
    let right = (width - MARGIN) as i64;
    let bottom = (height - MARGIN) as i64;

    for q in 1..4 {
        let y = top + (bottom - top) * q / 4;
        draw_line(&mut img, (left, y), (right, y), GRID_LINE);
    }
    draw_line(&mut img, (left, top), (left, bottom), AXIS);
    draw_line(&mut img, (left, bottom), (right, bottom), AXIS);

    let finite = d.iter().chain(g).copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return img;
    }
    let (lo, hi) = if hi - lo < 1e-12 { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let span_x = (d.len().max(g.len()).max(2) - 1) as f64;

    let to_point = |i: usize, v: f64| -> (i64, i64) {
        let x = left as f64 + (right - left) as f64 * i as f64 / span_x;
        let y = bottom as f64 - (bottom - top) as f64 * (v - lo) / (hi - lo);
        (x.round() as i64, y.round() as i64)
    };

    for (values, colour) in [(d, D_COLOUR), (g, G_COLOUR)] {
        let mut prev: Option<(i64, i64)> = None;
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                prev = None;
                continue;
            }
            let point = to_point(i, v);
            draw_line(&mut img, prev.unwrap_or(point), point, colour);
            prev = Some(point);
        }
    }
    img
}

/// Render both traces of `history` and write the plot to `path`.
pub fn save_loss_curves(history: &LossHistory, width: u32, height: u32, path: &Path) -> GanResult<()> {
    render_loss_curves(
        history.discriminator.values(),
        history.generator.values(),
        width,
        height,
    )
    .save(path)
    .map_err(|e| render_error(path, e))
}

/// Write both traces as pretty JSON.
pub fn save_loss_history_json(history: &LossHistory, path: &Path) -> GanResult<()> {
    let json = history.to_json()?;
    std::fs::write(path, json).with_path(path)
}
