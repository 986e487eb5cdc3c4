use vello_cpu::kurbo::{BezPath, Rect, Stroke};
use vello_cpu::peniko::Color as PaintColor;

use crate::foundation::core::Canvas;
use crate::foundation::error::WaveResult;
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::render::color::Color;

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha**; the `premultiplied` flag keeps that explicit at API
/// boundaries.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixels as straight-alpha RGBA8, the layout image files expect.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut out);
        }
        out
    }
}

/// Visual style of the waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveStyle {
    pub wave: Color,
    pub background: Color,
    /// Polyline stroke width in pixels.
    pub stroke_width: f64,
    /// Fraction of the half-height a full-scale sample reaches.
    pub amplitude: f64,
    /// Opacity of the center baseline relative to the wave color.
    pub baseline_opacity: f64,
}

impl WaveStyle {
    pub fn new(wave: Color, background: Color) -> Self {
        Self {
            wave,
            background,
            stroke_width: 2.0,
            amplitude: 0.8,
            baseline_opacity: 0.5,
        }
    }
}

/// Reusable raster surface owned by the render step.
///
/// The target is reset and fully overwritten on every [`render_waveform`] call, so one target
/// serves a whole job.
pub struct RenderTarget {
    canvas: Canvas,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
}

impl RenderTarget {
    pub fn new(canvas: Canvas) -> WaveResult<Self> {
        canvas.validate()?;
        let (w, h) = (canvas.width as u16, canvas.height as u16);
        Ok(Self {
            canvas,
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Premultiplied RGBA8 pixels of the last rendered frame.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Copy the last rendered frame out of the target.
    pub fn snapshot(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixels().to_vec(),
            premultiplied: true,
        }
    }
}

fn paint(c: Color) -> PaintColor {
    let [r, g, b, a] = c.to_rgba8();
    PaintColor::from_rgba8(r, g, b, a)
}

/// Polyline vertices for `samples` on a `width` x `height` canvas.
///
/// Sample `i` maps to `(i * width / len, height/2 + s * height/2 * amplitude)`. Samples are
/// clamped to `[-1, 1]`; non-finite samples sit on the center line.
pub fn waveform_points(samples: &[f32], width: f64, height: f64, amplitude: f64) -> Vec<(f64, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }
    let slice_width = width / samples.len() as f64;
    let center_y = height / 2.0;
    let amp = center_y * amplitude;
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let s = if s.is_finite() {
                f64::from(s.clamp(-1.0, 1.0))
            } else {
                0.0
            };
            (i as f64 * slice_width, center_y + s * amp)
        })
        .collect()
}

/// Render one waveform frame into `target` and return its premultiplied RGBA8 pixels.
///
/// Draws the background, the sample polyline, then a thin baseline at the vertical center. An
/// empty `samples` slice yields background plus baseline.
pub fn render_waveform<'t>(
    samples: &[f32],
    style: &WaveStyle,
    target: &'t mut RenderTarget,
) -> &'t [u8] {
    let w = f64::from(target.canvas.width);
    let h = f64::from(target.canvas.height);
    let ctx = &mut target.ctx;
    ctx.reset();

    ctx.set_paint(paint(style.background));
    ctx.fill_rect(&Rect::new(0.0, 0.0, w, h));

    let points = waveform_points(samples, w, h, style.amplitude);
    if let Some((&first, rest)) = points.split_first() {
        let mut path = BezPath::new();
        path.move_to(first);
        for &p in rest {
            path.line_to(p);
        }
        ctx.set_stroke(Stroke::new(style.stroke_width));
        ctx.set_paint(paint(style.wave));
        ctx.stroke_path(&path);
    }

    let center_y = h / 2.0;
    let mut baseline = BezPath::new();
    baseline.move_to((0.0, center_y));
    baseline.line_to((w, center_y));
    ctx.set_stroke(Stroke::new(1.0));
    ctx.set_paint(paint(style.wave.with_alpha_factor(style.baseline_opacity)));
    ctx.stroke_path(&baseline);

    ctx.flush();
    ctx.render_to_pixmap(&mut target.pixmap);
    target.pixmap.data_as_u8_slice()
}
