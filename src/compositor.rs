//! Local compositing on an RGBA canvas
//!
//! Drawing follows 2D canvas semantics: a fresh canvas is fully transparent,
//! fills replace every pixel, and images are drawn with source-over alpha
//! blending at integer pixel offsets.

use crate::{
    config::ComposeConfig,
    error::Result,
    services::{ImageIOService, OutputFormatHandler},
    types::{BackgroundColor, BackgroundMode, RenderedOutput},
};
use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use tracing::{debug, instrument};

/// A drawing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    /// Create a transparent canvas
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.fill(Rgba([0, 0, 0, 0]));
    }

    /// Paint every pixel with `color`
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Draw `image` at its native size with its top-left corner at (`x`, `y`)
    pub fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(&mut self.pixels, image, x, y);
    }

    /// Draw `image` stretched to `width` x `height` at (`x`, `y`)
    pub fn draw_image_scaled(&mut self, image: &RgbaImage, x: i64, y: i64, width: u32, height: u32) {
        if image.dimensions() == (width, height) {
            self.draw_image(image, x, y);
        } else {
            let scaled = imageops::resize(image, width, height, imageops::FilterType::Triangle);
            self.draw_image(&scaled, x, y);
        }
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Encode the canvas as a data URL
    ///
    /// # Errors
    /// - Encoder failures
    pub fn export(&self, config: &ComposeConfig) -> Result<RenderedOutput> {
        ImageIOService::to_rendered_output(&DynamicImage::ImageRgba8(self.pixels.clone()), config)
    }
}

/// Offset that centers a `fg` sized image on a `canvas` sized surface
#[must_use]
pub fn centered_offset(canvas: (u32, u32), fg: (u32, u32)) -> (i64, i64) {
    (
        (i64::from(canvas.0) - i64::from(fg.0)) / 2,
        (i64::from(canvas.1) - i64::from(fg.1)) / 2,
    )
}

/// Produces rendered outputs from decoded images
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: ComposeConfig,
}

impl Compositor {
    #[must_use]
    pub fn new(config: ComposeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Draw `source` on a same-sized canvas prepared per `mode`
    #[must_use]
    pub fn render_local(
        &self,
        source: &DynamicImage,
        mode: BackgroundMode,
        color: &BackgroundColor,
    ) -> Canvas {
        let mut canvas = Canvas::new(source.width(), source.height());
        match mode {
            BackgroundMode::Transparent => {
                OutputFormatHandler::validate_for_transparency(self.config.output_format);
                canvas.clear();
            },
            BackgroundMode::Color => canvas.fill(color.to_rgba_or_default()),
            // Painted later by the background compositing step
            BackgroundMode::Image => {},
        }
        canvas.draw_image(&source.to_rgba8(), 0, 0);
        canvas
    }

    /// Draw `background` stretched to the larger of both sizes, then `foreground` centered
    #[must_use]
    pub fn render_over_background(
        &self,
        background: &DynamicImage,
        foreground: &DynamicImage,
    ) -> Canvas {
        let width = background.width().max(foreground.width());
        let height = background.height().max(foreground.height());
        let mut canvas = Canvas::new(width, height);

        canvas.draw_image_scaled(&background.to_rgba8(), 0, 0, width, height);

        let (x, y) = centered_offset((width, height), foreground.dimensions());
        debug!(width, height, x, y, "Compositing foreground over custom background");
        canvas.draw_image(&foreground.to_rgba8(), x, y);
        canvas
    }

    /// Local compositing step, exported
    ///
    /// # Errors
    /// - Encoder failures
    #[instrument(skip_all, fields(mode = %mode, width = source.width(), height = source.height()))]
    pub fn compose_local(
        &self,
        source: &DynamicImage,
        mode: BackgroundMode,
        color: &BackgroundColor,
    ) -> Result<RenderedOutput> {
        self.render_local(source, mode, color).export(&self.config)
    }

    /// Custom background compositing step, exported
    ///
    /// # Errors
    /// - Encoder failures
    #[instrument(skip_all)]
    pub fn compose_over_background(
        &self,
        background: &DynamicImage,
        foreground: &DynamicImage,
    ) -> Result<RenderedOutput> {
        self.render_over_background(background, foreground)
            .export(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_url;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color))
    }

    #[test]
    fn test_transparent_local_keeps_source_dimensions() {
        let compositor = Compositor::default();
        let source = solid(37, 21, RED);
        let output = compositor
            .compose_local(&source, BackgroundMode::Transparent, &BackgroundColor::default())
            .unwrap();

        assert_eq!((output.width, output.height), (37, 21));
        let decoded = data_url::decode(&output.data_url).unwrap();
        let image = image::load_from_memory(&decoded.bytes).unwrap();
        assert_eq!((image.width(), image.height()), (37, 21));
    }

    #[test]
    fn test_color_fill_shows_through_transparent_pixels() {
        let mut source = RgbaImage::from_pixel(2, 1, RED);
        source.put_pixel(1, 0, Rgba([0, 0, 0, 0]));

        let canvas = Compositor::default().render_local(
            &DynamicImage::ImageRgba8(source),
            BackgroundMode::Color,
            &BackgroundColor::new("#0000ff"),
        );
        assert_eq!(canvas.as_image().get_pixel(0, 0), &RED);
        assert_eq!(canvas.as_image().get_pixel(1, 0), &BLUE);
    }

    #[test]
    fn test_transparent_mode_keeps_alpha() {
        let source = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let canvas = Compositor::default().render_local(
            &DynamicImage::ImageRgba8(source),
            BackgroundMode::Transparent,
            &BackgroundColor::default(),
        );
        assert_eq!(canvas.as_image().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_invalid_color_uses_canvas_default() {
        let source = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let canvas = Compositor::default().render_local(
            &DynamicImage::ImageRgba8(source),
            BackgroundMode::Color,
            &BackgroundColor::new("not-a-color"),
        );
        assert_eq!(canvas.as_image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_compositing_is_deterministic() {
        let compositor = Compositor::default();
        let source = solid(16, 9, Rgba([10, 20, 30, 128]));
        let color = BackgroundColor::new("#abcdef");

        let first = compositor
            .compose_local(&source, BackgroundMode::Color, &color)
            .unwrap();
        let second = compositor
            .compose_local(&source, BackgroundMode::Color, &color)
            .unwrap();
        assert_eq!(first.data_url, second.data_url);

        let background = solid(30, 30, BLUE);
        let a = compositor.compose_over_background(&background, &source).unwrap();
        let b = compositor.compose_over_background(&background, &source).unwrap();
        assert_eq!(a.data_url, b.data_url);
    }

    #[test]
    fn test_custom_background_canvas_and_offset() {
        let canvas = Compositor::default()
            .render_over_background(&solid(800, 600, BLUE), &solid(400, 300, RED));

        assert_eq!(canvas.dimensions(), (800, 600));
        assert_eq!(centered_offset((800, 600), (400, 300)), (200, 150));

        let pixels = canvas.as_image();
        assert_eq!(pixels.get_pixel(199, 149), &BLUE);
        assert_eq!(pixels.get_pixel(200, 150), &RED);
        assert_eq!(pixels.get_pixel(599, 449), &RED);
        assert_eq!(pixels.get_pixel(600, 450), &BLUE);
    }

    #[test]
    fn test_custom_background_grows_to_larger_foreground() {
        let canvas = Compositor::default()
            .render_over_background(&solid(100, 50, BLUE), &solid(60, 80, RED));

        assert_eq!(canvas.dimensions(), (100, 80));
        // Background stretched to fill; foreground centered horizontally only
        assert_eq!(canvas.as_image().get_pixel(0, 0), &BLUE);
        assert_eq!(canvas.as_image().get_pixel(20, 0), &RED);
        assert_eq!(canvas.as_image().get_pixel(19, 79), &BLUE);
    }

    #[test]
    fn test_centered_offset_rounds_down() {
        assert_eq!(centered_offset((11, 7), (4, 4)), (3, 1));
        assert_eq!(centered_offset((4, 4), (4, 4)), (0, 0));
    }

    #[test]
    fn test_draw_image_clips_outside_canvas() {
        let mut canvas = Canvas::new(2, 2);
        canvas.draw_image(&RgbaImage::from_pixel(2, 2, RED), 1, 1);
        assert_eq!(canvas.as_image().get_pixel(1, 1), &RED);
        assert_eq!(canvas.as_image().get_pixel(0, 0)[3], 0);
    }
}
