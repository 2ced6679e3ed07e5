use std::fmt;

use dither::ditherer::Dither;
use piet::RenderContext;

pub mod waveshare;

/// A raster or draw error while pushing a frame to a display.
#[derive(Debug, thiserror::Error)]
pub enum FrameError<E: fmt::Debug> {
    #[error("unable to rasterize frame: {0}")]
    Raster(piet::Error),
    #[error("unable to push frame to display: {0:?}")]
    Device(E),
}

impl<E: fmt::Debug> From<piet::Error> for FrameError<E> {
    fn from(err: piet::Error) -> Self {
        Self::Raster(err)
    }
}

pub trait Display {
    type Err: fmt::Debug;

    /// Initialize the display.
    fn on(&mut self) -> Result<(), Self::Err>;

    /// Clear the display and power it down.
    fn off(&mut self) -> Result<(), Self::Err>;

    /// Put the display in low-power mode. This may or may not be the same as `off`.
    fn sleep(&mut self) -> Result<(), Self::Err>;

    /// Draw an image on the display. The image is represented as bytes in the range
    /// `0..self.get_color_depth()`, with 0 being black, so the input should have length
    /// `display_width * display_height`.
    fn draw(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), Self::Err>;

    /// Get the dimensions of the display in pixels (width, height).
    fn get_dimensions(&self) -> (usize, usize);

    /// Get the number of colours supported by the display. Used for dithering.
    fn get_color_depth(&self) -> u8;

    /// Draw a 32-bit RGB image dithered to the available colour depth. The image is represented as
    /// RGB bytes, so the input should have length `display_width * display_height * 3`.
    fn draw_dithered(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), Self::Err> {
        let (display_width, _) = self.get_dimensions();
        let mut image_iter = image.into_iter();
        let color_depth = self.get_color_depth();
        let quantize_bits = (color_depth as u32).trailing_zeros() as u8;

        self.draw(
            dither::ditherer::FLOYD_STEINBERG
                .dither(
                    dither::prelude::Img::new(
                        (0..)
                            .map(|_| {
                                // Map pixels to f64 in range 0.0..255.0
                                if let (Some(r), Some(g), Some(b)) =
                                    (image_iter.next(), image_iter.next(), image_iter.next())
                                {
                                    Some(
                                        dither::color::RGB(r as f64, g as f64, b as f64)
                                            .to_chroma_corrected_black_and_white(),
                                    )
                                } else {
                                    None
                                }
                            })
                            .take_while(|x| x.is_some())
                            .map(|x| x.unwrap()),
                        display_width as u32,
                    )
                    .unwrap(),
                    dither::create_quantize_n_bits_func(quantize_bits).unwrap(),
                )
                .iter()
                .map(|x| (x / 255. * (color_depth - 1) as f64) as u8),
        )
    }

    /// Rasterize a frame through a piet bitmap target, apply the brightness
    /// multiplier, and push the result to the display dithered to its colour
    /// depth.
    fn draw_context<F>(&mut self, brightness: f64, f: F) -> Result<(), FrameError<Self::Err>>
    where
        F: FnOnce(&mut piet_cairo::CairoRenderContext) -> Result<(), piet::Error>,
    {
        let (display_width, display_height) = self.get_dimensions();
        let mut device = piet_common::Device::new().map_err(FrameError::Raster)?;
        let mut bitmap_target = device
            .bitmap_target(display_width, display_height, 1.)
            .map_err(FrameError::Raster)?;

        {
            let mut render_context = bitmap_target.render_context();
            render_context.clear(piet::Color::BLACK);
            f(&mut render_context)?;
            render_context.finish().map_err(FrameError::Raster)?;
        }

        let brightness = brightness.max(0.).min(1.);

        self.draw_dithered(
            bitmap_target
                .to_image_buf(piet_common::ImageFormat::RgbaPremul)
                .map_err(FrameError::Raster)?
                .raw_pixels()
                .iter()
                .enumerate()
                .filter_map(|(index, pixel)| {
                    if index % 4 == 3 {
                        None
                    } else {
                        Some((*pixel as f64 * brightness) as u8)
                    }
                })
                .collect::<Vec<u8>>(),
        )
        .map_err(FrameError::Device)
    }
}

/// In-memory display, for running against simulated hardware and in tests.
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    powered: bool,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
            powered: false,
        }
    }

    /// The last frame pushed to the display, one byte per pixel in the range
    /// `0..get_color_depth()`.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }
}

impl Display for Framebuffer {
    type Err = std::convert::Infallible;

    fn on(&mut self) -> Result<(), Self::Err> {
        self.powered = true;
        Ok(())
    }

    fn off(&mut self) -> Result<(), Self::Err> {
        self.pixels.clear();
        self.powered = false;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), Self::Err> {
        self.powered = false;
        Ok(())
    }

    fn draw(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), Self::Err> {
        self.pixels = image.into_iter().collect();
        Ok(())
    }

    fn get_dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn get_color_depth(&self) -> u8 {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_power_cycle() {
        let mut display = Framebuffer::new(8, 8);
        assert!(!display.is_powered());

        display.on().unwrap();
        assert!(display.is_powered());

        display.draw(vec![3; 64]).unwrap();
        assert_eq!(display.pixels().len(), 64);

        display.off().unwrap();
        assert!(!display.is_powered());
        assert!(display.pixels().is_empty());
    }

    #[test]
    fn dithering_preserves_extremes() {
        let mut display = Framebuffer::new(8, 8);

        display.draw_dithered(vec![0xFF; 8 * 8 * 3]).unwrap();
        assert!(display.pixels().iter().all(|&pixel| pixel == 3));

        display.draw_dithered(vec![0x00; 8 * 8 * 3]).unwrap();
        assert!(display.pixels().iter().all(|&pixel| pixel == 0));
    }
}
