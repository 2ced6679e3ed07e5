use piet::kurbo::Rect;
use piet::{RenderContext, Text, TextLayout, TextLayoutBuilder};
use piet_cairo::{CairoRenderContext, CairoText};

use crate::assets::RgbaImage;
use crate::weather::Observation;

const PADDING: f64 = 20.;

/// How often the overlay positions shift to mitigate burn-in.
pub const DRIFT_PERIOD_SECONDS: i64 = 300;
const DRIFT_PIXELS: u64 = 6;

/// Composite one frame: the condition image scaled to the surface, the
/// temperature readout centered at the top, the clock centered below it, and
/// the optional sun/moon corner icon at the top right.
pub fn frame(
    ctx: &mut CairoRenderContext,
    size: (usize, usize),
    background: &RgbaImage,
    corner_icon: Option<&RgbaImage>,
    observation: &Observation,
    now: time::OffsetDateTime,
) -> Result<(), piet::Error> {
    let (width, height) = (size.0 as f64, size.1 as f64);
    let (dx, dy) = drift(now);

    {
        let image = ctx.make_image(
            background.width,
            background.height,
            &background.data,
            piet::ImageFormat::RgbaPremul,
        )?;
        ctx.draw_image(
            &image,
            Rect::new(0., 0., width, height),
            piet::InterpolationMode::Bilinear,
        );
    }

    let temperature = CairoText::new()
        .new_text_layout(temperature_text(observation))
        .default_attribute(piet::TextAttribute::FontSize(height / 10.))
        .default_attribute(piet::TextAttribute::TextColor(piet::Color::WHITE))
        .build()?;
    ctx.draw_text(
        &temperature,
        (
            (width - temperature.size().width) / 2. + dx,
            PADDING + dy,
        ),
    );

    let clock = CairoText::new()
        .new_text_layout(clock_text(now))
        .default_attribute(piet::TextAttribute::FontSize(width / 4.))
        .default_attribute(piet::TextAttribute::TextColor(piet::Color::WHITE))
        .build()?;
    ctx.draw_text(
        &clock,
        (
            (width - clock.size().width) / 2. + dx,
            (height - clock.size().height) / 2. + dy,
        ),
    );

    if let Some(icon) = corner_icon {
        // Fit within a quarter of the width and a third of the height,
        // never upscaling.
        let scale = (width / 4. / icon.width as f64)
            .min(height / 3. / icon.height as f64)
            .min(1.);
        let icon_size = (icon.width as f64 * scale, icon.height as f64 * scale);

        let image = ctx.make_image(
            icon.width,
            icon.height,
            &icon.data,
            piet::ImageFormat::RgbaPremul,
        )?;
        ctx.draw_image(
            &image,
            Rect::from_origin_size(
                (width - icon_size.0 - PADDING + dx, PADDING + dy),
                icon_size,
            ),
            piet::InterpolationMode::Bilinear,
        );
    }

    Ok(())
}

/// 12-hour clock text, e.g. `2:05 pm`.
pub fn clock_text(now: time::OffsetDateTime) -> String {
    let hour = match now.hour() % 12 {
        0 => 12,
        hour => hour,
    };
    let meridiem = if now.hour() < 12 { "am" } else { "pm" };

    format!("{}:{:02} {}", hour, now.minute(), meridiem)
}

/// Temperature readout, `--` until the first successful poll.
pub fn temperature_text(observation: &Observation) -> String {
    match observation.temperature {
        Some(temperature) => format!("{:.0}°", temperature),
        None => "--".to_owned(),
    }
}

/// Overlay offset for the drift period containing `now`, within
/// ±`DRIFT_PIXELS` on each axis. Deterministic per period so the layout
/// holds still between shifts.
pub fn drift(now: time::OffsetDateTime) -> (f64, f64) {
    let mut seed = (now.unix_timestamp().div_euclid(DRIFT_PERIOD_SECONDS) as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut next = move || {
        seed ^= seed >> 30;
        seed = seed.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        seed ^= seed >> 27;
        (seed % (2 * DRIFT_PIXELS + 1)) as f64 - DRIFT_PIXELS as f64
    };

    (next(), next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(timestamp: i64) -> time::OffsetDateTime {
        time::OffsetDateTime::from_unix_timestamp(timestamp)
    }

    #[test]
    fn clock_is_twelve_hour() {
        assert_eq!(clock_text(at(0)), "12:00 am");
        assert_eq!(clock_text(at(9 * 3600 + 7 * 60)), "9:07 am");
        assert_eq!(clock_text(at(12 * 3600)), "12:00 pm");
        assert_eq!(clock_text(at(14 * 3600 + 5 * 60)), "2:05 pm");
        assert_eq!(clock_text(at(23 * 3600 + 59 * 60)), "11:59 pm");
    }

    #[test]
    fn temperature_placeholder_while_unknown() {
        assert_eq!(temperature_text(&Observation::unknown()), "--");
    }

    #[test]
    fn temperature_rounded_to_degree() {
        let mut observation = Observation::unknown();

        observation.temperature = Some(72.0);
        assert_eq!(temperature_text(&observation), "72°");

        observation.temperature = Some(-3.6);
        assert_eq!(temperature_text(&observation), "-4°");
    }

    #[test]
    fn drift_bounded_and_stable_within_period() {
        for bucket in 0..10 {
            let start = at(bucket * DRIFT_PERIOD_SECONDS);
            let end = at((bucket + 1) * DRIFT_PERIOD_SECONDS - 1);

            let (dx, dy) = drift(start);
            assert!(dx.abs() <= DRIFT_PIXELS as f64);
            assert!(dy.abs() <= DRIFT_PIXELS as f64);
            assert_eq!(drift(end), (dx, dy));
        }
    }

    #[test]
    fn drift_varies_across_periods() {
        let offsets: Vec<(f64, f64)> = (0..10)
            .map(|bucket| drift(at(bucket * DRIFT_PERIOD_SECONDS)))
            .collect();

        assert!(offsets.iter().any(|&offset| offset != offsets[0]));
    }
}
