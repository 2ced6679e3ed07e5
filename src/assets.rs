use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Condition name of the mandatory fallback image within each theme folder.
pub const DEFAULT_CONDITION: &str = "default";

/// Recognized asset extensions, in order of preference when a condition is
/// present in more than one format.
const EXTENSIONS: [&str; 3] = ["svg", "png", "gif"];

/// The eight moon-phase bucket names, new moon first.
pub const MOON_PHASES: [&str; 8] = [
    "new",
    "waxing_crescent",
    "first_quarter",
    "waxing_gibbous",
    "full",
    "waning_gibbous",
    "third_quarter",
    "waning_crescent",
];

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("unable to read theme directory {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("theme directory {0} has no \"default\" image")]
    MissingDefault(PathBuf),
    #[error("unable to decode image {0}: {1}")]
    Decode(PathBuf, String),
}

/// The filesystem listing of one theme, resolved once at startup.
///
/// `images/<theme>/<condition>.<ext>` skins the background per weather
/// condition; the optional `sun/` and `moon/` subfolders hold per-weekday and
/// per-moon-phase corner icons.
pub struct ThemeAssets {
    conditions: HashMap<String, PathBuf>,
    sun: HashMap<String, PathBuf>,
    moon: HashMap<String, PathBuf>,
}

impl ThemeAssets {
    pub fn load(images_root: &Path, theme: &str) -> Result<Self, AssetError> {
        let theme_dir = images_root.join(theme);

        let conditions = scan(&theme_dir)?;
        if !conditions.contains_key(DEFAULT_CONDITION) {
            return Err(AssetError::MissingDefault(theme_dir));
        }

        Ok(Self {
            conditions,
            sun: scan(&theme_dir.join("sun")).unwrap_or_default(),
            moon: scan(&theme_dir.join("moon")).unwrap_or_default(),
        })
    }

    /// The image for `condition`, falling back to the theme's default image
    /// when the condition has no asset of its own.
    pub fn resolve(&self, condition: &str) -> &Path {
        self.conditions
            .get(condition)
            .unwrap_or_else(|| &self.conditions[DEFAULT_CONDITION])
    }

    /// Daytime corner icon for a lowercase weekday name, if the theme has one.
    pub fn sun_icon(&self, weekday: &str) -> Option<&Path> {
        self.sun.get(weekday).map(PathBuf::as_path)
    }

    /// Night-time corner icon for a moon-phase name, if the theme has one.
    pub fn moon_icon(&self, phase: &str) -> Option<&Path> {
        self.moon.get(phase).map(PathBuf::as_path)
    }
}

fn scan(dir: &Path) -> Result<HashMap<String, PathBuf>, AssetError> {
    let mut entries: HashMap<String, (usize, PathBuf)> = HashMap::new();

    for entry in fs::read_dir(dir).map_err(|err| AssetError::Io(dir.to_owned(), err))? {
        let path = entry
            .map_err(|err| AssetError::Io(dir.to_owned(), err))?
            .path();

        let stem = path.file_stem().and_then(|stem| stem.to_str());
        let rank = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| {
                let ext = ext.to_ascii_lowercase();
                EXTENSIONS.iter().position(|&known| known == ext)
            });

        if let (Some(stem), Some(rank)) = (stem, rank) {
            let entry = entries
                .entry(stem.to_owned())
                .or_insert_with(|| (rank, path.clone()));
            if rank < entry.0 {
                *entry = (rank, path);
            }
        }
    }

    Ok(entries
        .into_iter()
        .map(|(stem, (_, path))| (stem, path))
        .collect())
}

/// Lowercase weekday name matching the `sun/` icon filenames.
pub fn weekday_name(weekday: time::Weekday) -> &'static str {
    match weekday {
        time::Weekday::Monday => "monday",
        time::Weekday::Tuesday => "tuesday",
        time::Weekday::Wednesday => "wednesday",
        time::Weekday::Thursday => "thursday",
        time::Weekday::Friday => "friday",
        time::Weekday::Saturday => "saturday",
        time::Weekday::Sunday => "sunday",
    }
}

/// Bucket the moon's synodic age at `now` into one of the eight
/// [`MOON_PHASES`] names. The half-bucket shift centers each name on its
/// phase rather than starting at it.
pub fn moon_phase(now: time::OffsetDateTime) -> &'static str {
    const SYNODIC_DAYS: f64 = 29.530_59;
    // 2000-01-06 18:14 UTC was a new moon.
    const REFERENCE_NEW_MOON: i64 = 947_182_440;

    let age = ((now.unix_timestamp() - REFERENCE_NEW_MOON) as f64 / 86_400.0)
        .rem_euclid(SYNODIC_DAYS);
    let index = ((age + SYNODIC_DAYS / 16.0) / (SYNODIC_DAYS / 8.0)) as usize % 8;

    MOON_PHASES[index]
}

/// A decoded image, as premultiplied RGBA bytes.
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Decode a resolved asset path to RGBA pixels. `target_width` sizes vector
/// images; raster images keep their natural dimensions and are scaled at
/// draw time.
pub fn decode_rgba(path: &Path, target_width: u32) -> Result<RgbaImage, AssetError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("svg") => decode_svg(path, target_width),
        Some("png") => decode_png(path),
        Some("gif") => decode_gif(path),
        _ => Err(AssetError::Decode(
            path.to_owned(),
            "unsupported image format".to_owned(),
        )),
    }
}

fn decode_svg(path: &Path, target_width: u32) -> Result<RgbaImage, AssetError> {
    let source = fs::read_to_string(path).map_err(|err| AssetError::Io(path.to_owned(), err))?;
    let tree = usvg::Tree::from_str(&source, &usvg::Options::default())
        .map_err(|err| AssetError::Decode(path.to_owned(), err.to_string()))?;

    let image = resvg::render(&tree, usvg::FitTo::Width(target_width), None).ok_or_else(|| {
        AssetError::Decode(path.to_owned(), "SVG rendered to zero size".to_owned())
    })?;

    Ok(RgbaImage {
        width: image.width() as usize,
        height: image.height() as usize,
        data: image.data().to_vec(),
    })
}

fn decode_png(path: &Path) -> Result<RgbaImage, AssetError> {
    let image = image::open(path)
        .map_err(|err| AssetError::Decode(path.to_owned(), err.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();

    Ok(RgbaImage {
        width: width as usize,
        height: height as usize,
        data: premultiply(image.into_raw()),
    })
}

fn decode_gif(path: &Path) -> Result<RgbaImage, AssetError> {
    let file = fs::File::open(path).map_err(|err| AssetError::Io(path.to_owned(), err))?;
    let decode_error = |err: gif::DecodingError| AssetError::Decode(path.to_owned(), err.to_string());

    let mut decoder = gif::Decoder::new(file).map_err(decode_error)?;
    let global_palette: Vec<u8> = decoder
        .global_palette()
        .map(|palette| palette.to_vec())
        .unwrap_or_default();

    let frame = decoder
        .read_next_frame()
        .map_err(decode_error)?
        .ok_or_else(|| AssetError::Decode(path.to_owned(), "GIF has no frames".to_owned()))?;
    let palette = frame.palette.as_deref().unwrap_or(&global_palette[..]);

    let mut data = Vec::with_capacity(frame.buffer.len() * 4);
    for &index in frame.buffer.iter() {
        if frame.transparent == Some(index) {
            data.extend_from_slice(&[0x00; 4]);
        } else {
            let color = palette
                .get(index as usize * 3..index as usize * 3 + 3)
                .unwrap_or(&[0x00, 0x00, 0x00]);
            data.extend_from_slice(&[color[0], color[1], color[2], 0xFF]);
        }
    }

    Ok(RgbaImage {
        width: frame.width as usize,
        height: frame.height as usize,
        data,
    })
}

fn premultiply(mut data: Vec<u8>) -> Vec<u8> {
    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3] as u16;
        if alpha < 0xFF {
            for channel in pixel[..3].iter_mut() {
                *channel = (*channel as u16 * alpha / 0xFF) as u8;
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/images")
    }

    fn succulent() -> ThemeAssets {
        ThemeAssets::load(&fixtures(), "succulent").unwrap()
    }

    #[test]
    fn known_condition_resolved() {
        let assets = succulent();

        assert!(assets.resolve("clear_day").ends_with("clear_day.svg"));
    }

    #[test]
    fn unknown_condition_falls_back_to_default() {
        let assets = succulent();

        assert!(assets.resolve("tornado_monsoon").ends_with("default.svg"));
    }

    #[test]
    fn missing_theme_fails() {
        assert!(matches!(
            ThemeAssets::load(&fixtures(), "no-such-theme"),
            Err(AssetError::Io(_, _))
        ));
    }

    #[test]
    fn theme_without_default_fails() {
        assert!(matches!(
            ThemeAssets::load(&fixtures(), "defaultless"),
            Err(AssetError::MissingDefault(_))
        ));
    }

    #[test]
    fn corner_icons_optional() {
        let assets = succulent();

        assert!(assets
            .sun_icon("monday")
            .map_or(false, |path| path.ends_with("monday.svg")));
        assert_eq!(assets.sun_icon("someday"), None);
        assert_eq!(assets.moon_icon("full"), None);
    }

    #[test]
    fn moon_phase_buckets() {
        let reference = 947_182_440; // new moon
        let at = |days: i64| time::OffsetDateTime::from_unix_timestamp(reference + days * 86_400);

        assert_eq!(moon_phase(at(0)), "new");
        assert_eq!(moon_phase(at(7)), "first_quarter");
        assert_eq!(moon_phase(at(15)), "full");
        assert_eq!(moon_phase(at(22)), "third_quarter");
        // Ages wrap modulo the synodic month, including before the reference.
        assert_eq!(moon_phase(at(-30)), "new");
    }

    #[test]
    fn weekday_names_lowercase() {
        assert_eq!(weekday_name(time::Weekday::Monday), "monday");
        assert_eq!(weekday_name(time::Weekday::Sunday), "sunday");
    }

    #[test]
    fn svg_decoded_at_target_width() {
        let assets = succulent();
        let image = decode_rgba(assets.resolve("clear_day"), 280).unwrap();

        assert_eq!(image.width, 280);
        assert_eq!(image.data.len(), image.width * image.height * 4);
    }

    #[test]
    fn unsupported_extension_rejected() {
        assert!(matches!(
            decode_rgba(Path::new("images/succulent/notes.txt"), 280),
            Err(AssetError::Decode(_, _))
        ));
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        assert_eq!(
            premultiply(vec![0xFF, 0x80, 0x00, 0x80, 0x10, 0x20, 0x30, 0xFF]),
            vec![0x80, 0x40, 0x00, 0x80, 0x10, 0x20, 0x30, 0xFF]
        );
    }
}
