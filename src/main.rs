use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use themeclock::assets::{self, ThemeAssets};
use themeclock::config::Config;
use themeclock::display::waveshare::EPaper3_7in;
use themeclock::display::Display;
use themeclock::render;
use themeclock::weather::{Observation, Poller};

const TICK: Duration = Duration::from_secs(1);

fn help() {
    println!(
        r#"
themeclock - themed fullscreen image clock

Usage: themeclock [OPTIONS] [CONFIG_PATH]

CONFIG_PATH defaults to ./config.json. Theme images are read from
./images/<theme>/.

Options:
    -h, --help              Print this help message

"#
    );
}

fn config_path() -> anyhow::Result<PathBuf> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        help();
        process::exit(0);
    }

    Ok(args
        .opt_free_from_os_str::<_, Infallible>(|path| Ok(PathBuf::from(path)))?
        .unwrap_or_else(|| PathBuf::from("config.json")))
}

/// The inputs the last pushed frame was composed from. A new frame is pushed
/// only when these change; the panel takes seconds per refresh, so identical
/// frames are not re-pushed every tick.
#[derive(PartialEq)]
struct FrameKey {
    background: PathBuf,
    clock: String,
    temperature: String,
    brightness_percent: u8,
    drift_period: i64,
}

fn now_local() -> time::OffsetDateTime {
    time::OffsetDateTime::try_now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc())
}

fn app() -> anyhow::Result<()> {
    let config = Config::load(config_path()?)?;
    let assets = ThemeAssets::load(Path::new("images"), &config.theme)?;
    let poller = Poller::new(&config)?;

    let mut display = EPaper3_7in::new()?;
    display.on()?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc::set_handler({
        let running = running.clone();
        move || {
            running.store(false, Ordering::Relaxed);
        }
    })?;

    log::info!("Entering main loop with theme \"{}\"", config.theme);

    let mut observation = Observation::unknown();
    let mut next_poll = Instant::now();
    let mut last_frame: Option<FrameKey> = None;

    while running.load(Ordering::Relaxed) {
        let now = now_local();

        if Instant::now() >= next_poll {
            observation = poller.poll(&observation);
            next_poll = Instant::now() + config.poll_interval;
        }

        let background = assets
            .resolve(
                observation
                    .condition
                    .as_deref()
                    .unwrap_or(assets::DEFAULT_CONDITION),
            )
            .to_owned();
        let brightness = config.brightness_at(now);

        let key = FrameKey {
            background: background.clone(),
            clock: render::clock_text(now),
            temperature: render::temperature_text(&observation),
            brightness_percent: (brightness * 100.) as u8,
            drift_period: now.unix_timestamp().div_euclid(render::DRIFT_PERIOD_SECONDS),
        };

        if last_frame.as_ref() != Some(&key) {
            draw_frame(&mut display, &config, &assets, &background, &observation, now)?;
            last_frame = Some(key);
        }

        thread::sleep(TICK);
    }

    log::info!("Exiting");
    display.sleep()?;

    Ok(())
}

fn draw_frame(
    display: &mut EPaper3_7in,
    config: &Config,
    assets: &ThemeAssets,
    background: &Path,
    observation: &Observation,
    now: time::OffsetDateTime,
) -> anyhow::Result<()> {
    let size = display.get_dimensions();

    let background = assets::decode_rgba(background, size.0 as u32)?;

    let icon_path = if config.is_day(now) {
        assets.sun_icon(assets::weekday_name(now.weekday()))
    } else {
        assets.moon_icon(assets::moon_phase(now))
    };
    let corner_icon = icon_path
        .map(|path| assets::decode_rgba(path, (size.0 / 4) as u32))
        .transpose()?;

    display
        .draw_context(config.brightness_at(now), |ctx| {
            render::frame(ctx, size, &background, corner_icon.as_ref(), observation, now)
        })
        .map_err(|err| anyhow::anyhow!("unable to draw frame: {}", err))?;

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = app() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
