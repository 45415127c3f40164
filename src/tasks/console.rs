use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail, ensure};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{
    BatteryStatus, DeviceOrientation, GestureCommand, HostCommand, PointerEvent, SwipeDirection,
};
use crate::platform::ScreenSize;

/// Brightness step for the `brighter` / `dimmer` commands.
const BRIGHTNESS_STEP: f32 = 0.1;

pub const HELP: &str = "commands: pause | next | prev | exit | end | wake | landscape | portrait | \
                        brighter | dimmer | battery <percent> [charging] | tap | swipe <left|right>";

/// Synthesizes the pointer samples of a touch gesture for the `tap` and
/// `swipe` commands, so they go through the gesture router like real input.
/// Returns `None` for lines that are not touch commands.
pub fn synthesize_touch(line: &str, screen: ScreenSize, now: Instant) -> Option<Vec<PointerEvent>> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let y = screen.height / 2.0;
    match (verb.as_str(), words.next()) {
        ("tap", None) => {
            let x = screen.width / 2.0;
            Some(vec![
                PointerEvent::down(x, y, now),
                PointerEvent::up(x, y, now + Duration::from_millis(50), 0.0, 0.0),
            ])
        }
        ("swipe", Some(direction)) => {
            let (from, to) = match direction {
                "left" => (0.7, 0.3),
                "right" => (0.3, 0.7),
                _ => return None,
            };
            let from = screen.width * from;
            let to = screen.width * to;
            let held = Duration::from_millis(100);
            let velocity = (to - from) / held.as_secs_f32();
            Some(vec![
                PointerEvent::down(from, y, now),
                PointerEvent::moved((from + to) / 2.0, y, now + held / 2),
                PointerEvent::up(to, y, now + held, velocity, 0.0),
            ])
        }
        _ => None,
    }
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<HostCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "pause" | "resume" | "p" => HostCommand::Gesture(GestureCommand::PauseToggle),
        "next" | "n" => HostCommand::Gesture(GestureCommand::Next(SwipeDirection::Left)),
        "prev" | "previous" => {
            HostCommand::Gesture(GestureCommand::Previous(SwipeDirection::Right))
        }
        "exit" | "q" => HostCommand::Gesture(GestureCommand::Exit),
        "end" => HostCommand::EndSession,
        "wake" => HostCommand::ExternalExitRequested,
        "landscape" => HostCommand::OrientationChanged(DeviceOrientation::Landscape),
        "portrait" => HostCommand::OrientationChanged(DeviceOrientation::Portrait),
        "brighter" => HostCommand::Gesture(GestureCommand::BrightnessDelta(BRIGHTNESS_STEP)),
        "dimmer" => HostCommand::Gesture(GestureCommand::BrightnessDelta(-BRIGHTNESS_STEP)),
        "battery" => {
            let level = words.next().context("battery needs a percentage")?;
            let level: u8 = level
                .trim_end_matches('%')
                .parse()
                .with_context(|| format!("invalid battery level {level:?}"))?;
            ensure!(level <= 100, "battery level must be between 0 and 100");
            let charging = match words.next() {
                None => false,
                Some("charging") => true,
                Some(other) => bail!("unexpected battery flag {other:?}"),
            };
            HostCommand::BatteryChanged(BatteryStatus { level, charging })
        }
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(command))
}

/// Reads commands line by line from `input`. Host commands go straight to the
/// slideshow, touch commands to the gesture router. End of input cancels the
/// whole process.
pub async fn run<R>(
    input: R,
    commands: Sender<HostCommand>,
    pointers: Sender<PointerEvent>,
    screen: ScreenSize,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("failed to read console input")?,
        };
        let Some(line) = line else {
            info!("stdin closed; initiating shutdown");
            cancel.cancel();
            break;
        };

        let now = tokio::time::Instant::now().into_std();
        if let Some(events) = synthesize_touch(&line, screen, now) {
            for event in events {
                if pointers.send(event).await.is_err() {
                    debug!("pointer channel closed");
                    break;
                }
            }
            continue;
        }

        match parse_command(&line) {
            Ok(Some(command)) => {
                debug!(?command, "console command");
                if commands.send(command).await.is_err() {
                    debug!("slideshow command channel closed");
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => warn!("{err:#}; {HELP}"),
        }
    }
    Ok(())
}
