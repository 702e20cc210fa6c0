//! Keyboard-driven capture loop state.
//!
//! The collector idles until a start command arrives, then writes every frame as
//! `<root>/<label>/<label>_<n>.jpg` until the requested number of images is saved or a quit
//! command arrives.
use std::{
    fs,
    io::BufRead,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    thread,
};

use common::imaging;
use image::RgbImage;

use crate::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Start,
    Quit,
}

impl Command {
    /// `c` starts capturing, `q` quits.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "c" | "C" => Some(Self::Start),
            "q" | "Q" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureState {
    Idle,
    Collecting,
}

/// Whether the capture loop should keep running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    Continue,
    Done,
}

pub struct Collector {
    label: String,
    dir: PathBuf,
    size: u32,
    target: usize,
    next_index: usize,
    saved: usize,
    state: CaptureState,
}

impl Collector {
    pub fn new(root: impl AsRef<Path>, label: &str, size: u32, target: usize) -> Result<Self, Error> {
        let dir = root.as_ref().join(label);
        fs::create_dir_all(&dir)?;
        let next_index = next_free_index(&dir, label)?;

        log::info!("Saving images to {}", dir.display());
        if next_index > 0 {
            log::info!("Continuing after {} existing images of {}", next_index, label);
        }

        Ok(Self {
            label: label.to_owned(),
            dir,
            size,
            target,
            next_index,
            saved: 0,
            state: CaptureState::Idle,
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn handle(&mut self, command: Command) -> Step {
        match (command, self.state) {
            (Command::Quit, _) => {
                log::info!("Quit requested after {} images", self.saved);
                Step::Done
            }
            (Command::Start, CaptureState::Idle) => {
                log::info!("Starting capture of {} images", self.target);
                self.state = CaptureState::Collecting;
                self.progress()
            }
            (Command::Start, CaptureState::Collecting) => Step::Continue,
        }
    }

    /// Save `frame` if collecting. Frames are cropped to a centered square and resized.
    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<Step, Error> {
        if self.state == CaptureState::Idle {
            return Ok(Step::Continue);
        }
        if self.saved >= self.target {
            return Ok(Step::Done);
        }

        let square = imaging::center_square(frame);
        let resized = imaging::resize_square(&square, self.size);

        let path = self
            .dir
            .join(format!("{}_{}.jpg", &self.label, self.next_index));
        resized.save(&path)?;
        log::debug!("Saved {}", path.display());

        self.next_index += 1;
        self.saved += 1;

        Ok(self.progress())
    }

    fn progress(&self) -> Step {
        match self.saved >= self.target {
            true => {
                log::info!("Done capturing {} images", self.saved);
                Step::Done
            }
            false => {
                if self.saved > 0 && self.saved % 100 == 0 {
                    log::info!("Saved {}/{} images", self.saved, self.target);
                }
                Step::Continue
            }
        }
    }
}

/// First index not used by an existing `<label>_<n>.jpg` in `dir`.
fn next_free_index(dir: &Path, label: &str) -> Result<usize, Error> {
    let prefix = format!("{label}_");
    let mut next = 0;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let index = name
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|rest| rest.strip_suffix(".jpg"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(index) = index {
            next = next.max(index + 1);
        }
    }
    Ok(next)
}

/// Read commands from stdin lines on a dedicated thread.
pub fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => log::warn!("Unknown command {:?}, use 'c' to start or 'q' to quit", line),
            }
        }
    });
    rx
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    fn frame() -> RgbImage {
        RgbImage::from_pixel(160, 120, Rgb([10, 200, 30]))
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::parse("c\n"), Some(Command::Start));
        assert_eq!(Command::parse(" Q "), Some(Command::Quit));
        assert_eq!(Command::parse("x"), None);
    }

    #[test]
    fn test_idle_collector_saves_nothing() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let mut collector = Collector::new(root.path(), "A", 100, 3)?;

        assert_eq!(collector.process_frame(&frame())?, Step::Continue);
        assert_eq!(collector.saved(), 0);
        assert_eq!(fs::read_dir(root.path().join("A"))?.count(), 0);

        Ok(())
    }

    #[test]
    fn test_collects_until_target() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let mut collector = Collector::new(root.path(), "B", 100, 2)?;

        assert_eq!(collector.handle(Command::Start), Step::Continue);
        assert_eq!(collector.state(), CaptureState::Collecting);
        assert_eq!(collector.process_frame(&frame())?, Step::Continue);
        assert_eq!(collector.process_frame(&frame())?, Step::Done);

        let saved = image::open(root.path().join("B").join("B_1.jpg"))?;
        assert_eq!((saved.width(), saved.height()), (100, 100));

        Ok(())
    }

    #[test]
    fn test_quit_while_collecting() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let mut collector = Collector::new(root.path(), "C", 50, 10)?;

        collector.handle(Command::Start);
        collector.process_frame(&frame())?;

        assert_eq!(collector.handle(Command::Quit), Step::Done);
        assert_eq!(collector.saved(), 1);

        Ok(())
    }

    #[test]
    fn test_continues_after_existing_images() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("D");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("D_0.jpg"), b"")?;
        fs::write(dir.join("D_7.jpg"), b"")?;
        fs::write(dir.join("notes.txt"), b"")?;

        let mut collector = Collector::new(root.path(), "D", 20, 1)?;
        collector.handle(Command::Start);
        collector.process_frame(&frame())?;

        assert!(dir.join("D_8.jpg").exists());

        Ok(())
    }

    #[test]
    fn test_zero_target_is_done_on_start() -> Result<(), Error> {
        let root = tempfile::tempdir()?;
        let mut collector = Collector::new(root.path(), "E", 20, 0)?;

        assert_eq!(collector.handle(Command::Start), Step::Done);

        Ok(())
    }
}
