//! Frame-by-frame processing of image files.
//!
//! A [`FrameSource`] yields frames from a single image or a directory of images, a [`FrameSink`]
//! persists processed frames, and [`run_frames`] drives a handler over every frame. A failure on
//! one frame is logged and does not stop the run.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    vec,
};

use anyhow::Context;

use crate::image::{is_supported_image_path, Image};
use crate::roi::RoiRejection;

/// An image loaded from a [`FrameSource`].
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    path: PathBuf,
    pub image: Image,
}

impl Frame {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, image: Image) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            image,
        }
    }

    /// Returns the file name of the frame, used to look up per-frame data and to name outputs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Iterator over the image files of a single file or a directory.
///
/// Directory entries are visited in file name order. Files are loaded lazily, so a file that fails
/// to decode only yields an error for that frame.
#[derive(Debug)]
pub struct FrameSource {
    paths: vec::IntoIter<PathBuf>,
}

impl FrameSource {
    /// Opens `path`, which may be an image file or a directory containing image files.
    ///
    /// Directory entries that are not supported images are skipped.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path)
            .with_context(|| format!("failed to access '{}'", path.display()))?;

        let paths = if meta.is_dir() {
            let mut paths = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("failed to read directory '{}'", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_supported_image_path(&entry_path) {
                    paths.push(entry_path);
                } else {
                    log::trace!("skipping '{}'", entry_path.display());
                }
            }
            paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            log::debug!("found {} images in '{}'", paths.len(), path.display());
            paths
        } else {
            if !is_supported_image_path(path) {
                anyhow::bail!("unsupported image file '{}'", path.display());
            }
            vec![path.to_path_buf()]
        };

        Ok(Self::from_paths(paths))
    }

    /// Creates a source that yields the given files in order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
        }
    }

    /// Returns the number of frames left.
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl Iterator for FrameSource {
    type Item = anyhow::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(load_frame(path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

fn load_frame(path: PathBuf) -> anyhow::Result<Frame> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid file name '{}'", path.display()))?
        .to_string();
    let image = Image::load(&path)?;
    Ok(Frame { name, path, image })
}

/// Destination for processed frames.
pub trait FrameSink {
    fn write_frame(&mut self, name: &str, image: &Image) -> anyhow::Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write_frame(&mut self, name: &str, image: &Image) -> anyhow::Result<()> {
        (**self).write_frame(name, image)
    }
}

/// Writes frames into a directory, named after the input file.
///
/// Each frame is first written to a temporary file in the same directory and then renamed, so an
/// interrupted run never leaves a partially written image behind.
#[derive(Debug)]
pub struct OutputDir {
    dir: PathBuf,
}

impl OutputDir {
    /// Creates the directory (and its parents) if it doesn't exist.
    pub fn create<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for OutputDir {
    fn write_frame(&mut self, name: &str, image: &Image) -> anyhow::Result<()> {
        let path = self.dir.join(name);
        // The temporary name keeps the extension, which selects the output format.
        let tmp = self.dir.join(format!(".tmp-{name}"));

        if let Err(e) = image.save(&tmp) {
            fs::remove_file(&tmp).ok();
            return Err(e.context(format!("failed to write '{}'", path.display())));
        }
        fs::rename(&tmp, &path).with_context(|| {
            fs::remove_file(&tmp).ok();
            format!("failed to move output into place at '{}'", path.display())
        })?;

        log::trace!("wrote '{}'", path.display());
        Ok(())
    }
}

/// Shared flag to stop a running [`run_frames`] loop from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The loop stops before the next frame.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts of what happened to the frames of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Frames that were handled and written to the sink.
    pub processed: usize,
    /// Frames whose hand region was rejected.
    pub rejected: usize,
    /// Frames that failed to load, process or write.
    pub failed: usize,
    /// Whether the run was stopped by its [`CancelToken`].
    pub cancelled: bool,
}

/// Runs `handler` on every frame of `source` and writes the result to `sink`.
///
/// The handler modifies the frame's image in place. If it fails with a [`RoiRejection`], the
/// frame is skipped with a warning. Any other error is logged and counted. In both cases the
/// run continues with the next frame.
pub fn run_frames<I, S, F>(source: I, mut sink: S, cancel: &CancelToken, mut handler: F) -> RunStats
where
    I: IntoIterator<Item = anyhow::Result<Frame>>,
    S: FrameSink,
    F: FnMut(&mut Frame) -> anyhow::Result<()>,
{
    let mut stats = RunStats::default();
    for frame in source {
        if cancel.is_cancelled() {
            log::info!("cancelled, stopping");
            stats.cancelled = true;
            break;
        }

        let result = frame.and_then(|mut frame| {
            handler(&mut frame)?;
            sink.write_frame(&frame.name, &frame.image)
        });
        match result {
            Ok(()) => stats.processed += 1,
            Err(e) => match e.downcast_ref::<RoiRejection>() {
                Some(rejection) => {
                    log::warn!("skipping frame: {}", rejection);
                    stats.rejected += 1;
                }
                None => {
                    log::error!("{:#}", e);
                    stats.failed += 1;
                }
            },
        }
    }

    log::debug!("{:?}", stats);
    stats
}
