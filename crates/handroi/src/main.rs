use std::{env, ffi::OsString, path::PathBuf, process::ExitCode};

use anyhow::Context;
use handroi::{
    anomaly::PreprocessConfig,
    app::{AnomalyState, RunState},
    hand::{HandLandmarker, HandPipelineParams},
    keypoints::KeypointTable,
    nn::Cnn,
    pipeline::{run_frames, CancelToken, FrameSource, OutputDir, RunStats},
    roi::RoiParams,
};

const USAGE: &str = "\
usage:
    handroi <keypoints.txt> <input> <output-dir> <recrop.onnx> [landmark.onnx]
    handroi anomaly <model.onnx> <input> <output-dir> [threshold]

<input> is an image file or a directory of images.";

fn main() -> ExitCode {
    handroi::init_logger!();

    let args = env::args_os().skip(1).collect::<Vec<_>>();
    let result = match args.first().and_then(|a| a.to_str()) {
        Some("-h" | "--help") | None => {
            eprintln!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Some(cmd) => cancel_on_interrupt().and_then(|cancel| {
            if cmd == "anomaly" {
                run_anomaly(&args[1..], &cancel)
            } else {
                run_hands(&args, &cancel)
            }
        }),
    };

    match result {
        Ok(stats) => {
            log::info!(
                "{} frames written, {} rejected, {} failed{}",
                stats.processed,
                stats.rejected,
                stats.failed,
                if stats.cancelled { " (interrupted)" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_hands(args: &[OsString], cancel: &CancelToken) -> anyhow::Result<RunStats> {
    let (keypoints, input, output, recrop, landmark) = match args {
        [k, i, o, r] => (k, i, o, r, None),
        [k, i, o, r, l] => (k, i, o, r, Some(l)),
        _ => anyhow::bail!("{USAGE}"),
    };

    let keypoints = KeypointTable::load(keypoints)?;
    log::debug!("loaded keypoints for {} frames", keypoints.len());

    let params = HandPipelineParams::default().with_roi(RoiParams::from_env());
    let mut landmarker = HandLandmarker::new(load_model(recrop)?, params)?;
    if let Some(landmark) = landmark {
        landmarker = landmarker.with_landmark_network(load_model(landmark)?)?;
    }

    let mut state = RunState::new(landmarker, keypoints);
    let source = FrameSource::open(input)?;
    let sink = OutputDir::create(output)?;
    Ok(run_frames(source, sink, cancel, |frame| {
        state.process(frame).map(drop)
    }))
}

fn run_anomaly(args: &[OsString], cancel: &CancelToken) -> anyhow::Result<RunStats> {
    let (model, input, output, threshold) = match args {
        [m, i, o] => (m, i, o, 0.5),
        [m, i, o, t] => {
            let t = t
                .to_str()
                .and_then(|t| t.parse::<f32>().ok())
                .with_context(|| format!("invalid threshold {:?}", t))?;
            (m, i, o, t)
        }
        _ => anyhow::bail!("{USAGE}"),
    };

    let mut state = AnomalyState::new(load_model(model)?, PreprocessConfig::default(), threshold);

    // Maps are normalized with the range of all frames, so score everything first.
    let scored = state.score_all(FrameSource::open(input)?, cancel);
    log::info!("scored {} frames, range {:?}", scored, state.range());

    let source = FrameSource::open(input)?;
    let sink = OutputDir::create(output)?;
    Ok(run_frames(source, sink, cancel, |frame| {
        let report = state.process(frame)?;
        log::info!("{}: {}", frame.name(), report);
        Ok(())
    }))
}

/// Returns a token that is cancelled when the process is interrupted with Ctrl-C.
///
/// The frame loop finishes the current frame and stops before the next one.
fn cancel_on_interrupt() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("interrupted, stopping after the current frame");
        handler.cancel();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(cancel)
}

fn load_model(path: &OsString) -> anyhow::Result<Cnn> {
    let path = PathBuf::from(path);
    Cnn::load(&path).with_context(|| format!("failed to load model '{}'", path.display()))
}
