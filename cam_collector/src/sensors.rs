//! Sensors module.
//!
use rscam::{Camera, Config, Frame};
use simple_error::simple_error;

use crate::Error;

pub type CaptureFn = Box<dyn Fn() -> Option<Frame>>;

/// Camera settings. Unset values are negotiated to the maximum the device supports.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub device: String,
    pub format: String,
    pub resolution: Option<(u32, u32)>,
    pub frame_rate: Option<(u32, u32)>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            format: "MJPG".into(),
            resolution: None,
            frame_rate: None,
        }
    }
}

/// Open a V4L2 video device and return a function capturing one encoded frame per call.
pub fn open_capture(settings: &CameraSettings) -> Result<CaptureFn, Error> {
    let mut cam = Camera::new(&settings.device)?;
    log_supported_formats(&cam, &settings.format);
    let format = settings.format.as_bytes();

    let resolution = settings
        .resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let frame_rate = settings
        .frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;

    log::info!(
        "Using camera {} at {}x{}, interval {}/{}s",
        &settings.device,
        resolution.0,
        resolution.1,
        frame_rate.0,
        frame_rate.1
    );

    cam.start(&Config {
        interval: frame_rate,
        resolution,
        format,
        ..Default::default()
    })?;

    let callback = move || cam.capture().ok();
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32), Error> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .into_iter()
            .max_by_key(|&(width, height)| width * height),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| simple_error!("No resolution found").into())
}

/// Get the maximum supported frame rate for the given format and resolution.
///
/// Intervals are reported as `(numerator, denominator)` seconds per frame, so the highest
/// frame rate is the smallest interval.
fn get_max_frame_rate(
    cam: &Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32), Error> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .into_iter()
            .filter(|&(numerator, _)| numerator > 0)
            .max_by(|a, b| frames_per_second(*a).total_cmp(&frames_per_second(*b))),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}

fn frames_per_second((numerator, denominator): (u32, u32)) -> f64 {
    denominator as f64 / numerator as f64
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(Result::ok).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_frames_per_second() {
        assert_eq!(frames_per_second((1, 30)), 30.0);
        assert_eq!(frames_per_second((2, 15)), 7.5);
    }

    #[test]
    fn get_cam_info_if_available() -> Result<(), Error> {
        let settings = CameraSettings::default();

        match Camera::new(&settings.device) {
            Err(err) => println!("Could not initialize camera (maybe non available): {err}"),
            Ok(cam) => {
                let format = settings.format.as_bytes();
                match get_max_resolution(&cam, format) {
                    Ok(resolution) => {
                        println!("Selected resolution: {resolution:?}");
                        let frame_rate = get_max_frame_rate(&cam, format, resolution)?;
                        println!("Selected frame interval: {frame_rate:?}");
                    }
                    Err(err) => println!("Camera does not support {}: {err}", &settings.format),
                }
            }
        }

        Ok(())
    }
}
