use std::sync::mpsc::TryRecvError;

use cam_collector::{
    capture::{spawn_command_reader, Collector, Step},
    sensors::{open_capture, CameraSettings},
    Error,
};
use clap::Parser;
use env_logger::TimestampPrecision;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Label (class directory) of the sign being recorded
    #[clap(long, default_value = "A")]
    label: String,

    /// Number of images to save
    #[clap(long, default_value_t = 2000)]
    count: usize,

    /// Side length of the saved square images
    #[clap(long, default_value_t = common::IMAGE_SIZE)]
    size: u32,

    /// Dataset root containing one directory per label
    #[clap(long, default_value = "dataset/asl_alphabet_train")]
    root: String,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Capture width, defaults to the largest the camera supports
    #[clap(long, requires = "height")]
    width: Option<u32>,

    /// Capture height, defaults to the largest the camera supports
    #[clap(long, requires = "width")]
    height: Option<u32>,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let settings = CameraSettings {
        device: args.device.clone(),
        resolution: args.width.zip(args.height),
        ..Default::default()
    };
    let capture_fn = open_capture(&settings)?;

    let mut collector = Collector::new(&args.root, &args.label, args.size, args.count)?;
    let commands = spawn_command_reader();

    log::info!(
        "Ready to record sign {}: type 'c' + Enter to start, 'q' + Enter to quit",
        &args.label
    );

    loop {
        match commands.try_recv() {
            Ok(command) => {
                if collector.handle(command) == Step::Done {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::info!("Input closed, stopping");
                break;
            }
        }

        let frame = match capture_fn() {
            Some(frame) => frame,
            None => {
                log::error!("Unable to capture frame, trying again...");
                continue;
            }
        };

        let image = match image::load_from_memory(&frame[..]) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                log::warn!("Skipping undecodable frame: {err}");
                continue;
            }
        };

        if collector.process_frame(&image)? == Step::Done {
            break;
        }
    }

    log::info!("Saved {} images of {}", collector.saved(), &args.label);

    Ok(())
}
