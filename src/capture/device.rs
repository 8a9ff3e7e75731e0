use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
};

use anyhow::Result;
use image::RgbImage;
use log::{error, info, warn};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

use super::{
    stream::{stream_channel, LiveStream},
    CaptureSource,
};
use crate::error::CaptureError;

const MAX_CONSECUTIVE_READ_FAILURES: u32 = 30;

fn open_camera(index: u32) -> Result<Camera> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = Camera::new(CameraIndex::Index(index), requested)?;
    camera.open_stream()?;
    Ok(camera)
}

/// Physical webcam read on a dedicated capture thread.
#[derive(Debug)]
pub struct DeviceCamera {
    index: u32,
}

impl DeviceCamera {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

impl CaptureSource for DeviceCamera {
    fn label(&self) -> String {
        format!("camera #{}", self.index)
    }

    fn acquire(&self) -> Result<LiveStream, CaptureError> {
        let (mut feed, frames) = stream_channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let index = self.index;

        // The camera is opened on the capture thread; acquire waits for the
        // outcome so a missing device fails here rather than mid-session.
        let handle = thread::spawn(move || {
            let mut camera = match open_camera(index) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(()));
                    camera
                }
                Err(err) => {
                    error!("failed to open camera #{index}: {err:?}");
                    let _ = ready_tx.send(Err(err.to_string()));
                    return;
                }
            };

            let mut failures = 0;
            while !stop_flag.load(Ordering::Relaxed) {
                let frame = match camera.frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        failures += 1;
                        warn!("camera frame read failed: {err:?}");
                        if failures >= MAX_CONSECUTIVE_READ_FAILURES {
                            feed.fail(format!("camera stopped delivering frames: {err}"));
                            break;
                        }
                        continue;
                    }
                };
                failures = 0;

                let decoded = match frame.decode_image::<RgbFormat>() {
                    Ok(img) => img,
                    Err(err) => {
                        warn!("failed to decode camera frame: {err:?}");
                        continue;
                    }
                };

                let (width, height) = decoded.dimensions();
                let Some(image) = RgbImage::from_raw(width, height, decoded.into_raw()) else {
                    continue;
                };
                if !feed.push(image) {
                    break;
                }
            }

            if let Err(err) = camera.stop_stream() {
                warn!("failed to stop camera stream: {err:?}");
            }
            info!("camera #{index} capture thread stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = handle.join();
                return Err(CaptureError::unavailable(reason));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::unavailable("camera thread exited before opening"));
            }
        }
        info!("acquired {}", self.label());

        // Release only signals the capture thread. It may be parked in a
        // blocking read, so it stops the device itself instead of being joined
        // from async code.
        drop(handle);
        Ok(LiveStream::new(self.label(), frames, move || {
            stop.store(true, Ordering::SeqCst);
        }))
    }
}
