//! V4L2 camera source.
//!
//! `V4l2Camera` opens a local device node (e.g. /dev/video0, or a bare index
//! such as `0`), negotiates a packed RGB format when the driver allows it and
//! falls back to BGR3 or YUYV otherwise. Frames are memory-mapped from the
//! driver and normalised into the session's frame storage.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_into, SourceFormat};
use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::{Frame, Resolution};

const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Camera {
    settings: CameraSettings,
    state: Option<V4l2State>,
    format: SourceFormat,
    resolution: Resolution,
    frame_count: u64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            resolution: Resolution::new(settings.width, settings.height),
            settings,
            state: None,
            format: SourceFormat::Rgb24,
            frame_count: 0,
        }
    }

    fn open_device(&self) -> Result<v4l::Device> {
        match self.settings.device.parse::<usize>() {
            Ok(index) => v4l::Device::new(index)
                .with_context(|| format!("open v4l2 device index {}", index)),
            Err(_) => v4l::Device::with_path(&self.settings.device)
                .with_context(|| format!("open v4l2 device {}", self.settings.device)),
        }
    }
}

fn source_format(fourcc: v4l::FourCC) -> Result<SourceFormat> {
    match &fourcc.repr {
        b"RGB3" => Ok(SourceFormat::Rgb24),
        b"BGR3" => Ok(SourceFormat::Bgr24),
        b"YUYV" => Ok(SourceFormat::Yuyv),
        _ => Err(anyhow!("unsupported v4l2 pixel format {}", fourcc)),
    }
}

impl FrameSource for V4l2Camera {
    fn connect(&mut self) -> Result<Resolution> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        self.state = None;
        let mut device = self.open_device()?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.settings.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = source_format(format.fourcc)?;

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Camera: failed to set fps on {}: {}",
                    self.settings.device,
                    err
                );
            }
        }

        if format.width == 0 || format.height == 0 {
            return Err(anyhow!(
                "v4l2 device {} reported an empty resolution",
                self.settings.device
            ));
        }
        self.resolution = Resolution::new(format.width, format.height);

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Camera: connected to {} ({}, {:?})",
            self.settings.device,
            self.resolution,
            self.format
        );
        Ok(self.resolution)
    }

    fn capture(&mut self, frame: &mut Frame) -> Result<()> {
        use v4l::io::traits::CaptureStream;

        let resolution = self.resolution;
        let format = self.format;
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let result = state.with_mut(|fields| -> Result<()> {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            if buf.is_empty() {
                return Err(anyhow!("v4l2 device returned an empty frame"));
            }
            let out = frame.prepare(resolution);
            normalize_into(buf, resolution.width, resolution.height, format, out)
        });

        if result.is_err() {
            // The mapping is useless once the stream fails; force a full reconnect.
            self.state = None;
        } else {
            self.frame_count += 1;
        }
        result
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.settings.device.clone(),
        }
    }
}
