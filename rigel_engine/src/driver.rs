//! Audio driver glue (§1 "the driver and the out-of-process plugin
//! binary itself are both explicit non-goals" — what's owed is the
//! contract a driver must satisfy, not a driver; this module is that
//! contract plus a `cpal` implementation so the crate is runnable).
//! Grounded on the teacher's `cpal::Stream` setup in its old prototype
//! engine, generalized from a sine/gain demo to calling [`Engine::process`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::engine::Engine;
use crate::transport::TimeInfo;

/// Keeps the `cpal::Stream` alive; dropping it stops playback.
pub struct CpalDriver {
    stream: cpal::Stream,
}

impl CpalDriver {
    /// Opens the default output device at the engine's preferred sample
    /// rate/buffer size where the device allows it, and wires every
    /// callback into `Engine::process`. The stream always outputs at
    /// least stereo; mono devices are not supported (§4.7 "ForceStereo"
    /// assumes two channels exist downstream).
    pub fn open_default_output(engine: Arc<Engine>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| anyhow::anyhow!("no output device available"))?;
        let supported = device.default_output_config()?;
        let channels = supported.channels() as usize;
        let sample_rate = supported.sample_rate() as f64;

        if (sample_rate - engine.sample_rate()).abs() > 1.0 {
            log::warn!(target: "rigel::driver", "device sample rate {sample_rate} differs from engine's preferred {}", engine.sample_rate());
        }

        let err_fn = |err| log::error!(target: "rigel::driver", "stream error: {err}");

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &supported.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(&engine, data, channels);
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow::anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play()?;
        Ok(Self { stream })
    }

    pub fn pause(&self) -> anyhow::Result<()> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn resume(&self) -> anyhow::Result<()> {
        self.stream.play()?;
        Ok(())
    }
}

/// Renders one callback's worth of frames through the engine and
/// interleaves the resulting stereo pair into the device's buffer.
/// Allocating per-callback `left`/`right` scratch buffers here (rather
/// than on the RT path inside `Engine::process`) keeps the engine itself
/// driver-agnostic; a future no-alloc driver can pool these.
fn render(engine: &Engine, data: &mut [f32], channels: usize) {
    let frames = data.len() / channels.max(1);
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];

    engine.process(&mut left, &mut right, TimeInfo::default());

    for (i, frame) in data.chunks_mut(channels).enumerate() {
        let l = left.get(i).copied().unwrap_or(0.0);
        let r = right.get(i).copied().unwrap_or(0.0);
        match frame {
            [mono] => *mono = 0.5 * (l + r),
            [fl, fr] => {
                *fl = l;
                *fr = r;
            }
            rest => {
                if let Some(fl) = rest.first_mut() {
                    *fl = l;
                }
                if let Some(fr) = rest.get_mut(1) {
                    *fr = r;
                }
            }
        }
    }
}
