//! Audio output through the default cpal device.
//!
//! Samples are pushed into a lock-free ring buffer drained by the device
//! callback. Input at any sample rate is resampled to the device rate first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::{Condvar, Mutex};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use tracing::{debug, info, warn};

use super::resampler::resample;
use super::util::{find_best_config, get_device_name};

/// Size of the playback ring buffer in samples (~11 seconds at 48kHz).
const PLAYBACK_RING_SIZE: usize = 524288;

/// How long `play` sleeps between checks while waiting for the buffer to drain.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Issues one ticket per playback; only the newest ticket may play.
///
/// Tickets are taken on the caller's thread before decoding starts, so a stop
/// or a newer artifact supersedes playback that has not reached the device yet.
#[derive(Debug, Default)]
pub struct PlayTickets {
    current: AtomicU64,
}

impl PlayTickets {
    /// Supersede every earlier ticket and return a new one.
    pub fn issue(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Supersede every ticket issued so far.
    pub fn cancel(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.current.load(Ordering::SeqCst) == ticket
    }
}

/// Drained-buffer signal shared with the device callback.
#[derive(Default)]
struct Drained {
    lock: Mutex<()>,
    cond: Condvar,
}

/// Audio player bound to the default output device.
pub struct Player {
    /// Kept alive to maintain the audio stream
    _stream: Stream,
    device_sample_rate: u32,
    producer: Mutex<ringbuf::HeapProd<f32>>,
    tickets: PlayTickets,
    /// Makes the callback drop whatever is queued
    flush: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    drained: Arc<Drained>,
}

impl Player {
    /// Open the default output device.
    ///
    /// # Errors
    /// Returns an error if no output device is available or the stream cannot
    /// be built.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("No output device available")?;

        info!("Using output device: {}", get_device_name(&device));

        let preferred_rate = match device.default_output_config() {
            Ok(default_config) => default_config.sample_rate(),
            Err(_) => 48000,
        };

        let supported_configs = device.supported_output_configs().context("Failed to get supported output configs")?;
        let config = find_best_config(supported_configs, preferred_rate)?;
        let device_sample_rate = config.sample_rate();

        debug!("Audio playback config: {} Hz, {} channels, {:?}", device_sample_rate, config.channels(), config.sample_format());

        let ring = HeapRb::<f32>::new(PLAYBACK_RING_SIZE);
        let (producer, mut consumer) = ring.split();

        let flush = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(false));
        let drained = Arc::new(Drained::default());

        let cb_flush = flush.clone();
        let cb_playing = playing.clone();
        let cb_drained = drained.clone();

        let channels = config.channels() as usize;
        let stream_config: StreamConfig = config.config();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if cb_flush.load(Ordering::Relaxed) {
                    consumer.clear();
                }

                for frame in data.chunks_mut(channels) {
                    frame.fill(consumer.try_pop().unwrap_or(0.0));
                }

                if consumer.is_empty() && cb_playing.swap(false, Ordering::SeqCst) {
                    let _guard = cb_drained.lock.lock();
                    cb_drained.cond.notify_all();
                }
            },
            |err| tracing::error!("Audio playback error: {}", err),
            None,
        )?;

        stream.play().context("Failed to start playback stream")?;

        info!("Audio output ready at {} Hz", device_sample_rate);

        Ok(Self {
            _stream: stream,
            device_sample_rate,
            producer: Mutex::new(producer),
            tickets: PlayTickets::default(),
            flush,
            playing,
            drained,
        })
    }

    /// Reserve the device for the next `play` call, superseding earlier ones.
    pub fn begin(&self) -> u64 {
        self.tickets.issue()
    }

    /// Play mono samples recorded at `sample_rate` under `ticket`, blocking
    /// until they have drained or the ticket is superseded.
    ///
    /// # Returns
    /// `true` if playback completed, `false` if superseded or timed out.
    pub fn play(&self, samples: &[f32], sample_rate: u32, ticket: u64) -> bool {
        if !self.tickets.is_current(ticket) {
            debug!("Skipping superseded playback");
            return false;
        }
        if samples.is_empty() {
            return true;
        }

        let samples = if sample_rate != self.device_sample_rate {
            match resample(samples, sample_rate, self.device_sample_rate) {
                Ok(resampled) => resampled,
                Err(e) => {
                    tracing::error!("Resampling failed: {}, playing without resampling", e);
                    samples.to_vec()
                }
            }
        } else {
            samples.to_vec()
        };

        let deadline = Instant::now() + Duration::from_secs_f64(samples.len() as f64 / self.device_sample_rate as f64 + 1.0);
        let mut offset = 0;

        debug!("Playing {} samples at {} Hz", samples.len(), self.device_sample_rate);

        // Long artifacts exceed the ring, so keep topping it up as it drains.
        while offset < samples.len() {
            if !self.tickets.is_current(ticket) {
                return self.abort("superseded");
            }
            let written = self.producer.lock().push_slice(&samples[offset..]);
            offset += written;
            if written == 0 {
                std::thread::sleep(WAIT_SLICE);
            } else {
                self.playing.store(true, Ordering::SeqCst);
            }
        }

        while self.playing.load(Ordering::SeqCst) {
            if !self.tickets.is_current(ticket) {
                return self.abort("superseded");
            }
            if Instant::now() > deadline {
                warn!("Playback timeout exceeded");
                return self.abort("timed out");
            }

            let mut guard = self.drained.lock.lock();
            if self.playing.load(Ordering::SeqCst) {
                self.drained.cond.wait_for(&mut guard, WAIT_SLICE);
            }
        }

        debug!("Playback completed");
        true
    }

    /// Stop the current playback and any that has not started yet.
    pub fn interrupt(&self) {
        self.tickets.cancel();
    }

    fn abort(&self, reason: &str) -> bool {
        debug!("Playback {}", reason);
        self.flush.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        // Let the callback flush what is still queued before the next play
        std::thread::sleep(Duration::from_millis(20));
        self.flush.store(false, Ordering::SeqCst);
        false
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.tickets.cancel();
        self.flush.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_pending_playback() {
        let tickets = PlayTickets::default();
        let first = tickets.issue();
        let second = tickets.issue();

        assert!(!tickets.is_current(first));
        assert!(tickets.is_current(second));
    }

    #[test]
    fn test_cancel_supersedes_playback_not_yet_started() {
        let tickets = PlayTickets::default();
        let pending = tickets.issue();
        tickets.cancel();

        // Starting late must not revive a cancelled ticket.
        assert!(!tickets.is_current(pending));
        assert!(tickets.is_current(tickets.issue()));
    }
}
