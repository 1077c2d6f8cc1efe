//! Announcement sink: a panned tone per cue, the text spoken through the
//! system speech engine, and the same text on the status log.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nav::{Announce, Cue, Feedback};
use rodio::source::{ChannelVolume, SineWave};
use rodio::{OutputStream, Sink, Source};

use crate::config::{SharedConfig, SpeechConfig};

const CUE_LENGTH: Duration = Duration::from_millis(140);
/// Cues queued beyond this are dropped rather than played late.
const MAX_QUEUED: usize = 2;

/// Tone pitch per cue; `None` for speech-only announcements.
pub fn pitch(cue: Cue) -> Option<f32> {
	match cue {
		Cue::Direction { behind: false } => Some(880.0),
		Cue::Direction { behind: true } => Some(440.0),
		Cue::Facing | Cue::Aligned => Some(1320.0),
		Cue::NotFound => Some(220.0),
		Cue::Recalibrating => Some(330.0),
		Cue::DetectionUnavailable => Some(165.0),
		Cue::CouldNotAlign => Some(262.0),
		Cue::Cancelled => Some(523.0),
		Cue::Info => None,
	}
}

/// `[left, right]` gains for a pan in `[-1, 1]`, scaled by a distance
/// `volume` in `[0, 1]`.
pub fn channel_gains(pan: f32, volume: f32) -> [f32; 2] {
	let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
	let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
	[volume * (1.0 - pan) / 2.0, volume * (1.0 + pan) / 2.0]
}

#[derive(Debug, Clone, Copy)]
struct Tone {
	pitch: f32,
	pan: f32,
	volume: f32,
}

/// Plays tones on a dedicated thread that owns the output stream.
#[derive(Clone)]
pub struct ToneSink {
	tx: Sender<Tone>,
}

impl ToneSink {
	pub fn spawn(config: SharedConfig) -> std::io::Result<Self> {
		let (tx, rx) = mpsc::channel::<Tone>();
		std::thread::Builder::new().name("audio".to_owned()).spawn(move || {
			let (_stream, handle) = match OutputStream::try_default() {
				Ok(v) => v,
				Err(err) => {
					tracing::warn!(error = %err, "no audio output; cues are text only");
					for _ in rx {}
					return;
				}
			};
			let sink = match Sink::try_new(&handle) {
				Ok(sink) => sink,
				Err(err) => {
					tracing::warn!(error = %err, "failed to open audio sink; cues are text only");
					for _ in rx {}
					return;
				}
			};

			for tone in rx {
				let volume = config.read().volume.clamp(0.0, 1.0);
				if volume <= 0.0 || sink.len() >= MAX_QUEUED {
					continue;
				}
				let source = SineWave::new(tone.pitch)
					.take_duration(CUE_LENGTH)
					.fade_in(Duration::from_millis(10))
					.amplify(volume);
				sink.append(ChannelVolume::new(source, channel_gains(tone.pan, tone.volume).to_vec()));
			}
		})?;
		Ok(Self { tx })
	}

	fn play(&self, tone: Tone) {
		if self.tx.send(tone).is_err() {
			tracing::debug!("audio thread is gone; tone dropped");
		}
	}
}

/// A text-to-speech engine.
pub trait Voice {
	fn speak(&mut self, text: &str, interrupt: bool, volume: f32) -> anyhow::Result<()>;
}

#[cfg(windows)]
mod voice {
	use anyhow::{Context, Result};

	/// SAPI, or the running screen reader when `tts` finds one.
	pub struct SystemVoice(tts::Tts);

	impl SystemVoice {
		pub fn open() -> Result<Self> {
			Ok(Self(tts::Tts::default().context("open speech engine")?))
		}
	}

	impl super::Voice for SystemVoice {
		fn speak(&mut self, text: &str, interrupt: bool, volume: f32) -> Result<()> {
			let (min, max) = (self.0.min_volume(), self.0.max_volume());
			// Some backends (screen readers) have no volume control.
			if let Err(err) = self.0.set_volume(min + volume.clamp(0.0, 1.0) * (max - min)) {
				tracing::debug!(error = %err, "speech volume not set");
			}
			self.0.speak(text, interrupt).context("speak")?;
			Ok(())
		}
	}
}

#[cfg(not(windows))]
mod voice {
	use anyhow::{Result, bail};

	pub struct SystemVoice;

	impl SystemVoice {
		pub fn open() -> Result<Self> {
			bail!("no speech engine on this platform")
		}
	}

	impl super::Voice for SystemVoice {
		fn speak(&mut self, _text: &str, _interrupt: bool, _volume: f32) -> Result<()> {
			Ok(())
		}
	}
}

pub use voice::SystemVoice;

struct Utterance {
	text: String,
	interrupt: bool,
	volume: f32,
}

/// Speaks announcements on a dedicated thread that owns the engine.
#[derive(Clone)]
pub struct SpeechSink {
	tx: Sender<Utterance>,
	config: SharedConfig,
}

impl SpeechSink {
	pub fn spawn(config: SharedConfig) -> std::io::Result<Self> {
		Self::spawn_with(config, SystemVoice::open)
	}

	/// `open` runs on the speech thread; engines are not always `Send`.
	pub fn spawn_with<V, F>(config: SharedConfig, open: F) -> std::io::Result<Self>
	where
		V: Voice,
		F: FnOnce() -> anyhow::Result<V> + Send + 'static,
	{
		let (tx, rx) = mpsc::channel::<Utterance>();
		std::thread::Builder::new().name("speech".to_owned()).spawn(move || {
			let mut voice = match open() {
				Ok(voice) => voice,
				Err(err) => {
					tracing::warn!("speech unavailable; announcements are logged only: {err:#}");
					for _ in rx {}
					return;
				}
			};
			for utterance in rx {
				if let Err(err) = voice.speak(&utterance.text, utterance.interrupt, utterance.volume) {
					tracing::warn!("speech failed: {err:#}");
				}
			}
		})?;
		Ok(Self { tx, config })
	}

	fn say(&self, text: &str) {
		let SpeechConfig {
			enabled,
			interrupt,
			volume,
		} = self.config.read().speech;
		if !enabled {
			return;
		}
		let utterance = Utterance {
			text: text.to_owned(),
			interrupt,
			volume,
		};
		if self.tx.send(utterance).is_err() {
			tracing::debug!("speech thread is gone; announcement not spoken");
		}
	}
}

/// Most recent announcements, newest last.
#[derive(Debug, Clone, Default)]
pub struct StatusLog(Arc<Mutex<VecDeque<String>>>);

impl StatusLog {
	const CAPACITY: usize = 200;

	pub fn push(&self, line: impl Into<String>) {
		let mut log = self.0.lock().unwrap_or_else(PoisonError::into_inner);
		if log.len() >= Self::CAPACITY {
			log.pop_front();
		}
		log.push_back(line.into());
	}

	pub fn lines(&self) -> Vec<String> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
	}

	pub fn last(&self) -> Option<String> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).back().cloned()
	}
}

/// The application's [`Announce`] sink.
pub struct Speaker {
	tones: Option<ToneSink>,
	speech: Option<SpeechSink>,
	log: StatusLog,
}

impl Speaker {
	pub fn new(tones: Option<ToneSink>, speech: Option<SpeechSink>, log: StatusLog) -> Self {
		Self { tones, speech, log }
	}
}

impl Announce for Speaker {
	fn announce(&self, feedback: &Feedback) {
		tracing::info!(cue = ?feedback.cue, pan = feedback.pan, volume = feedback.volume, "{}", feedback.text);
		self.log.push(feedback.text.clone());
		if let (Some(tones), Some(pitch)) = (&self.tones, pitch(feedback.cue)) {
			tones.play(Tone {
				pitch,
				pan: feedback.pan,
				volume: feedback.volume,
			});
		}
		if let Some(speech) = &self.speech {
			speech.say(&feedback.text);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::config::Config;

	#[test]
	fn gains_follow_pan() {
		assert_eq!(channel_gains(-1.0, 1.0), [1.0, 0.0]);
		assert_eq!(channel_gains(0.0, 1.0), [0.5, 0.5]);
		assert_eq!(channel_gains(1.0, 1.0), [0.0, 1.0]);
		assert_eq!(channel_gains(3.0, 1.0), [0.0, 1.0]);
		assert_eq!(channel_gains(f32::NAN, 1.0), [0.5, 0.5]);
	}

	#[test]
	fn distant_cues_are_quieter() {
		let cfg = nav::FeedbackConfig::default();
		let near = nav::compose(&cfg, "x", &nav::BearingResult::valid(45.0, 10.0), 0.0);
		let far = nav::compose(&cfg, "x", &nav::BearingResult::valid(45.0, 200.0), 0.0);
		let [nl, nr] = channel_gains(near.pan, near.volume);
		let [fl, fr] = channel_gains(far.pan, far.volume);
		assert!(fl < nl && fr < nr);
		// Same direction, same balance.
		assert!((nr / nl - fr / fl).abs() < 1e-4);
		assert_eq!(channel_gains(0.0, 0.5), [0.25, 0.25]);
	}

	struct Recording(Sender<(String, bool, f32)>);

	impl Voice for Recording {
		fn speak(&mut self, text: &str, interrupt: bool, volume: f32) -> anyhow::Result<()> {
			self.0
				.send((text.to_owned(), interrupt, volume))
				.map_err(|_| anyhow::anyhow!("recorder dropped"))
		}
	}

	#[test]
	fn speech_follows_config() {
		let config = SharedConfig::new(Config::default());
		let (tx, rx) = mpsc::channel();
		let sink = SpeechSink::spawn_with(config.clone(), move || Ok(Recording(tx))).unwrap();
		let log = StatusLog::default();
		let speaker = Speaker::new(None, Some(sink.clone()), log.clone());

		speaker.announce(&nav::compose_facing(Some(180.0)));
		let (text, interrupt, volume) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(text, "Facing south, 180 degrees");
		assert!(interrupt);
		assert_eq!(volume, config.read().speech.volume);

		let mut muted = config.snapshot();
		muted.speech.enabled = false;
		config.replace(muted);
		sink.say("silent");
		let mut enabled = config.snapshot();
		enabled.speech.enabled = true;
		enabled.speech.interrupt = false;
		config.replace(enabled);
		sink.say("spoken");
		let (text, interrupt, _) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(text, "spoken");
		assert!(!interrupt);
		assert_eq!(log.last().as_deref(), Some("Facing south, 180 degrees"));
	}

	#[test]
	fn missing_engine_falls_back_to_the_log() {
		let config = SharedConfig::new(Config::default());
		let sink =
			SpeechSink::spawn_with(config, || -> anyhow::Result<Recording> { anyhow::bail!("no engine") }).unwrap();
		let log = StatusLog::default();
		let speaker = Speaker::new(None, Some(sink), log.clone());
		speaker.announce(&nav::compose_facing(None));
		assert_eq!(log.last().as_deref(), Some("Player direction not found"));
	}

	#[test]
	fn behind_is_lower_than_ahead() {
		let ahead = pitch(Cue::Direction { behind: false }).unwrap();
		let behind = pitch(Cue::Direction { behind: true }).unwrap();
		assert!(behind < ahead);
		assert_eq!(pitch(Cue::Info), None);
		assert_ne!(pitch(Cue::NotFound), pitch(Cue::Recalibrating));
		assert_ne!(pitch(Cue::Recalibrating), pitch(Cue::DetectionUnavailable));
	}

	#[test]
	fn log_is_bounded_and_ordered() {
		let log = StatusLog::default();
		for i in 0..(StatusLog::CAPACITY + 5) {
			log.push(format!("line {i}"));
		}
		let lines = log.lines();
		assert_eq!(lines.len(), StatusLog::CAPACITY);
		assert_eq!(lines[0], "line 5");
		assert_eq!(log.last().as_deref(), Some("line 204"));
	}

	#[test]
	fn speaker_logs_without_audio() {
		let log = StatusLog::default();
		let speaker = Speaker::new(None, None, log.clone());
		let fb = nav::compose_facing(Some(90.0));
		speaker.announce(&fb);
		assert_eq!(log.last().as_deref(), Some("Facing east, 90 degrees"));
	}
}
