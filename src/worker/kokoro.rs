//! Kokoro speech engine running inside the worker thread.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sherpa_rs::OnnxConfig;
use sherpa_rs::tts::{CommonTtsConfig, KokoroTts, KokoroTtsConfig};
use tracing::{debug, info};

use super::runtime::{LoadReporter, SpeechEngine};
use crate::audio::wav;
use crate::config::{AppConfig, Frontend, Speaker};

/// Kokoro always synthesizes at 24 kHz.
const KOKORO_SAMPLE_RATE: u32 = 24000;

/// Read size used while staging model files.
const STAGE_CHUNK: usize = 1 << 20;

/// Text-to-speech engine backed by sherpa-rs Kokoro.
///
/// The model is built in `load` on the worker thread. Kokoro's text front-end
/// (lexicons or espeak-ng language) is fixed per instance, so a request for a
/// voice from another language group rebuilds the model with that front-end.
pub struct KokoroEngine {
    files: Vec<PathBuf>,
    config: AppConfig,
    frontend: Frontend,
    tts: Option<KokoroTts>,
}

impl KokoroEngine {
    /// Prepare an engine for the configured initial speaker.
    pub fn new(config: &AppConfig) -> Self {
        let frontend = config.initial_speaker().unwrap_or_default().frontend();
        Self { files: config.model_files(), config: config.clone(), frontend, tts: None }
    }

    fn tts_config(&self, frontend: Frontend) -> KokoroTtsConfig {
        let config = &self.config;
        KokoroTtsConfig {
            model: config.tts_model_path().to_string_lossy().to_string(),
            voices: config.tts_voices_path().to_string_lossy().to_string(),
            tokens: config.tts_tokens_path().to_string_lossy().to_string(),
            data_dir: config.tts_data_dir().to_string_lossy().to_string(),
            dict_dir: config.tts_dict_dir().to_string_lossy().to_string(),
            lexicon: config.tts_lexicon(frontend),
            lang: frontend.lang.to_string(),
            length_scale: 1.0 / config.tts_speed, // length_scale is inverse of speed
            onnx_config: OnnxConfig {
                provider: config.effective_provider().as_sherpa_provider().to_string(),
                num_threads: config.tts_threads.try_into().unwrap_or(2),
                debug: config.verbose,
            },
            common_config: CommonTtsConfig { max_num_sentences: 1, ..Default::default() }, // Kokoro only supports 1
        }
    }

    fn build(&mut self, frontend: Frontend) -> &mut KokoroTts {
        info!("Initializing Kokoro TTS ({}) with {} provider", frontend, self.config.effective_provider());
        // Release the old model before the new one is mapped
        drop(self.tts.take());
        let tts = KokoroTts::new(self.tts_config(frontend));
        self.frontend = frontend;
        self.tts.insert(tts)
    }

    /// The front-end to switch to before speaking as `speaker`, if any.
    fn switch_for(&self, speaker: &Speaker) -> Option<Frontend> {
        let wanted = speaker.frontend();
        (wanted != self.frontend).then_some(wanted)
    }
}

impl SpeechEngine for KokoroEngine {
    fn load(&mut self, reporter: &LoadReporter) -> Result<()> {
        for path in &self.files {
            stage_file(path, reporter)?;
        }

        let frontend = self.frontend;
        self.build(frontend);
        info!("TTS sample rate: {} Hz", KOKORO_SAMPLE_RATE);
        Ok(())
    }

    fn synthesize(&mut self, text: &str, speaker_id: &str) -> Result<Vec<u8>> {
        if self.tts.is_none() {
            anyhow::bail!("Kokoro model is not loaded");
        }
        let speaker = Speaker::from_id(speaker_id).with_context(|| format!("Unknown speaker '{}'", speaker_id))?;
        let sid = speaker.voice().speaker_id;
        let speed = self.config.tts_speed;

        let tts = match self.switch_for(&speaker) {
            Some(frontend) => {
                info!("🔁 {} needs {}, reloading model", speaker, frontend);
                self.build(frontend)
            }
            None => self.tts.as_mut().context("Kokoro model is not loaded")?,
        };

        let mut samples = Vec::new();
        let sentences = split_sentences(text);
        let total = sentences.len();

        for (i, sentence) in sentences.iter().enumerate() {
            debug!("Synthesizing sentence {}/{}: \"{}\"", i + 1, total, sentence);
            let audio = tts.create(sentence, sid, speed).map_err(|e| anyhow::anyhow!("TTS generation failed: {}", e))?;
            samples.extend_from_slice(&audio.samples);
        }

        info!("🎵 Generated speech ({} samples, {} sentences, speaker {})", samples.len(), total, speaker);
        wav::encode(&samples, KOKORO_SAMPLE_RATE)
    }
}

/// Read a model file end to end, reporting whole-percent progress.
///
/// Reading up front surfaces missing or truncated files before sherpa-onnx is
/// handed the path, and leaves the file in the page cache for the model build.
fn stage_file(path: &Path, reporter: &LoadReporter) -> Result<()> {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.display().to_string());

    reporter.initiate(&name);

    let mut file = File::open(path).with_context(|| format!("Required model file not found: {}", path.display()))?;
    let total = file.metadata().with_context(|| format!("Failed to stat {}", path.display()))?.len();

    let mut buf = vec![0u8; STAGE_CHUNK];
    let mut loaded = 0u64;
    let mut last_percent = None;

    loop {
        let n = file.read(&mut buf).with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        loaded += n as u64;

        let percent = percent_of(loaded, total);
        if last_percent != Some(percent) {
            reporter.progress(&name, percent as f32);
            last_percent = Some(percent);
        }
    }

    debug!("Staged {} ({} bytes)", name, loaded);
    reporter.done(&name);
    Ok(())
}

fn percent_of(loaded: u64, total: u64) -> u32 {
    if total == 0 { 100 } else { ((loaded.min(total) * 100) / total) as u32 }
}

/// Split text into sentences for synthesis.
///
/// `.`, `!` and `?` end a sentence only when followed by whitespace or the end
/// of the text, so `3.5`, `e.g.` inside a word and `?!` stay intact. A newline
/// always ends a sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|next| next.is_whitespace()),
            _ => false,
        };
        current.push(c);
        if boundary {
            flush_sentence(&mut current, &mut sentences);
        }
    }
    flush_sentence(&mut current, &mut sentences);

    sentences
}

fn flush_sentence(current: &mut String, sentences: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::worker::messages::WorkerMessage;

    #[test]
    fn test_split_sentences() {
        assert_eq!(split_sentences("Hello there. How are you?\nFine"), vec!["Hello there.", "How are you?", "Fine"]);
        assert!(split_sentences("  \n ").is_empty());
    }

    #[test]
    fn test_split_keeps_decimals_and_runs_of_punctuation() {
        assert_eq!(
            split_sentences("It costs 3.5 euros. Really?! Wait... ok"),
            vec!["It costs 3.5 euros.", "Really?!", "Wait...", "ok"]
        );
    }

    fn engine_for(speaker: &str) -> KokoroEngine {
        let config = AppConfig::parse_from(["utterify", "--model-dir", "/m", "--provider", "cpu", "--speaker", speaker]);
        KokoroEngine::new(&config)
    }

    #[test]
    fn test_engine_starts_with_initial_speaker_frontend() {
        let engine = engine_for("ef_dora");
        let tts_config = engine.tts_config(engine.frontend);

        assert_eq!(tts_config.lang, "es");
        assert!(tts_config.lexicon.is_empty());
    }

    #[test]
    fn test_cross_language_speaker_needs_frontend_switch() {
        let mut engine = engine_for("af_bella");
        let spanish = Speaker::from_id("ef_dora").unwrap();
        let american = Speaker::from_id("am_adam").unwrap();
        assert_eq!(engine.switch_for(&american), None);
        assert_eq!(engine.switch_for(&spanish), Some(spanish.frontend()));

        engine.frontend = spanish.frontend();
        assert_eq!(engine.switch_for(&spanish), None);
        assert_eq!(engine.switch_for(&american), Some(american.frontend()));

        let tts_config = engine.tts_config(spanish.frontend());
        assert_eq!(tts_config.lang, "es");
        assert!(tts_config.lexicon.is_empty());

        let british = engine.tts_config(Speaker::from_id("bf_emma").unwrap().frontend());
        assert_eq!(british.lang, "");
        assert!(british.lexicon.ends_with("lexicon-gb-en.txt"));
    }

    #[test]
    fn test_stage_file_reports_initiate_progress_done() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voices.bin");
        std::fs::write(&path, vec![7u8; 3 * STAGE_CHUNK]).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        stage_file(&path, &LoadReporter::new(tx)).unwrap();

        let mut seen = Vec::new();
        while let Ok(message) = rx.try_recv() {
            seen.push(message);
        }
        assert_eq!(
            seen,
            vec![
                WorkerMessage::initiate("voices.bin"),
                WorkerMessage::progress("voices.bin", 33.0),
                WorkerMessage::progress("voices.bin", 66.0),
                WorkerMessage::progress("voices.bin", 100.0),
                WorkerMessage::done("voices.bin"),
            ]
        );
    }

    #[test]
    fn test_stage_missing_file_fails_after_initiate() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let err = stage_file(Path::new("/nonexistent/model.onnx"), &LoadReporter::new(tx)).unwrap_err();

        assert!(err.to_string().contains("Required model file not found"));
        assert_eq!(rx.try_recv().unwrap(), WorkerMessage::initiate("model.onnx"));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(300, 200), 100);
    }
}
