//! Application configuration and CLI argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::voices::{self, DEFAULT_SPEAKER, Frontend, Speaker};

/// Kokoro model directory name under `model_dir/tts`.
const KOKORO_DIR: &str = "kokoro-multi-lang-v1_0";

/// Hardware acceleration provider for ONNX models.
/// Auto-detected based on platform if not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// CPU inference (default fallback, always available)
    #[default]
    Cpu,
    /// NVIDIA CUDA acceleration (Linux only, requires CUDA toolkit)
    Cuda,
    /// Apple CoreML acceleration (macOS only, uses Neural Engine)
    #[value(name = "coreml")]
    CoreMl,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sherpa_provider())
    }
}

impl Provider {
    /// Convert to sherpa-rs provider string.
    pub fn as_sherpa_provider(&self) -> &'static str {
        match self {
            Provider::Cpu => "cpu",
            Provider::Cuda => "cuda",
            Provider::CoreMl => "coreml",
        }
    }
}

/// Utterify application configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "utterify")]
#[command(author, version, about = "Type text, pick a voice, hear it spoken", long_about = None)]
pub struct AppConfig {
    /// List all available speakers and exit
    #[arg(long)]
    pub list_speakers: bool,

    /// Directory containing the Kokoro model files
    #[arg(long, short = 'd', env = "MODEL_DIR", default_value_os_t = default_model_dir())]
    pub model_dir: PathBuf,

    /// Directory downloaded audio files are written to
    #[arg(long, env = "UTTERIFY_DOWNLOAD_DIR", default_value_os_t = default_download_dir())]
    pub download_dir: PathBuf,

    /// Initial speaker (backend identifier such as af_bella, or a display name)
    #[arg(long, short = 's', default_value = DEFAULT_SPEAKER)]
    pub speaker: String,

    /// Text-to-speech speed multiplier
    #[arg(long, default_value = "1.0")]
    pub tts_speed: f32,

    /// Hardware acceleration provider (auto-detected if not specified)
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// TTS threads (0 = auto-detect based on CPU cores)
    #[arg(long, default_value = "0")]
    pub tts_threads: usize,

    /// Seconds to wait for the worker to report ready before giving up
    #[arg(long, default_value = "300")]
    pub load_timeout_secs: u64,

    /// Seconds a generation may run before a stall warning is logged
    #[arg(long, default_value = "120")]
    pub generation_timeout_secs: u64,

    /// Do not open an audio output device (artifacts are still downloadable)
    #[arg(long)]
    pub mute: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        let mut config = Self::parse();

        if config.list_speakers {
            voices::print_speakers();
            std::process::exit(0);
        }

        config.normalize_thread_counts();
        config
    }

    /// Pick a TTS thread count when none was given.
    ///
    /// GPU providers get a single thread since the device handles parallelism;
    /// on CPU a third of the cores leaves headroom for playback and the UI loop.
    fn normalize_thread_counts(&mut self) {
        if self.tts_threads == 0 {
            self.tts_threads = if self.effective_provider() == Provider::Cuda { 1 } else { (num_cpus::get() / 3).max(1) };
        }
    }

    /// Get the effective inference provider.
    pub fn effective_provider(&self) -> Provider {
        self.provider.unwrap_or_else(detect_provider)
    }

    /// The initial speaker, if the configured key names a table member.
    pub fn initial_speaker(&self) -> Option<Speaker> {
        Speaker::lookup(&self.speaker)
    }

    fn kokoro_dir(&self) -> PathBuf {
        self.model_dir.join("tts").join(KOKORO_DIR)
    }

    /// Get the path to the Kokoro TTS model.
    pub fn tts_model_path(&self) -> PathBuf {
        self.kokoro_dir().join("model.onnx")
    }

    /// Get the path to the Kokoro TTS voices.bin file.
    pub fn tts_voices_path(&self) -> PathBuf {
        self.kokoro_dir().join("voices.bin")
    }

    /// Get the path to the TTS tokens file.
    pub fn tts_tokens_path(&self) -> PathBuf {
        self.kokoro_dir().join("tokens.txt")
    }

    /// Get the path to the TTS data directory.
    pub fn tts_data_dir(&self) -> PathBuf {
        self.kokoro_dir().join("espeak-ng-data")
    }

    /// Get the path to the TTS dict directory (for Chinese segmentation).
    pub fn tts_dict_dir(&self) -> PathBuf {
        self.kokoro_dir().join("dict")
    }

    /// Model files the worker stages before reporting ready, in load order.
    pub fn model_files(&self) -> Vec<PathBuf> {
        vec![self.tts_tokens_path(), self.tts_voices_path(), self.tts_model_path()]
    }

    /// Comma-separated lexicon paths for `frontend`, empty for espeak-ng voices.
    pub fn tts_lexicon(&self, frontend: Frontend) -> String {
        let dir = self.kokoro_dir();
        frontend.lexicons.iter().map(|name| dir.join(name).to_string_lossy().to_string()).collect::<Vec<_>>().join(",")
    }

    /// Load watchdog deadline.
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Generation stall warning threshold.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Validate the configuration.
    ///
    /// Missing model files are not checked here: the worker reports them over the
    /// channel so the pipeline can surface the failure.
    pub fn validate(&self) -> Result<()> {
        if !self.model_dir.exists() {
            anyhow::bail!("Model directory does not exist: {}", self.model_dir.display());
        }

        if self.initial_speaker().is_none() {
            anyhow::bail!("Unknown speaker '{}'. Run with --list-speakers to see available speakers", self.speaker);
        }

        if self.tts_speed <= 0.0 {
            anyhow::bail!("TTS speed must be positive");
        }

        if self.load_timeout_secs == 0 {
            anyhow::bail!("Load timeout must be at least one second");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Model directory: {}", self.model_dir.display());
        info!("  Download directory: {}", self.download_dir.display());
        if let Some(speaker) = self.initial_speaker() {
            info!("  Speaker: {}", speaker);
        }
        info!("  TTS speed: {}", self.tts_speed);
        info!("  Provider: {} ({} threads)", self.effective_provider(), self.tts_threads);
        info!("  Load timeout: {}s", self.load_timeout_secs);
        info!("  Generation timeout: {}s", self.generation_timeout_secs);
        if self.mute {
            info!("  Audio output: muted");
        }
        if let Ok(json) = serde_json::to_string(self) {
            debug!("Effective configuration: {}", json);
        }
    }
}

/// Get the default model directory (~/.utterify/models).
fn default_model_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".utterify").join("models")
    } else {
        PathBuf::from("models")
    }
}

/// Get the default download directory, falling back to the working directory.
fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Auto-detect the best hardware acceleration provider.
fn detect_provider() -> Provider {
    #[cfg(target_os = "macos")]
    {
        Provider::CoreMl
    }

    #[cfg(target_os = "linux")]
    {
        if has_nvidia_gpu() { Provider::Cuda } else { Provider::Cpu }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Provider::Cpu
    }
}

/// Check if an NVIDIA GPU is available (Linux only).
#[cfg(target_os = "linux")]
fn has_nvidia_gpu() -> bool {
    use std::path::Path;

    // Desktop device nodes, then Jetson (Tegra)
    ["/dev/nvidia0", "/dev/nvidiactl", "/dev/nvhost-ctrl-gpu", "/etc/nv_tegra_release"]
        .iter()
        .any(|path| Path::new(path).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["utterify"];
        argv.extend_from_slice(args);
        AppConfig::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--model-dir", "/tmp/models", "--provider", "cpu"]);
        assert_eq!(config.initial_speaker(), Some(Speaker::default()));
        assert_eq!(config.effective_provider(), Provider::Cpu);
        assert_eq!(config.load_timeout(), Duration::from_secs(300));
        assert!(!config.mute);
    }

    #[test]
    fn test_lexicon_paths_follow_frontend() {
        let config = parse(&["--model-dir", "/m"]);
        let british = Speaker::from_id("bf_emma").unwrap().frontend();
        assert_eq!(config.tts_lexicon(british), "/m/tts/kokoro-multi-lang-v1_0/lexicon-gb-en.txt");

        let chinese = Speaker::from_id("zm_yunxi").unwrap().frontend();
        assert_eq!(
            config.tts_lexicon(chinese),
            "/m/tts/kokoro-multi-lang-v1_0/lexicon-us-en.txt,/m/tts/kokoro-multi-lang-v1_0/lexicon-zh.txt"
        );

        let spanish = Speaker::from_id("ef_dora").unwrap().frontend();
        assert!(config.tts_lexicon(spanish).is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().to_string_lossy().to_string();

        let ok = parse(&["--model-dir", &model_dir]);
        assert!(ok.validate().is_ok());

        let bad = parse(&["--model-dir", &model_dir, "--speaker", "nobody"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_model_files_live_under_kokoro_dir() {
        let config = parse(&["--model-dir", "/m"]);
        let files = config.model_files();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|p| p.starts_with("/m/tts/kokoro-multi-lang-v1_0")));
    }
}
