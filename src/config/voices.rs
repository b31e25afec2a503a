//! Speaker table for the Kokoro v1.0 multi-lang model.
//!
//! The table is the closed set of voices the front-end offers. Each entry maps a
//! backend identifier (the string sent to the worker) to a display name and the
//! numeric speaker id Kokoro expects.

use std::fmt;

/// Backend identifier selected when nothing else is configured.
pub const DEFAULT_SPEAKER: &str = "af_bella";

/// Metadata for a single voice.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub display_name: &'static str,
    pub speaker_id: i32,
    pub language: &'static str,
}

/// All voices keyed by backend identifier, sorted for binary search.
const VOICES: &[(&str, Voice)] = &[
    ("af_alloy", Voice { display_name: "Alloy", speaker_id: 0, language: "American English" }),
    ("af_aoede", Voice { display_name: "Aoede", speaker_id: 1, language: "American English" }),
    ("af_bella", Voice { display_name: "Bella", speaker_id: 2, language: "American English" }),
    ("af_heart", Voice { display_name: "Heart", speaker_id: 3, language: "American English" }),
    ("af_jessica", Voice { display_name: "Jessica", speaker_id: 4, language: "American English" }),
    ("af_kore", Voice { display_name: "Kore", speaker_id: 5, language: "American English" }),
    ("af_nicole", Voice { display_name: "Nicole", speaker_id: 6, language: "American English" }),
    ("af_nova", Voice { display_name: "Nova", speaker_id: 7, language: "American English" }),
    ("af_river", Voice { display_name: "River", speaker_id: 8, language: "American English" }),
    ("af_sarah", Voice { display_name: "Sarah", speaker_id: 9, language: "American English" }),
    ("af_sky", Voice { display_name: "Sky", speaker_id: 10, language: "American English" }),
    ("am_adam", Voice { display_name: "Adam", speaker_id: 11, language: "American English" }),
    ("am_echo", Voice { display_name: "Echo", speaker_id: 12, language: "American English" }),
    ("am_eric", Voice { display_name: "Eric", speaker_id: 13, language: "American English" }),
    ("am_fenrir", Voice { display_name: "Fenrir", speaker_id: 14, language: "American English" }),
    ("am_liam", Voice { display_name: "Liam", speaker_id: 15, language: "American English" }),
    ("am_michael", Voice { display_name: "Michael", speaker_id: 16, language: "American English" }),
    ("am_onyx", Voice { display_name: "Onyx", speaker_id: 17, language: "American English" }),
    ("am_puck", Voice { display_name: "Puck", speaker_id: 18, language: "American English" }),
    ("am_santa", Voice { display_name: "Santa", speaker_id: 19, language: "American English" }),
    ("bf_alice", Voice { display_name: "Alice", speaker_id: 20, language: "British English" }),
    ("bf_emma", Voice { display_name: "Emma", speaker_id: 21, language: "British English" }),
    ("bf_isabella", Voice { display_name: "Isabella", speaker_id: 22, language: "British English" }),
    ("bf_lily", Voice { display_name: "Lily", speaker_id: 23, language: "British English" }),
    ("bm_daniel", Voice { display_name: "Daniel", speaker_id: 24, language: "British English" }),
    ("bm_fable", Voice { display_name: "Fable", speaker_id: 25, language: "British English" }),
    ("bm_george", Voice { display_name: "George", speaker_id: 26, language: "British English" }),
    ("bm_lewis", Voice { display_name: "Lewis", speaker_id: 27, language: "British English" }),
    ("ef_dora", Voice { display_name: "Dora (ES)", speaker_id: 28, language: "Spanish" }),
    ("em_alex", Voice { display_name: "Alex (ES)", speaker_id: 29, language: "Spanish" }),
    ("ff_siwis", Voice { display_name: "Siwis", speaker_id: 30, language: "French" }),
    ("hf_alpha", Voice { display_name: "Alpha (HI)", speaker_id: 31, language: "Hindi" }),
    ("hf_beta", Voice { display_name: "Beta (HI)", speaker_id: 32, language: "Hindi" }),
    ("hm_omega", Voice { display_name: "Omega", speaker_id: 33, language: "Hindi" }),
    ("hm_psi", Voice { display_name: "Psi", speaker_id: 34, language: "Hindi" }),
    ("if_sara", Voice { display_name: "Sara", speaker_id: 35, language: "Italian" }),
    ("im_nicola", Voice { display_name: "Nicola", speaker_id: 36, language: "Italian" }),
    ("jf_alpha", Voice { display_name: "Alpha (JA)", speaker_id: 37, language: "Japanese" }),
    ("jf_gongitsune", Voice { display_name: "Gongitsune", speaker_id: 38, language: "Japanese" }),
    ("jf_nezumi", Voice { display_name: "Nezumi", speaker_id: 39, language: "Japanese" }),
    ("jf_tebukuro", Voice { display_name: "Tebukuro", speaker_id: 40, language: "Japanese" }),
    ("jm_kumo", Voice { display_name: "Kumo", speaker_id: 41, language: "Japanese" }),
    ("pf_dora", Voice { display_name: "Dora (PT)", speaker_id: 42, language: "Portuguese BR" }),
    ("pm_alex", Voice { display_name: "Alex (PT)", speaker_id: 43, language: "Portuguese BR" }),
    ("pm_santa", Voice { display_name: "Santa (PT)", speaker_id: 44, language: "Portuguese BR" }),
    ("zf_xiaobei", Voice { display_name: "Xiaobei", speaker_id: 45, language: "Mandarin Chinese" }),
    ("zf_xiaoni", Voice { display_name: "Xiaoni", speaker_id: 46, language: "Mandarin Chinese" }),
    ("zf_xiaoxiao", Voice { display_name: "Xiaoxiao", speaker_id: 47, language: "Mandarin Chinese" }),
    ("zf_xiaoyi", Voice { display_name: "Xiaoyi", speaker_id: 48, language: "Mandarin Chinese" }),
    ("zm_yunjian", Voice { display_name: "Yunjian", speaker_id: 49, language: "Mandarin Chinese" }),
    ("zm_yunxi", Voice { display_name: "Yunxi", speaker_id: 50, language: "Mandarin Chinese" }),
    ("zm_yunxia", Voice { display_name: "Yunxia", speaker_id: 51, language: "Mandarin Chinese" }),
    ("zm_yunyang", Voice { display_name: "Yunyang", speaker_id: 52, language: "Mandarin Chinese" }),
];

/// Text front-end a Kokoro instance is built with.
///
/// English and Chinese voices read lexicon files from the model directory; the
/// other languages go through espeak-ng with `lang`. Voices sharing a front-end
/// can share one loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontend {
    /// Lexicon file names, joined with commas when handed to sherpa-onnx
    pub lexicons: &'static [&'static str],
    /// espeak-ng language, empty when lexicons are used
    pub lang: &'static str,
}

impl Frontend {
    const US_ENGLISH: Self = Self { lexicons: &["lexicon-us-en.txt"], lang: "" };
    const GB_ENGLISH: Self = Self { lexicons: &["lexicon-gb-en.txt"], lang: "" };
    const CHINESE: Self = Self { lexicons: &["lexicon-us-en.txt", "lexicon-zh.txt"], lang: "" };

    const fn espeak(lang: &'static str) -> Self {
        Self { lexicons: &[], lang }
    }

    /// Front-end for a backend identifier, keyed by its two-letter prefix.
    fn for_id(id: &str) -> Self {
        match id.get(..2).unwrap_or_default() {
            "bf" | "bm" => Self::GB_ENGLISH,
            "zf" | "zm" => Self::CHINESE,
            "ef" | "em" => Self::espeak("es"),
            "ff" => Self::espeak("fr"),
            "hf" | "hm" => Self::espeak("hi"),
            "if" | "im" => Self::espeak("it"),
            "jf" | "jm" => Self::espeak("ja"),
            "pf" | "pm" => Self::espeak("pt-br"),
            _ => Self::US_ENGLISH,
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lang.is_empty() { write!(f, "lexicon {}", self.lexicons.join("+")) } else { write!(f, "espeak-ng {}", self.lang) }
    }
}

/// A selected speaker. Only constructible from a member of the voice table.
#[derive(Debug, Clone, Copy)]
pub struct Speaker {
    id: &'static str,
    voice: &'static Voice,
}

impl Speaker {
    /// Look up a speaker by backend identifier (`af_bella`).
    pub fn from_id(id: &str) -> Option<Self> {
        VOICES.binary_search_by_key(&id, |(n, _)| n).ok().map(Self::at)
    }

    /// Look up a speaker by backend identifier or, failing that, by display name
    /// (case-insensitive).
    pub fn lookup(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::from_id(key).or_else(|| {
            VOICES
                .iter()
                .position(|(_, v)| v.display_name.eq_ignore_ascii_case(key))
                .map(Self::at)
        })
    }

    fn at(idx: usize) -> Self {
        let (id, voice) = &VOICES[idx];
        Self { id: *id, voice }
    }

    /// Backend identifier sent to the worker.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Table metadata for this speaker.
    pub fn voice(&self) -> &'static Voice {
        self.voice
    }

    /// The text front-end this voice needs.
    pub fn frontend(&self) -> Frontend {
        Frontend::for_id(self.id)
    }
}

impl Default for Speaker {
    fn default() -> Self {
        // Index of DEFAULT_SPEAKER in VOICES.
        Self::at(2)
    }
}

impl PartialEq for Speaker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Speaker {}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.voice().display_name, self.id)
    }
}

/// Print all available speakers grouped by language.
pub fn print_speakers() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Kokoro TTS v1.0 - {} speakers", VOICES.len());
    println!("═══════════════════════════════════════════════════════════════════");

    let mut languages: Vec<&str> = Vec::new();
    for (_, voice) in VOICES {
        if !languages.contains(&voice.language) {
            languages.push(voice.language);
        }
    }

    for lang in &languages {
        println!("\n── {} ──", lang);
        println!("{:<15} {:<12} ID", "SPEAKER", "NAME");
        println!("{}", "─".repeat(40));

        let mut lang_voices: Vec<_> = VOICES.iter().filter(|(_, v)| v.language == *lang).collect();
        lang_voices.sort_by_key(|(_, v)| v.speaker_id);

        for (id, voice) in lang_voices {
            println!("{:<15} {:<12} {}", id, voice.display_name, voice.speaker_id);
        }
    }

    println!();
    println!("Default: {}", Speaker::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_for_binary_search() {
        assert!(VOICES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_default_speaker_is_a_member() {
        assert!(Speaker::from_id(DEFAULT_SPEAKER).is_some());
        assert_eq!(Speaker::default().id(), DEFAULT_SPEAKER);
        assert_eq!(Speaker::default().voice().speaker_id, 2);
    }

    #[test]
    fn test_lookup_by_id_or_display_name() {
        assert_eq!(Speaker::lookup("bf_emma").map(|s| s.id()), Some("bf_emma"));
        assert_eq!(Speaker::lookup("  emma ").map(|s| s.id()), Some("bf_emma"));
        assert!(Speaker::lookup("nobody").is_none());
        assert!(Speaker::from_id("Emma").is_none());
    }

    #[test]
    fn test_frontend_follows_language_group() {
        let frontend = |id: &str| Speaker::from_id(id).unwrap().frontend();

        assert_eq!(frontend("af_bella"), frontend("am_adam"));
        assert_eq!(frontend("bf_emma").lexicons, &["lexicon-gb-en.txt"]);
        assert_eq!(frontend("zf_xiaobei").lexicons, &["lexicon-us-en.txt", "lexicon-zh.txt"]);
        assert_eq!(frontend("ef_dora").lang, "es");
        assert!(frontend("ef_dora").lexicons.is_empty());
        assert_eq!(frontend("jf_alpha").lang, "ja");
        assert_ne!(frontend("af_bella"), frontend("ff_siwis"));
    }
}
