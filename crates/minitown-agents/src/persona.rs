//! Persona file parsing.
//!
//! Persona files live at `<base>/<mbti>/1.txt` as a key-value section:
//!
//! ```text
//! Name: ISTJ
//! MBTI: ISTJ
//! Personality Notes: 負責任、嚴謹保守...
//! ```
//!
//! Keys are matched case-insensitively and only `name`, `mbti`, and
//! `personality` are consumed. A missing or unreadable file falls back to
//! the built-in MBTI description.

use std::path::Path;

use tracing::debug;

/// Parsed persona fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Persona {
    pub name: Option<String>,
    pub mbti: Option<String>,
    pub personality: Option<String>,
}

/// Parse the key-value persona format.
pub fn parse_persona(content: &str) -> Persona {
    let mut persona = Persona::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if key.contains("personality") {
            persona.personality = Some(value.to_owned());
        } else if key.contains("mbti") {
            persona.mbti = Some(value.to_owned());
        } else if key.contains("name") {
            persona.name = Some(value.to_owned());
        }
    }
    persona
}

/// Load `<base>/<mbti>/1.txt`, returning `None` when absent.
pub fn load_persona(base_dir: &Path, mbti: &str) -> Option<Persona> {
    let path = base_dir.join(mbti).join("1.txt");
    match std::fs::read_to_string(&path) {
        Ok(content) => Some(parse_persona(&content)),
        Err(err) => {
            debug!(path = %path.display(), %err, "no persona file, using built-in profile");
            None
        }
    }
}
