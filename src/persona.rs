//! Assistant persona seeded into every dialogue
//!
//! The default persona is five system-role turns. An operator may replace
//! them with a plain-text file, one turn per non-empty line.

use std::path::Path;

/// Default system turns, in the order they are sent
const DEFAULT_PERSONA: &[&str] = &[
    "You can help to upload photos ask the user to give an username click upload button below and upload the photo and call CreateUsername function",
    "You are Alexia, a helpful AI assistant",
    "You can help to retrive photos, ask the user to give username",
    "you will ask on start for username",
    "you are restricted to create your own usernames",
];

pub fn default_persona() -> Vec<String> {
    DEFAULT_PERSONA.iter().map(|s| (*s).to_string()).collect()
}

/// Load persona turns from `path`, falling back to the defaults when no
/// path is configured. A file with no non-empty lines is rejected.
pub fn load(path: Option<&Path>) -> std::io::Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(default_persona());
    };

    let content = std::fs::read_to_string(path)?;
    let turns = parse(&content);
    if turns.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("persona file {} has no turns", path.display()),
        ));
    }
    tracing::info!(path = %path.display(), turns = turns.len(), "Loaded persona file");
    Ok(turns)
}

fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
