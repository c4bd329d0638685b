use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "survey.toml";
const ENV_PREFIX: &str = "SURVEY";

pub const DEFAULT_WIKI_BASE_URL: &str = "https://en.wikipedia.org/wiki";
pub const DEFAULT_USER_AGENT: &str = "AsteroidDataCollector/1.0 (contact: survey@example.com)";
pub const DEFAULT_METEORS_DIR: &str = "public/meteors";

const DEFAULT_SUBJECTS: &[&str] = &[
    "243 Ida",
    "25143 Itokawa",
    "11351 Leucus",
    "21 Lutetia",
    "Menoetius",
    "21900 Orus",
    "617 Patroclus",
    "15094 Polymele",
    "162173 Ryugu",
    "73P/Schwassmann–Wachmann",
    "9P/Tempel 1",
    "4 Vesta",
    "81P/Wild",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Article titles to look up, in output order.
    pub subjects: Vec<String>,
    pub wiki_base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Max in-flight page fetches. 1 fetches strictly one after another.
    pub concurrency: usize,
    pub meteors_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            wiki_base_url: DEFAULT_WIKI_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            concurrency: 4,
            meteors_dir: PathBuf::from(DEFAULT_METEORS_DIR),
        }
    }
}

/// Load settings from an optional TOML file, then `SURVEY_*` env vars.
///
/// An explicit `path` must exist; the default `survey.toml` is optional.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings: Settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("subjects"),
        )
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    if settings.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }
    Ok(settings)
}

// ── Tests ──
