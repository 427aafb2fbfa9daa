use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tally_classify::ClassifyMode;

use crate::state::{ensure_tally_home, tally_home};

/// Project-local config, preferred over the one in ~/.tally
pub const LOCAL_CONFIG: &str = "tally.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestSection,
    pub classify: ClassifySection,
    pub llm: LlmSection,
    pub view: ViewSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// Directory scanned for .ofx files
    pub source_dir: PathBuf,
    /// Classified CSV written by ingest and read by the viewer
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySection {
    pub mode: ClassifyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// "groq", "openai" (any OpenAI-compatible endpoint) or "anthropic"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSection {
    pub currency_symbol: String,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("extratos"),
            output: PathBuf::from("extrato_classificado.csv"),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            temperature: 0.0,
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            currency_symbol: "R$".to_string(),
        }
    }
}

pub fn global_config_path() -> Result<PathBuf> {
    Ok(tally_home()?.join("config.toml"))
}

/// `./tally.toml` when present, else `~/.tally/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(local);
    }
    global_config_path()
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    load_config_from(&p)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config(local: bool) -> Result<()> {
    let p = if local {
        PathBuf::from(LOCAL_CONFIG)
    } else {
        ensure_tally_home()?;
        global_config_path()?
    };
    if p.exists() {
        println!("Configuração já existe: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Configuração gravada em {}", p.display());
    Ok(())
}
