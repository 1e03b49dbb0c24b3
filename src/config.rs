use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{bail, Context, Result};

pub const EDUCATION_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/for_user_education.json";
pub const COUNTIES_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/counties.json";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourceConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub education_url: String,
    pub counties_url: String,
    /// Name of the object collection inside the topology that holds county shapes.
    pub counties_object: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<String>, // Hex codes, lowest value first
    pub unmatched_color: String,
    pub title: String,
    pub description: String,
    pub legend: LegendConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LegendConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub tick_decimals: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub html: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            education_url: EDUCATION_URL.to_string(),
            counties_url: COUNTIES_URL.to_string(),
            counties_object: "counties".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            // d3.schemeBlues[5]
            palette: ["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            unmatched_color: "#ccc".to_string(),
            title: "US Education Choropleth Map".to_string(),
            description: "Percentage of adults age 25 and older with a bachelor's degree or higher (2010-2014)".to_string(),
            legend: LegendConfig::default(),
        }
    }
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            x: 600.0,
            y: 20.0,
            width: 300.0,
            height: 20.0,
            tick_decimals: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            html: PathBuf::from("output/index.html"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            bail!("Render surface must be non-empty, got {}x{}", render.width, render.height);
        }
        if render.palette.is_empty() {
            bail!("Palette must contain at least one color");
        }
        for color in render.palette.iter().chain(std::iter::once(&render.unmatched_color)) {
            if parse_hex(color).is_none() {
                bail!("Invalid hex color: {}", color);
            }
        }
        let neutral = parse_hex(&render.unmatched_color);
        if render.palette.iter().any(|c| parse_hex(c) == neutral) {
            bail!(
                "unmatched_color {} must differ from every palette color",
                render.unmatched_color
            );
        }
        if render.legend.width <= 0.0 || render.legend.height <= 0.0 {
            bail!("Legend dimensions must be positive");
        }
        Ok(())
    }
}

/// Parses `#rgb` or `#rrggbb` into its RGB components.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}
