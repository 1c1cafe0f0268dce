//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Directory layout of the project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Source tree
    #[serde(default = "SourcePaths::default")]
    pub src: SourcePaths,

    /// Development preview tree
    #[serde(default = "OutputPaths::dist")]
    pub dist: OutputPaths,

    /// Production release tree
    #[serde(default = "OutputPaths::build")]
    pub build: OutputPaths,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: SourcePaths::default(),
            dist: OutputPaths::dist(),
            build: OutputPaths::build(),
        }
    }
}

/// Source directories, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePaths {
    #[serde(default = "default_src_base")]
    pub base: String,

    #[serde(default = "default_src_css")]
    pub css: String,

    #[serde(default = "default_src_js")]
    pub js: String,

    #[serde(default = "default_src_img")]
    pub img: String,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            base: default_src_base(),
            css: default_src_css(),
            js: default_src_js(),
            img: default_src_img(),
        }
    }
}

fn default_src_base() -> String {
    "src".to_string()
}

fn default_src_css() -> String {
    "src/css".to_string()
}

fn default_src_js() -> String {
    "src/js".to_string()
}

fn default_src_img() -> String {
    "src/img".to_string()
}

/// One output tree, relative to the project root
///
/// Only `base` is required in the config file; missing subdirectories
/// default to `<base>/css`, `<base>/js` and `<base>/img`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOutputPaths")]
pub struct OutputPaths {
    pub base: String,

    pub css: String,

    pub js: String,

    pub img: String,
}

impl OutputPaths {
    /// Output tree rooted at `base` with the conventional subdirectories
    pub fn under(base: &str) -> Self {
        Self {
            base: base.to_string(),
            css: format!("{}/css", base),
            js: format!("{}/js", base),
            img: format!("{}/img", base),
        }
    }

    pub fn dist() -> Self {
        Self::under("dist")
    }

    pub fn build() -> Self {
        Self::under("build")
    }
}

#[derive(Deserialize)]
struct RawOutputPaths {
    base: String,
    css: Option<String>,
    js: Option<String>,
    img: Option<String>,
}

impl From<RawOutputPaths> for OutputPaths {
    fn from(raw: RawOutputPaths) -> Self {
        let defaults = OutputPaths::under(&raw.base);
        Self {
            css: raw.css.unwrap_or(defaults.css),
            js: raw.js.unwrap_or(defaults.js),
            img: raw.img.unwrap_or(defaults.img),
            base: raw.base,
        }
    }
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to run the preview server on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Open browser automatically
    #[serde(default)]
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            open: false,
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "localhost".to_string()
}

/// Stylesheet pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Main stylesheet, relative to `paths.src.css`
    #[serde(default = "default_main_style")]
    pub main: String,

    /// Name of the concatenated output stylesheet
    #[serde(default = "default_style_output")]
    pub output: String,

    /// Tailwind config file, relative to the project root
    #[serde(default)]
    pub tailwind_config: Option<String>,

    /// Command used to invoke the Tailwind CLI
    #[serde(default = "default_tailwind_command")]
    pub tailwind_command: Vec<String>,

    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browserslist")]
    pub browserslist: Vec<String>,

    /// Class, id or tag names never removed by the purge step
    #[serde(default)]
    pub safelist: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            main: default_main_style(),
            output: default_style_output(),
            tailwind_config: None,
            tailwind_command: default_tailwind_command(),
            browserslist: default_browserslist(),
            safelist: Vec::new(),
        }
    }
}

fn default_main_style() -> String {
    "main.scss".to_string()
}

fn default_style_output() -> String {
    "style.css".to_string()
}

fn default_tailwind_command() -> Vec<String> {
    vec!["npx".to_string(), "tailwindcss".to_string()]
}

fn default_browserslist() -> Vec<String> {
    vec!["defaults".to_string()]
}

/// Script bundling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Main entry, relative to `paths.src.js`
    #[serde(default = "default_main_script")]
    pub main: String,

    /// Name of the chunk that receives modules shared between entries
    #[serde(default = "default_shared_chunk")]
    pub shared_chunk: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            main: default_main_script(),
            shared_chunk: default_shared_chunk(),
        }
    }
}

fn default_main_script() -> String {
    "main.js".to_string()
}

fn default_shared_chunk() -> String {
    "main".to_string()
}

/// Image optimization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// JPEG re-encoding quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Cache directory for optimized images, relative to the project root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_cache_dir() -> String {
    ".sluice-cache".to_string()
}
