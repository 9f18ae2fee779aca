use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const MONTH_IN_SECONDS: u32 = 30 * 24 * 60 * 60;

/// Edge cache lifetime attached to every served image (6 months).
pub const CDN_CACHE_AGE: u32 = 6 * MONTH_IN_SECONDS;
pub const DEFAULT_QUALITY: u8 = 80;
pub const NOT_FOUND_BODY: &str = "Not found";
/// Largest output side accepted by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;
/// libwebp refuses larger sides.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

/// Image formats the proxy will serve, keyed by path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Format served to clients that advertise support for it.
    pub const NEXT_GEN: ImageFormat = ImageFormat::Webp;

    /// Maps a path extension to a format. Matching is case-sensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Whether the codec adapter can turn this format into pixels.
    pub fn is_decodable(self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Png)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Gif => write!(f, "gif"),
            ImageFormat::Webp => write!(f, "webp"),
        }
    }
}

/// Which store backs the edge cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Sled,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sled" => Ok(CacheBackend::Sled),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(ConfigError::InvalidValue("CACHE_BACKEND", other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    pub max_cache_size: Option<u64>,
    pub max_input_size: usize, // bytes
    /// Upper bound for either side of a resized image.
    pub max_dimension: u32,
    /// `s-maxage` value in seconds.
    pub cache_max_age: u32,
    /// Scheme reattached to the request path to build the origin URL.
    pub origin_scheme: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_backend: CacheBackend::Sled,
            cache_dir: PathBuf::from("./cache"),
            max_cache_size: Some(10 * 1024 * 1024 * 1024),
            max_input_size: 16 * 1024 * 1024,
            max_dimension: DEFAULT_MAX_DIMENSION,
            cache_max_age: CDN_CACHE_AGE,
            origin_scheme: "https".into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Max input size must be > 0")] InvalidMaxInput,
    #[error("Max dimension must be within 1..=16383, got {0}")] InvalidMaxDimension(u32),
    #[error("Origin scheme must be http or https, got {0}")] InvalidScheme(String),
    #[error("Invalid value for {0}: {1}")] InvalidValue(&'static str, String),
}

fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

impl ProxyConfig {
    /// Overlays environment variables onto the defaults.
    ///
    /// Recognised variables: `PORT`, `CACHE_BACKEND`, `CACHE_DIR`,
    /// `MAX_CACHE_SIZE`, `MAX_INPUT_SIZE`, `MAX_DIMENSION`, `CACHE_MAX_AGE`,
    /// `ORIGIN_SCHEME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(port) = env_parse("PORT")? { cfg.port = port; }
        if let Some(backend) = env_parse("CACHE_BACKEND")? { cfg.cache_backend = backend; }
        if let Ok(dir) = std::env::var("CACHE_DIR") { cfg.cache_dir = PathBuf::from(dir); }
        if let Some(size) = env_parse("MAX_CACHE_SIZE")? { cfg.max_cache_size = Some(size); }
        if let Some(size) = env_parse("MAX_INPUT_SIZE")? { cfg.max_input_size = size; }
        if let Some(dim) = env_parse("MAX_DIMENSION")? { cfg.max_dimension = dim; }
        if let Some(age) = env_parse("CACHE_MAX_AGE")? { cfg.cache_max_age = age; }
        if let Ok(scheme) = std::env::var("ORIGIN_SCHEME") { cfg.origin_scheme = scheme; }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_input_size == 0 { return Err(ConfigError::InvalidMaxInput); }
        if self.max_dimension == 0 || self.max_dimension > WEBP_MAX_DIMENSION {
            return Err(ConfigError::InvalidMaxDimension(self.max_dimension));
        }
        if self.origin_scheme != "https" && self.origin_scheme != "http" {
            return Err(ConfigError::InvalidScheme(self.origin_scheme.clone()));
        }
        Ok(())
    }
}
