use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide request counters.
pub struct Metrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub transforms: AtomicU64,
    pub errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            transforms: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Renders the counters in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let counters = [
            ("pixelproxy_cache_hits_total", "Total number of cache hits", &self.cache_hits),
            ("pixelproxy_cache_misses_total", "Total number of cache misses", &self.cache_misses),
            ("pixelproxy_transforms_total", "Total number of image transformations", &self.transforms),
            ("pixelproxy_errors_total", "Total number of failed requests", &self.errors),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                value.load(Ordering::Relaxed)
            ));
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    pub static ref METRICS: Metrics = Metrics::new();
}
