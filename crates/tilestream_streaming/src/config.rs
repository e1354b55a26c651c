//! # Streaming Configuration
//!
//! Fixed at construction, never reloaded. Loaded once at startup from a
//! TOML file with two optional tables:
//!
//! ```toml
//! [streaming]
//! chunk_size = 64
//! render_distance = 3
//! worker_threads = 4
//! cell_order = "row_major"
//! # regenerate_after_quanta = 120
//!
//! [generator]
//! seed = 12345
//! frequency = 0.01
//! low_threshold = 0.3
//! high_threshold = 0.6
//! ```
//!
//! Missing keys fall back to `Default`.

use std::path::Path;

use serde::Deserialize;
use tilestream_procedural::{BandedGeneratorConfig, CellOrder};

use crate::error::{StreamingError, StreamingResult};

/// Configuration for the chunk lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Side length of a chunk, in world cells. Must be positive.
    pub chunk_size: u32,
    /// Chebyshev radius of the resident window, in chunks.
    pub render_distance: u32,
    /// Number of generation worker threads. Must be positive.
    pub worker_threads: usize,
    /// Order of cells inside a generated chunk.
    pub cell_order: CellOrder,
    /// Re-dispatch generation for a chunk that has waited this many apply
    /// quanta with no content and no live generation task.
    /// `None` leaves such chunks queued forever.
    pub regenerate_after_quanta: Option<u32>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            render_distance: 3,
            worker_threads: 4,
            cell_order: CellOrder::RowMajor,
            regenerate_after_quanta: None,
        }
    }
}

impl StreamingConfig {
    /// Small chunks, tight window, one worker. For tests.
    #[must_use]
    pub fn test() -> Self {
        Self {
            chunk_size: 4,
            render_distance: 1,
            worker_threads: 1,
            ..Self::default()
        }
    }

    /// Production config: wider window, a worker per available core,
    /// and stuck chunks retried after two seconds at 60 quanta per second.
    #[must_use]
    pub fn production() -> Self {
        let cores = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            chunk_size: 64,
            render_distance: 4,
            worker_threads: cores.saturating_sub(1).max(1),
            cell_order: CellOrder::RowMajor,
            regenerate_after_quanta: Some(120),
        }
    }

    /// Number of chunks in a full resident window.
    #[must_use]
    pub const fn window_chunk_count(&self) -> usize {
        let side = 2 * self.render_distance as usize + 1;
        side * side
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad value.
    pub fn validate(&self) -> StreamingResult<()> {
        if self.chunk_size == 0 {
            return Err(StreamingError::InvalidConfig("chunk_size must be positive".into()));
        }
        if i32::try_from(self.chunk_size).is_err() {
            return Err(StreamingError::InvalidConfig(format!(
                "chunk_size {} does not fit world coordinates",
                self.chunk_size
            )));
        }
        if self.worker_threads == 0 {
            return Err(StreamingError::InvalidConfig("worker_threads must be positive".into()));
        }
        if self.regenerate_after_quanta == Some(0) {
            return Err(StreamingError::InvalidConfig(
                "regenerate_after_quanta must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

/// Everything read from one config file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Lifecycle settings.
    pub streaming: StreamingConfig,
    /// Default generator settings.
    pub generator: BandedGeneratorConfig,
}

impl ConfigFile {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` for malformed TOML and `InvalidConfig` for
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> StreamingResult<Self> {
        let file: Self = toml::from_str(text)?;
        file.validate()?;
        Ok(file)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigRead` if the file cannot be read, otherwise as
    /// `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> StreamingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| StreamingError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validates both tables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad value.
    pub fn validate(&self) -> StreamingResult<()> {
        self.streaming.validate()?;
        self.generator
            .validate()
            .map_err(|reason| StreamingError::InvalidConfig(reason.to_string()))
    }
}
