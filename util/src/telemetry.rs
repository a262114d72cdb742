//! Helpers for configuring logging across the workspace

pub use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::err_str;

/// Errors that occur when setting up telemetry
#[derive(Debug, thiserror::Error)]
pub enum TelemetrySetupError {
    /// A global subscriber was already installed, or installation failed
    #[error("error initializing subscriber: {0}")]
    Init(String),
}

/// A builder for configuring the subscriber stack
pub struct TelemetryBuilder {
    /// The level used when `RUST_LOG` does not specify one
    default_level: LevelFilter,
    /// The subscriber layers to add to the telemetry stack
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync + 'static>>,
}

impl TelemetryBuilder {
    /// Create a builder which falls back to the given level
    pub fn new(default_level: LevelFilter) -> Self {
        Self { default_level, layers: Vec::new() }
    }

    /// Add a subscriber layer to the telemetry builder
    fn with_layer<L: Layer<Registry> + Send + Sync>(mut self, layer: L) -> Self {
        self.layers.push(layer.boxed());
        self
    }

    /// Configure the formatting layer, either json lines or pretty output
    pub fn with_logging(self, json: bool) -> Self {
        if json {
            self.with_layer(fmt::layer().json().with_thread_names(true))
        } else {
            self.with_layer(fmt::layer().pretty().with_thread_names(true))
        }
    }

    /// Initialize the global subscriber with the configured layers
    pub fn build(self) -> Result<(), TelemetrySetupError> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.default_level.into())
            .from_env_lossy();
        let layers = self.layers.with_filter(filter);

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(err_str!(TelemetrySetupError::Init))
    }
}

/// Configures logging for a process
///
/// `RUST_LOG` takes precedence over `default_level` when set
pub fn configure_logging(
    default_level: LevelFilter,
    json: bool,
) -> Result<(), TelemetrySetupError> {
    TelemetryBuilder::new(default_level).with_logging(json).build()
}

#[cfg(test)]
mod test {
    use super::{LevelFilter, TelemetrySetupError, configure_logging};

    /// Tests that a second initialization is reported rather than panicking
    #[test]
    fn test_double_init_errors() {
        // Another test in this binary may have installed the subscriber first
        let _ = configure_logging(LevelFilter::DEBUG, false /* json */);
        let res = configure_logging(LevelFilter::INFO, true /* json */);

        assert!(matches!(res, Err(TelemetrySetupError::Init(_))));
        tracing::info!("logging still functional after failed re-init");
    }
}
