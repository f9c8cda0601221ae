//! Process-wide shared pipeline
//!
//! At most one pipeline is registered at a time. The registry holds only a
//! weak reference: the pipeline lives for as long as some caller keeps the
//! returned `Arc`, and the next [`acquire`] after the last one is dropped
//! creates a fresh instance.
//!
//! ```
//! use rust_log_pipeline::global;
//!
//! let first = global::acquire();
//! let second = global::acquire();
//! assert!(std::sync::Arc::ptr_eq(&first, &second));
//! ```

use super::config::PipelineConfig;
use super::error::Result;
use super::pipeline::Pipeline;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

static INSTANCE: Mutex<Option<Weak<Pipeline>>> = parking_lot::const_mutex(None);

fn live(slot: &Option<Weak<Pipeline>>) -> Option<Arc<Pipeline>> {
    slot.as_ref().and_then(Weak::upgrade)
}

/// The registered pipeline, creating one with default settings if none is
/// alive.
pub fn acquire() -> Arc<Pipeline> {
    let mut slot = INSTANCE.lock();
    if let Some(pipeline) = live(&slot) {
        return pipeline;
    }
    let pipeline = Arc::new(Pipeline::new());
    *slot = Some(Arc::downgrade(&pipeline));
    pipeline
}

/// Create and register a pipeline from `config`.
///
/// # Errors
///
/// Returns error if the pipeline cannot be built; nothing is registered then
///
/// # Panics
///
/// Panics if a registered pipeline is still alive
pub fn install(config: PipelineConfig) -> Result<Arc<Pipeline>> {
    let mut slot = INSTANCE.lock();
    assert!(
        live(&slot).is_none(),
        "a shared pipeline is already installed; drop every handle to it first"
    );
    let pipeline = Arc::new(Pipeline::with_config(config)?);
    *slot = Some(Arc::downgrade(&pipeline));
    Ok(pipeline)
}

/// The registered pipeline if one is alive. Never creates one.
pub fn instance() -> Option<Arc<Pipeline>> {
    live(&INSTANCE.lock())
}
