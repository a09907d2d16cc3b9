//! Per-unit trampoline requests.
//!
//! Call sites beyond the prebuilt argument counts need a generated helper.
//! Requests are collected while emitting; once the unit is complete the
//! registry is sealed and every distinct key gets exactly one body.

use indexmap::IndexSet;
use kiln_calls::TrampolineKey;
use rustc_hash::FxBuildHasher;

use crate::declaration::extract_declaration;
use crate::render::{Renderer, TrampolineBodyData};
use crate::RenderError;

/// Append-only set of requested trampolines.
#[derive(Clone, Debug, Default)]
pub struct TrampolineRegistry {
    keys: IndexSet<TrampolineKey, FxBuildHasher>,
    requests: usize,
}

impl TrampolineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a call site needs `key`.
    ///
    /// Returns whether this was the first request. Keys with a fixed
    /// runtime form are never generated and are not recorded.
    pub fn request(&mut self, key: TrampolineKey) -> bool {
        if key.has_fixed_form() {
            return false;
        }
        self.requests += 1;
        let added = self.keys.insert(key);
        if added {
            tracing::debug!(helper = %key, "trampoline requested");
        }
        added
    }

    pub fn contains(&self, key: TrampolineKey) -> bool {
        self.keys.contains(&key)
    }

    /// Total requests, counting repeats.
    pub fn request_count(&self) -> usize {
        self.requests
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Freeze the set for emission.
    pub fn seal(self) -> SealedTrampolines {
        SealedTrampolines {
            keys: self.keys.into_iter().collect(),
        }
    }
}

/// Source text of the generated trampolines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrampolineCode {
    pub declarations: Vec<String>,
    pub bodies: Vec<String>,
}

/// The final trampoline set of a unit, in first-request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SealedTrampolines {
    keys: Vec<TrampolineKey>,
}

impl SealedTrampolines {
    pub fn keys(&self) -> &[TrampolineKey] {
        &self.keys
    }

    /// One declaration and one body per key.
    pub fn emit(&self, renderer: &dyn Renderer) -> Result<TrampolineCode, RenderError> {
        let mut code = TrampolineCode::default();
        for &key in &self.keys {
            let body = renderer.render_trampoline(&TrampolineBodyData::new(key))?;
            code.declarations.push(extract_declaration(&body)?);
            code.bodies.push(body);
        }
        tracing::debug!(count = self.keys.len(), "emitted trampolines");
        Ok(code)
    }
}
