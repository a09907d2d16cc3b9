//! Kiln compiler driver.
//!
//! Ties the specialization core together for whole compilation units:
//! functions are emitted against a shared constant pool and trampoline
//! registry, and the runtime helper library is generated from the
//! registry's specialized sets.
//!
//! # Usage
//!
//! ```ignore
//! use kilnc::{CompilationUnit, TextRenderer};
//!
//! let mut unit = CompilationUnit::new("demo", EmitConfig::default());
//! unit.emit_function("main", &arena, &body, &[])?;
//! let output = unit.finish(&TextRenderer)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! kiln_ir  →  kiln_ops  →  kiln_calls
//!                \             /
//!                  kiln_emit
//!                      ↓
//!                    kilnc  ← this crate
//! ```

use std::sync::Once;

mod error;
pub mod helpers;
mod unit;

pub use error::UnitError;
pub use helpers::{generate_helper_library, HelperLibrary};
pub use unit::{CompilationUnit, EmittedFunction, UnitOutput};

pub use kiln_emit::{EmitConfig, Renderer, Stmt, TextRenderer};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=kiln_ops=debug`,
/// `RUST_LOG=kiln_emit=trace` and so on.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
