//! Runtime helper library generation.
//!
//! Every specialized identifier in the registry gets one body, operator
//! major, binary before in-place, comparisons last. The header holds the
//! forward declaration of each body in the same order.

use kiln_emit::{extract_declaration, OperationBodyData, RenderError, Renderer};
use kiln_ops::{HelperId, HelperRegistry};

/// Generated helper sources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HelperLibrary {
    pub header: String,
    pub source: String,
    /// Public helper names, in emission order.
    pub helpers: Vec<String>,
}

impl HelperLibrary {
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    fn push(&mut self, id: &HelperId, renderer: &dyn Renderer) -> Result<(), RenderError> {
        let body = renderer.render_operation(&OperationBodyData::new(*id))?;
        self.header.push_str(&extract_declaration(&body)?);
        self.header.push('\n');
        if !self.source.is_empty() {
            self.source.push('\n');
        }
        self.source.push_str(&body);
        self.helpers.push(id.to_string());
        Ok(())
    }
}

/// Render the bodies and declarations of every specialized helper.
pub fn generate_helper_library(
    registry: &HelperRegistry,
    renderer: &dyn Renderer,
) -> Result<HelperLibrary, RenderError> {
    let mut library = HelperLibrary::default();
    for (op, mode, sets) in registry.operation_tables() {
        for id in sets.specialized.iter() {
            library.push(id, renderer)?;
        }
        tracing::debug!(
            op = %op,
            mode = ?mode,
            count = sets.specialized.len(),
            "rendered operation helpers"
        );
    }
    for (cmp, sets) in registry.comparison_tables() {
        for id in sets.specialized.iter() {
            library.push(id, renderer)?;
        }
        tracing::debug!(
            cmp = %cmp,
            count = sets.specialized.len(),
            "rendered comparison helpers"
        );
    }
    tracing::debug!(total = library.len(), "helper library generated");
    Ok(library)
}

#[cfg(test)]
mod tests;
