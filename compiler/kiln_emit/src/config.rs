//! Emission settings.

use kiln_calls::CallConfig;
use kiln_ir::PythonVersion;

/// Settings for one compilation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitConfig {
    /// Language version the generated code targets.
    pub target_version: PythonVersion,
    /// First version evaluating dict display keys before values.
    pub dict_key_first_since: PythonVersion,
    /// Largest call argument count the runtime library ships helpers for.
    pub max_prebuilt_call_args: usize,
    /// Emit `assert` for failure checks that are statically impossible.
    pub debug_assertions: bool,
    /// Attributes never called through the method-call helpers.
    pub method_call_blacklist: Vec<String>,
}

impl Default for EmitConfig {
    fn default() -> Self {
        let calls = CallConfig::default();
        Self {
            target_version: PythonVersion::default(),
            dict_key_first_since: PythonVersion::new(3, 5),
            max_prebuilt_call_args: calls.max_prebuilt_call_args,
            debug_assertions: true,
            method_call_blacklist: calls.method_call_blacklist,
        }
    }
}

impl EmitConfig {
    #[must_use]
    pub fn with_target_version(mut self, version: PythonVersion) -> Self {
        self.target_version = version;
        self
    }

    #[must_use]
    pub fn with_dict_key_first_since(mut self, version: PythonVersion) -> Self {
        self.dict_key_first_since = version;
        self
    }

    #[must_use]
    pub fn with_max_prebuilt_call_args(mut self, count: usize) -> Self {
        self.max_prebuilt_call_args = count;
        self
    }

    #[must_use]
    pub fn with_debug_assertions(mut self, enabled: bool) -> Self {
        self.debug_assertions = enabled;
        self
    }

    #[must_use]
    pub fn with_method_call_blacklist(mut self, names: Vec<String>) -> Self {
        self.method_call_blacklist = names;
        self
    }

    /// Whether dict displays evaluate each value before its key.
    pub fn dict_values_first(&self) -> bool {
        self.target_version < self.dict_key_first_since
    }

    /// The classifier settings derived from this configuration.
    pub fn call_config(&self) -> CallConfig {
        CallConfig {
            max_prebuilt_call_args: self.max_prebuilt_call_args,
            method_call_blacklist: self.method_call_blacklist.clone(),
        }
    }
}
