//! Call shapes and the tier precedence.
//!
//! A call site's argument structure reduces to a handful of booleans
//! ([`CallFlags`]). Each [`CallShape`] is a predicate over those flags and
//! the first matching tier wins; [`CallShape::Generic`] matches
//! everything, so classification is total.

use std::fmt;

/// Structural facts about one call site's arguments.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CallFlags {
    /// Positional arguments are present and not known to be empty.
    pub has_positional: bool,
    /// Positional arguments are a compile-time constant tuple.
    pub positional_constant: bool,
    /// That constant contains something mutable.
    pub positional_mutable: bool,
    /// Positional arguments are a tuple/list display.
    pub positional_display: bool,
    /// Keyword arguments are present and not known to be empty.
    pub has_keywords: bool,
    /// Keyword arguments are a constant mapping with string keys.
    pub keywords_constant: bool,
    /// Keyword names are constant strings but the values are produced per
    /// call: a dict display, or a constant mapping with mutable values.
    pub keywords_display: bool,
}

impl CallFlags {
    fn positional_structured(self) -> bool {
        self.positional_constant || self.positional_display
    }

    fn keywords_structured(self) -> bool {
        self.keywords_constant || self.keywords_display
    }
}

/// Calling convention tiers, in precedence order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CallShape {
    /// No arguments at all.
    NoArgs = 1,
    /// Immutable constant tuple used directly as the argument vector.
    ConstantPositional = 2,
    /// Mutable constant tuple; elements copied for every call.
    MaterializedPositional = 3,
    /// Tuple/list display; each element evaluated into its own temporary.
    PositionalArray = 4,
    /// Positional arguments of unknown length.
    DynamicPositional = 5,
    /// Constant string-keyed mapping, passed as names plus values.
    KeywordSplitConstant = 6,
    /// Constant string keys with values evaluated or copied per call.
    KeywordSplit = 7,
    /// Structured positional arguments plus split keywords.
    Mixed = 8,
    /// Opaque positional tuple and/or keyword dict.
    Generic = 9,
}

impl CallShape {
    pub const ALL: [CallShape; 9] = [
        CallShape::NoArgs,
        CallShape::ConstantPositional,
        CallShape::MaterializedPositional,
        CallShape::PositionalArray,
        CallShape::DynamicPositional,
        CallShape::KeywordSplitConstant,
        CallShape::KeywordSplit,
        CallShape::Mixed,
        CallShape::Generic,
    ];

    #[inline]
    pub fn tier(self) -> u8 {
        self as u8
    }

    /// Whether this tier's predicate holds for `flags`.
    pub fn matches(self, flags: CallFlags) -> bool {
        let CallFlags {
            has_positional,
            positional_constant,
            positional_mutable,
            positional_display,
            has_keywords,
            keywords_constant,
            keywords_display,
        } = flags;
        match self {
            CallShape::NoArgs => !has_keywords && !has_positional,
            CallShape::ConstantPositional => {
                !has_keywords && has_positional && positional_constant && !positional_mutable
            }
            CallShape::MaterializedPositional => {
                !has_keywords && has_positional && positional_constant && positional_mutable
            }
            CallShape::PositionalArray => !has_keywords && has_positional && positional_display,
            CallShape::DynamicPositional => !has_keywords && has_positional,
            CallShape::KeywordSplitConstant => has_keywords && !has_positional && keywords_constant,
            CallShape::KeywordSplit => has_keywords && !has_positional && keywords_display,
            CallShape::Mixed => {
                has_keywords
                    && has_positional
                    && flags.positional_structured()
                    && flags.keywords_structured()
            }
            CallShape::Generic => true,
        }
    }

    /// The first matching tier.
    pub fn classify(flags: CallFlags) -> CallShape {
        CallShape::ALL
            .into_iter()
            .find(|shape| shape.matches(flags))
            .unwrap_or(CallShape::Generic)
    }

    /// Whether the callee can be a method call (receiver plus attribute
    /// name passed instead of a bound method).
    pub fn supports_method_call(self) -> bool {
        matches!(
            self,
            CallShape::NoArgs
                | CallShape::ConstantPositional
                | CallShape::MaterializedPositional
                | CallShape::PositionalArray
        )
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallShape::NoArgs => "no-args",
            CallShape::ConstantPositional => "constant-positional",
            CallShape::MaterializedPositional => "materialized-positional",
            CallShape::PositionalArray => "positional-array",
            CallShape::DynamicPositional => "dynamic-positional",
            CallShape::KeywordSplitConstant => "keyword-split-constant",
            CallShape::KeywordSplit => "keyword-split",
            CallShape::Mixed => "mixed",
            CallShape::Generic => "generic",
        };
        write!(f, "{name} (tier {})", self.tier())
    }
}
