//! Static argument checking against a known signature.
//!
//! When the callee of a call site is known at compile time, mismatches
//! between the arguments and the parameter list are found here. The
//! resulting [`ArityError`] displays exactly the `TypeError` message the
//! runtime would raise, so the call can be replaced by an unconditional
//! raise.
//!
//! Checks run in the runtime's order: keyword arguments first (unexpected
//! names, then duplicates of positional arguments), then the positional
//! count, then missing positional and keyword-only parameters.

use std::fmt;

use thiserror::Error;

/// Parameter list of a statically known callee.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Qualified name used in messages, without the trailing `()`.
    pub name: String,
    /// Positional-or-keyword parameter names.
    pub positional: Vec<String>,
    /// How many trailing positional parameters have defaults.
    pub defaults: usize,
    /// Keyword-only parameters, with whether each has a default.
    pub keyword_only: Vec<(String, bool)>,
    /// Accepts `*args`.
    pub star_args: bool,
    /// Accepts `**kwargs`.
    pub star_kwargs: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn positional(mut self, names: &[&str]) -> Self {
        self.positional
            .extend(names.iter().map(|&name| name.to_owned()));
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, count: usize) -> Self {
        self.defaults = count.min(self.positional.len());
        self
    }

    #[must_use]
    pub fn keyword_only(mut self, name: &str, has_default: bool) -> Self {
        self.keyword_only.push((name.to_owned(), has_default));
        self
    }

    #[must_use]
    pub fn with_star_args(mut self) -> Self {
        self.star_args = true;
        self
    }

    #[must_use]
    pub fn with_star_kwargs(mut self) -> Self {
        self.star_kwargs = true;
        self
    }

    fn required_positional(&self) -> usize {
        self.positional.len() - self.defaults
    }

    fn positional_index(&self, name: &str) -> Option<usize> {
        self.positional.iter().position(|p| p == name)
    }

    fn is_keyword_only(&self, name: &str) -> bool {
        self.keyword_only.iter().any(|(p, _)| p == name)
    }
}

/// Which kind of parameter is missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MissingKind {
    Positional,
    KeywordOnly,
}

impl fmt::Display for MissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingKind::Positional => "positional",
            MissingKind::KeywordOnly => "keyword-only",
        })
    }
}

/// A statically detected argument mismatch.
///
/// The display text is the runtime's `TypeError` message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArityError {
    #[error(
        "{function}() takes {takes} positional argument{} but {given}{} {} given",
        plural_if(.takes_plural),
        keyword_only_suffix(.given, .keyword_only_given),
        was_were(.given, .keyword_only_given)
    )]
    TooManyPositional {
        function: String,
        /// `"2"` or `"from 1 to 2"`.
        takes: String,
        takes_plural: bool,
        given: usize,
        keyword_only_given: usize,
    },

    #[error(
        "{function}() missing {} required {kind} argument{}: {}",
        .names.len(),
        plural(.names.len() != 1),
        join_names(.names)
    )]
    Missing {
        function: String,
        kind: MissingKind,
        names: Vec<String>,
    },

    #[error("{function}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { function: String, keyword: String },

    #[error("{function}() got multiple values for argument '{keyword}'")]
    MultipleValues { function: String, keyword: String },
}

impl ArityError {
    /// Exception class raised at run time.
    pub fn exception(&self) -> &'static str {
        "TypeError"
    }
}

fn plural(plural: bool) -> &'static str {
    if plural {
        "s"
    } else {
        ""
    }
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "called from the derived Display with borrowed fields"
)]
fn plural_if(plural_flag: &bool) -> &'static str {
    plural(*plural_flag)
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "called from the derived Display with borrowed fields"
)]
fn keyword_only_suffix(given: &usize, keyword_only: &usize) -> String {
    let (given, keyword_only) = (*given, *keyword_only);
    if keyword_only == 0 {
        String::new()
    } else {
        format!(
            " positional argument{} (and {keyword_only} keyword-only argument{})",
            plural(given != 1),
            plural(keyword_only != 1)
        )
    }
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "called from the derived Display with borrowed fields"
)]
fn was_were(given: &usize, keyword_only: &usize) -> &'static str {
    if *given == 1 && *keyword_only == 0 {
        "was"
    } else {
        "were"
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
fn join_names(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

/// Check `positional` positional arguments and the given keyword names
/// against `spec`.
pub fn check_arguments(
    spec: &ParameterSpec,
    positional: usize,
    keywords: &[&str],
) -> Result<(), ArityError> {
    let function = || spec.name.clone();
    let mut keyword_only_given = 0;
    let mut positional_by_keyword = Vec::new();

    for &keyword in keywords {
        if let Some(index) = spec.positional_index(keyword) {
            if index < positional {
                return Err(ArityError::MultipleValues {
                    function: function(),
                    keyword: keyword.to_owned(),
                });
            }
            positional_by_keyword.push(index);
        } else if spec.is_keyword_only(keyword) {
            keyword_only_given += 1;
        } else if !spec.star_kwargs {
            return Err(ArityError::UnexpectedKeyword {
                function: function(),
                keyword: keyword.to_owned(),
            });
        }
    }

    let max = spec.positional.len();
    if positional > max && !spec.star_args {
        let (takes, takes_plural) = if spec.defaults > 0 {
            (format!("from {} to {max}", spec.required_positional()), true)
        } else {
            (max.to_string(), max != 1)
        };
        return Err(ArityError::TooManyPositional {
            function: function(),
            takes,
            takes_plural,
            given: positional,
            keyword_only_given,
        });
    }

    let missing: Vec<String> = (positional..spec.required_positional())
        .filter(|index| !positional_by_keyword.contains(index))
        .map(|index| spec.positional[index].clone())
        .collect();
    if !missing.is_empty() {
        return Err(ArityError::Missing {
            function: function(),
            kind: MissingKind::Positional,
            names: missing,
        });
    }

    let missing: Vec<String> = spec
        .keyword_only
        .iter()
        .filter(|(name, has_default)| !has_default && !keywords.contains(&name.as_str()))
        .map(|(name, _)| name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ArityError::Missing {
            function: function(),
            kind: MissingKind::KeywordOnly,
            names: missing,
        });
    }

    Ok(())
}
