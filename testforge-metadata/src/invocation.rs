// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::InvocationParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A description of "construct creator `target` with arguments `args`".
///
/// A launcher cannot hand a live creator to a child process. Instead it passes an `Invocation`,
/// and the child looks `target` up in its own creator table and constructs it from `args`. The
/// child rejects the invocation if the target is unknown or the argument types don't match the
/// target's declared signature.
///
/// On the command line, an invocation is encoded as a single JSON argument; see
/// [`Invocation::to_arg`] and the [`FromStr`] implementation.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Invocation {
    /// The name of the creator to construct.
    pub target: String,

    /// Constructor arguments, in order.
    #[serde(default)]
    pub args: Vec<InvocationArg>,
}

impl Invocation {
    /// Creates a new invocation with no arguments.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument to this invocation.
    pub fn with_arg(mut self, arg: impl Into<InvocationArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Returns the argument types of this invocation, in order.
    pub fn signature(&self) -> Vec<ArgType> {
        self.args.iter().map(InvocationArg::arg_type).collect()
    }

    /// Encodes this invocation as a single command-line argument.
    pub fn to_arg(&self) -> String {
        serde_json::to_string(self).expect("serializing an invocation is infallible")
    }
}

impl FromStr for Invocation {
    type Err = InvocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(|error| InvocationParseError::new(s, error))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.target)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A single argument in an [`Invocation`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum InvocationArg {
    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// A string.
    Str(String),

    /// A list of strings.
    StrList(Vec<String>),
}

impl InvocationArg {
    /// Returns the type of this argument.
    pub fn arg_type(&self) -> ArgType {
        match self {
            Self::Bool(_) => ArgType::Bool,
            Self::Int(_) => ArgType::Int,
            Self::Str(_) => ArgType::Str,
            Self::StrList(_) => ArgType::StrList,
        }
    }
}

impl fmt::Display for InvocationArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::StrList(list) => write!(f, "{list:?}"),
        }
    }
}

impl From<bool> for InvocationArg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for InvocationArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for InvocationArg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for InvocationArg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<Vec<String>> for InvocationArg {
    fn from(value: Vec<String>) -> Self {
        Self::StrList(value)
    }
}

/// The type of an [`InvocationArg`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArgType {
    /// A boolean.
    Bool,

    /// A signed integer.
    Int,

    /// A string.
    Str,

    /// A list of strings.
    StrList,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Str => write!(f, "string"),
            Self::StrList => write!(f, "string list"),
        }
    }
}

#[cfg(feature = "proptest1")]
mod proptest_impls {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for InvocationArg {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                any::<bool>().prop_map(Self::Bool),
                any::<i64>().prop_map(Self::Int),
                any::<String>().prop_map(Self::Str),
                proptest::collection::vec(any::<String>(), 0..4).prop_map(Self::StrList),
            ]
            .boxed()
        }
    }
}
