//! Input and output patterns of a reaction.
//!
//! Patterns are built through the typed [`Pattern`] constructors and erased
//! into shape-plus-closure descriptors when a reaction is assembled; the
//! matcher and the analyzer only ever see the erased form. A host-language
//! macro layer is deliberately absent: pattern matching is expressed with
//! these combinators directly.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::molecule::Payload;

type AdmitFn = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// A typed input pattern for a molecule carrying values of type `T`.
pub struct Pattern<T: Payload> {
    erased: ErasedPattern,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Payload> Pattern<T> {
    /// A wildcard: admits any value.
    pub fn any() -> Self {
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Wildcard,
            admits: None,
        })
    }

    /// Binds the value to a variable; admits any value.
    ///
    /// The name is only used in display forms of the reaction.
    pub fn bind(name: &str) -> Self {
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Var {
                name: name.to_string(),
                guarded: false,
            },
            admits: None,
        })
    }

    /// Binds the value to a variable and constrains it with a predicate.
    pub fn bind_if(
        name: &str,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Var {
                name: name.to_string(),
                guarded: true,
            },
            admits: Some(Arc::new(move |value| {
                value.downcast_ref::<T>().is_some_and(&predicate)
            })),
        })
    }

    /// Admits exactly the values structurally equal to `value`.
    pub fn eq(value: T) -> Self
    where
        T: PartialEq + Sync,
    {
        let value = Arc::new(value);
        let admitted = value.clone();
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Const {
                display: const_display(&*value),
                value,
            },
            admits: Some(Arc::new(move |candidate| {
                candidate.downcast_ref::<T>() == Some(admitted.as_ref())
            })),
        })
    }

    /// Admits the values for which the partial matcher is defined.
    pub fn matching(matcher: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Other { irrefutable: false },
            admits: Some(Arc::new(move |value| {
                value.downcast_ref::<T>().is_some_and(&matcher)
            })),
        })
    }

    /// A destructuring pattern that is defined for every value of type `T`.
    pub fn matching_irrefutable() -> Self {
        Self::from_erased(ErasedPattern {
            shape: PatternShape::Other { irrefutable: true },
            admits: None,
        })
    }

    fn from_erased(erased: ErasedPattern) -> Self {
        Self {
            erased,
            _marker: PhantomData,
        }
    }

    pub(crate) fn into_erased(self) -> ErasedPattern {
        self.erased
    }
}

impl<T: Payload> Clone for Pattern<T> {
    fn clone(&self) -> Self {
        Self::from_erased(self.erased.clone())
    }
}

impl<T: Payload> fmt::Debug for Pattern<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("shape", &self.erased.display_form())
            .finish_non_exhaustive()
    }
}

/// Shape of an erased input pattern, as seen by the analyzer.
#[derive(Clone)]
pub(crate) enum PatternShape {
    Wildcard,
    Var {
        name: String,
        guarded: bool,
    },
    Const {
        display: String,
        value: Arc<dyn Any + Send + Sync>,
    },
    Other {
        irrefutable: bool,
    },
}

/// A type-erased input pattern.
#[derive(Clone)]
pub(crate) struct ErasedPattern {
    pub(crate) shape: PatternShape,
    /// Admission predicate; `None` admits everything.
    admits: Option<AdmitFn>,
}

impl ErasedPattern {
    pub(crate) fn admits(&self, value: &dyn Any) -> bool {
        match &self.admits {
            None => true,
            Some(admits) => admits(value),
        }
    }

    /// A trivial pattern admits every value of its type.
    pub(crate) fn is_trivial(&self) -> bool {
        matches!(
            self.shape,
            PatternShape::Wildcard
                | PatternShape::Var { guarded: false, .. }
                | PatternShape::Other { irrefutable: true }
        )
    }

    /// Rank used to order inputs most-constraining-first.
    pub(crate) fn specificity(&self) -> u8 {
        match self.shape {
            PatternShape::Const { .. } => 0,
            PatternShape::Other { irrefutable: false } => 1,
            PatternShape::Var { guarded: true, .. } => 2,
            _ => 3,
        }
    }

    /// The "weaker than" preorder over input patterns of one molecule.
    ///
    /// `self` is weaker than `other` when `self` admits every value that
    /// `other` admits. Incomparable pairs conservatively report `false`.
    pub(crate) fn weaker_or_equal(&self, other: &ErasedPattern) -> bool {
        if self.is_trivial() {
            return true;
        }
        match (&self.shape, &other.shape) {
            (PatternShape::Var { guarded: true, .. }, PatternShape::Const { value, .. }) => {
                self.admits(value.as_ref())
            }
            (PatternShape::Const { .. }, PatternShape::Const { value, .. }) => {
                self.admits(value.as_ref())
            }
            _ => false,
        }
    }

    /// Whether `self` admits the value promised by an output pattern.
    ///
    /// With `strict` unknown comparisons report `false` (used by the livelock
    /// error); without it they report `true` (used by the livelock warning).
    pub(crate) fn weaker_than_output(&self, output: &OutputShape, strict: bool) -> bool {
        if self.is_trivial() {
            return true;
        }
        match output {
            OutputShape::Const { value, .. } => match self.shape {
                PatternShape::Var { guarded: true, .. } | PatternShape::Const { .. } => {
                    self.admits(value.as_ref())
                }
                PatternShape::Other { .. } => !strict,
                _ => true,
            },
            OutputShape::Other => !strict,
        }
    }

    pub(crate) fn display_form(&self) -> String {
        match &self.shape {
            PatternShape::Wildcard => "_".to_string(),
            PatternShape::Var {
                name,
                guarded: false,
            } => name.clone(),
            PatternShape::Var { name, guarded: true } => format!("{} if ?", name),
            PatternShape::Const { display, .. } => display.clone(),
            PatternShape::Other { .. } => "?".to_string(),
        }
    }
}

impl fmt::Display for ErasedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_form())
    }
}

/// Shape of an output pattern; only consulted by the static analyzer.
#[derive(Clone)]
pub(crate) enum OutputShape {
    /// The emitted value is known statically.
    Const {
        display: String,
        value: Arc<dyn Any + Send + Sync>,
    },
    /// The emitted value is computed by the reaction body.
    Other,
}

impl OutputShape {
    pub(crate) fn constant<T: Payload + Sync>(value: T) -> Self {
        let value = Arc::new(value);
        OutputShape::Const {
            display: const_display(&*value),
            value,
        }
    }

    pub(crate) fn display_form(&self) -> &str {
        match self {
            OutputShape::Const { display, .. } => display,
            OutputShape::Other => "?",
        }
    }
}

/// Renders a value for molecule and pattern display. The unit value renders
/// empty so that a unit-carrying molecule shows as `a()`, and the quotes that
/// `Debug` puts around strings are dropped: `d(ok)`, not `d("ok")`.
pub(crate) fn const_display<T: fmt::Debug>(value: &T) -> String {
    let rendered = format!("{:?}", value);
    if rendered == "()" {
        return String::new();
    }
    if rendered.len() >= 2 && rendered.starts_with('"') && rendered.ends_with('"') {
        return rendered[1..rendered.len() - 1].to_string();
    }
    rendered
}
