//! Reaction descriptors and the builder used to declare chemistry.
//!
//! A reaction atomically consumes one multiset of input molecules and runs a
//! body that may emit further molecules and reply to blocking inputs. The
//! runtime consumes reactions in pre-analyzed form: input patterns, declared
//! outputs, guards and a structural fingerprint, plus the precomputed search
//! metadata used by the [matcher](crate::site).
//!
//! # Declaring a reaction
//!
//! ```
//! use chemix::molecule::Molecule;
//! use chemix::pattern::Pattern;
//! use chemix::reaction::Reaction;
//!
//! let a = Molecule::<i32>::new("a");
//! let b = Molecule::<i32>::new("b");
//!
//! let b_out = b.clone();
//! let forward = Reaction::builder()
//!     .consume(&a, Pattern::bind("x"))
//!     .emits(&b)
//!     .run(move |inputs| {
//!         let x: i32 = inputs.take(0);
//!         b_out.emit(x + 1)?;
//!         Ok(())
//!     });
//! assert_eq!(forward.to_string(), "{a(x) => b(?)}");
//! ```

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::executor::ThreadPool;
use crate::molecule::{
    BlockingMolecule, Instance, Molecule, MoleculeCore, Payload, ReplyHandleErased,
};
use crate::pattern::{ErasedPattern, OutputShape, Pattern};
use crate::reply::{ReplyCore, ReplyToken};

/// Outcome of a reaction body.
pub type BodyResult = Result<(), Box<dyn Error + Send + Sync>>;

type Body = Box<dyn Fn(&mut ReactionInputs) -> BodyResult + Send + Sync>;

/// One input of a reaction: the consumed molecule and its pattern.
pub(crate) struct InputMoleculeInfo {
    pub(crate) mol: Arc<MoleculeCore>,
    pub(crate) pattern: ErasedPattern,
}

impl InputMoleculeInfo {
    fn display(&self) -> String {
        format!("{}({})", self.mol.display_name(), self.pattern.display_form())
    }
}

/// One declared output of a reaction, in emission order.
pub(crate) struct OutputMoleculeInfo {
    pub(crate) mol: Arc<MoleculeCore>,
    pub(crate) shape: OutputShape,
    /// Whether the body emits this output unconditionally.
    pub(crate) guaranteed: bool,
}

impl OutputMoleculeInfo {
    fn display(&self) -> String {
        format!("{}({})", self.mol.display_name(), self.shape.display_form())
    }
}

/// A predicate over the values chosen for two or more input positions.
pub(crate) struct CrossGuard {
    pub(crate) indices: Vec<usize>,
    pub(crate) condition: Box<dyn Fn(&[&dyn Any]) -> bool + Send + Sync>,
}

/// Guard classification of a reaction.
pub(crate) enum Guard {
    /// No guard of any kind; every input pattern is trivial.
    AllTrivial,
    /// No reaction-level guard, but some input pattern is nontrivial.
    Absent,
    /// A reaction-level guard is present.
    Present {
        static_guard: Option<Box<dyn Fn() -> bool + Send + Sync>>,
        cross_guards: Vec<CrossGuard>,
    },
}

/// Static description of a reaction, as consumed by the runtime.
pub(crate) struct ReactionInfo {
    pub(crate) inputs: Vec<InputMoleculeInfo>,
    pub(crate) outputs: Vec<OutputMoleculeInfo>,
    pub(crate) guard: Guard,
    /// Hex digest of the canonical display form; identical chemistry yields
    /// identical fingerprints.
    pub(crate) fingerprint: String,
    /// Input positions ordered most-constraining-first.
    pub(crate) inputs_sorted: Vec<usize>,
    /// Positions that participate in cross guards or in a repeated-emitter
    /// group with a nontrivial pattern; such positions disable the greedy
    /// matching path.
    pub(crate) cross_conditional: Vec<bool>,
}

impl ReactionInfo {
    /// A reaction without inputs is a seed (static) reaction: it runs once at
    /// site construction and its guaranteed outputs are static molecules.
    pub(crate) fn is_seed(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Whether the reaction has no reaction-level guard.
    pub(crate) fn is_guardless(&self) -> bool {
        !matches!(self.guard, Guard::Present { .. })
    }

    pub(crate) fn guaranteed_outputs(&self) -> impl Iterator<Item = &OutputMoleculeInfo> {
        self.outputs.iter().filter(|output| output.guaranteed)
    }

    pub(crate) fn cross_guards(&self) -> &[CrossGuard] {
        match &self.guard {
            Guard::Present { cross_guards, .. } => cross_guards,
            _ => &[],
        }
    }

    /// Evaluates the reaction-level static guard, if any.
    pub(crate) fn static_guard_passes(&self) -> bool {
        match &self.guard {
            Guard::Present {
                static_guard: Some(guard),
                ..
            } => guard(),
            _ => true,
        }
    }

    pub(crate) fn needs_search(&self) -> bool {
        !self.cross_guards().is_empty() || self.cross_conditional.iter().any(|&c| c)
    }

    /// The inputs part of the site header, e.g. `a + c`.
    pub(crate) fn header_inputs(&self) -> String {
        if self.inputs.is_empty() {
            return "_".to_string();
        }
        self.inputs
            .iter()
            .map(|input| input.mol.display_name())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl fmt::Display for ReactionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = if self.inputs.is_empty() {
            "_".to_string()
        } else {
            self.inputs
                .iter()
                .map(InputMoleculeInfo::display)
                .collect::<Vec<_>>()
                .join(" + ")
        };
        let outputs = self
            .outputs
            .iter()
            .map(OutputMoleculeInfo::display)
            .collect::<Vec<_>>()
            .join(" + ");
        write!(f, "{{{} => {}}}", inputs, outputs)
    }
}

/// A reaction: static descriptor plus the body and its execution options.
pub struct Reaction {
    pub(crate) info: ReactionInfo,
    pub(crate) body: Body,
    /// Pool running this reaction's body; defaults to the site dispatch pool.
    pub(crate) pool: Option<ThreadPool>,
    /// Whether a failed body re-emits its inputs instead of discarding them.
    pub(crate) retry: bool,
}

impl Reaction {
    /// Starts declaring a reaction.
    pub fn builder() -> ReactionBuilder {
        ReactionBuilder {
            inputs: Vec::new(),
            outputs: Vec::new(),
            static_guard: None,
            cross_guards: Vec::new(),
            pool: None,
            retry: false,
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("info", &self.info.to_string())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builder assembling a [`Reaction`].
///
/// Inputs are indexed in declaration order; that index is what
/// [`ReactionInputs::take`] and cross guards refer to. Declared outputs have
/// no effect on matching and exist for the static analyzer; the declaration
/// order is the order in which the body emits them.
pub struct ReactionBuilder {
    inputs: Vec<InputMoleculeInfo>,
    outputs: Vec<OutputMoleculeInfo>,
    static_guard: Option<Box<dyn Fn() -> bool + Send + Sync>>,
    cross_guards: Vec<CrossGuard>,
    pool: Option<ThreadPool>,
    retry: bool,
}

impl ReactionBuilder {
    /// Declares a non-blocking input.
    pub fn consume<T: Payload>(mut self, molecule: &Molecule<T>, pattern: Pattern<T>) -> Self {
        self.inputs.push(InputMoleculeInfo {
            mol: molecule.core().clone(),
            pattern: pattern.into_erased(),
        });
        self
    }

    /// Declares a blocking input.
    ///
    /// The body receives the request value together with the
    /// [`ReplyToken`](crate::reply::ReplyToken) through
    /// [`ReactionInputs::take_blocking`].
    pub fn consume_blocking<T: Payload, R: Send + 'static>(
        mut self,
        molecule: &BlockingMolecule<T, R>,
        pattern: Pattern<T>,
    ) -> Self {
        self.inputs.push(InputMoleculeInfo {
            mol: molecule.core().clone(),
            pattern: pattern.into_erased(),
        });
        self
    }

    /// Declares an unconditionally emitted output with a computed value.
    pub fn emits<T: Payload>(self, molecule: &Molecule<T>) -> Self {
        self.output(molecule.core().clone(), OutputShape::Other, true)
    }

    /// Declares an unconditionally emitted output with a known value.
    pub fn emits_value<T: Payload + PartialEq + Sync>(
        self,
        molecule: &Molecule<T>,
        value: T,
    ) -> Self {
        self.output(molecule.core().clone(), OutputShape::constant(value), true)
    }

    /// Declares an unconditionally emitted blocking output.
    pub fn emits_blocking<T: Payload, R: Send + 'static>(
        self,
        molecule: &BlockingMolecule<T, R>,
    ) -> Self {
        self.output(molecule.core().clone(), OutputShape::Other, true)
    }

    /// Declares an output the body only emits on some code paths.
    pub fn may_emit<T: Payload>(self, molecule: &Molecule<T>) -> Self {
        self.output(molecule.core().clone(), OutputShape::Other, false)
    }

    /// Declares a conditionally emitted output with a known value.
    pub fn may_emit_value<T: Payload + PartialEq + Sync>(
        self,
        molecule: &Molecule<T>,
        value: T,
    ) -> Self {
        self.output(molecule.core().clone(), OutputShape::constant(value), false)
    }

    /// Declares a conditionally emitted blocking output.
    pub fn may_emit_blocking<T: Payload, R: Send + 'static>(
        self,
        molecule: &BlockingMolecule<T, R>,
    ) -> Self {
        self.output(molecule.core().clone(), OutputShape::Other, false)
    }

    fn output(mut self, mol: Arc<MoleculeCore>, shape: OutputShape, guaranteed: bool) -> Self {
        self.outputs.push(OutputMoleculeInfo {
            mol,
            shape,
            guaranteed,
        });
        self
    }

    /// Attaches a guard independent of the input values.
    pub fn when(mut self, guard: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.static_guard = Some(Box::new(guard));
        self
    }

    /// Attaches a guard over the values at the given input positions.
    ///
    /// The condition receives the erased candidate values in the order of
    /// `indices`; a combination is only committed if every cross guard
    /// accepts it.
    pub fn cross_guard(
        mut self,
        indices: Vec<usize>,
        condition: impl Fn(&[&dyn Any]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.cross_guards.push(CrossGuard {
            indices,
            condition: Box::new(condition),
        });
        self
    }

    /// Attaches a typed guard over the values at two input positions.
    pub fn guard2<A: Payload, B: Payload>(
        self,
        first: usize,
        second: usize,
        condition: impl Fn(&A, &B) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.cross_guard(vec![first, second], move |values| {
            match (values[0].downcast_ref::<A>(), values[1].downcast_ref::<B>()) {
                (Some(a), Some(b)) => condition(a, b),
                _ => false,
            }
        })
    }

    /// Runs this reaction's body on a dedicated pool instead of the site
    /// dispatch pool.
    pub fn on_pool(mut self, pool: &ThreadPool) -> Self {
        self.pool = Some(pool.clone());
        self
    }

    /// Re-emits the consumed inputs when the body fails, instead of
    /// discarding them.
    pub fn retry(mut self) -> Self {
        self.retry = true;
        self
    }

    /// Attaches the body and finalizes the descriptor.
    pub fn run(
        self,
        body: impl Fn(&mut ReactionInputs) -> BodyResult + Send + Sync + 'static,
    ) -> Reaction {
        let guard = if self.static_guard.is_some() || !self.cross_guards.is_empty() {
            Guard::Present {
                static_guard: self.static_guard,
                cross_guards: self.cross_guards,
            }
        } else if self.inputs.iter().all(|input| input.pattern.is_trivial()) {
            Guard::AllTrivial
        } else {
            Guard::Absent
        };

        let mut info = ReactionInfo {
            inputs_sorted: sorted_by_specificity(&self.inputs),
            cross_conditional: cross_conditional_positions(&self.inputs, &guard),
            inputs: self.inputs,
            outputs: self.outputs,
            guard,
            fingerprint: String::new(),
        };
        info.fingerprint = blake3::hash(info.to_string().as_bytes())
            .to_hex()
            .to_string();

        Reaction {
            info,
            body: Box::new(body),
            pool: self.pool,
            retry: self.retry,
        }
    }
}

impl fmt::Debug for ReactionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionBuilder")
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

fn sorted_by_specificity(inputs: &[InputMoleculeInfo]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.sort_by_key(|&position| inputs[position].pattern.specificity());
    order
}

fn cross_conditional_positions(inputs: &[InputMoleculeInfo], guard: &Guard) -> Vec<bool> {
    let mut positions = vec![false; inputs.len()];

    if let Guard::Present { cross_guards, .. } = guard {
        for cross in cross_guards {
            for &index in &cross.indices {
                if let Some(flag) = positions.get_mut(index) {
                    *flag = true;
                }
            }
        }
    }

    // A repeated emitter with a nontrivial pattern couples its positions: the
    // value chosen for one position constrains what remains for the others.
    for (position, input) in inputs.iter().enumerate() {
        let repeated = inputs
            .iter()
            .filter(|other| other.mol.id() == input.mol.id())
            .count()
            > 1;
        let group_nontrivial = inputs
            .iter()
            .any(|other| other.mol.id() == input.mol.id() && !other.pattern.is_trivial());
        if repeated && group_nontrivial {
            positions[position] = true;
        }
    }

    positions
}

/// The concrete input values handed to a reaction body.
///
/// Values are taken by input position (declaration order). Each position can
/// be taken at most once.
pub struct ReactionInputs {
    slots: Vec<Option<TakenInput>>,
}

struct TakenInput {
    name: String,
    payload: Box<dyn Any + Send>,
    reply: Option<ReplyHandleErased>,
}

impl ReactionInputs {
    pub(crate) fn new(entries: Vec<(String, Instance)>) -> Self {
        Self {
            slots: entries
                .into_iter()
                .map(|(name, instance)| {
                    let (payload, reply) = instance.into_parts();
                    Some(TakenInput {
                        name,
                        payload,
                        reply,
                    })
                })
                .collect(),
        }
    }

    /// Takes the value consumed at the given input position.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of range, was already taken, or does not
    /// carry a value of type `T`. These are declaration bugs: the position
    /// and type are fixed by the corresponding
    /// [`consume`](ReactionBuilder::consume) call.
    pub fn take<T: Payload>(&mut self, index: usize) -> T {
        let slot = self.take_slot(index);
        match slot.payload.downcast::<T>() {
            Ok(value) => *value,
            Err(_) => panic!(
                "input {} ({}) does not carry a value of the requested type",
                index, slot.name
            ),
        }
    }

    /// Takes the value and the reply token consumed at the given blocking
    /// input position.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`take`](ReactionInputs::take),
    /// and if the position is not a blocking input.
    pub fn take_blocking<T: Payload, R: Send + 'static>(
        &mut self,
        index: usize,
    ) -> (T, ReplyToken<R>) {
        let slot = self.take_slot(index);
        let name = slot.name;
        let value = match slot.payload.downcast::<T>() {
            Ok(value) => *value,
            Err(_) => panic!(
                "input {} ({}) does not carry a value of the requested type",
                index, name
            ),
        };
        let handle = slot
            .reply
            .unwrap_or_else(|| panic!("input {} ({}) is not a blocking input", index, name));
        let core = handle
            .core
            .downcast::<ReplyCore<R>>()
            .unwrap_or_else(|_| {
                panic!(
                    "input {} ({}) does not reply with the requested type",
                    index, name
                )
            });
        (value, ReplyToken::new(core))
    }

    fn take_slot(&mut self, index: usize) -> TakenInput {
        match self.slots.get_mut(index) {
            None => panic!("input position {} is out of range", index),
            Some(slot) => slot
                .take()
                .unwrap_or_else(|| panic!("input {} was already taken", index)),
        }
    }
}

impl fmt::Debug for ReactionInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionInputs")
            .field("len", &self.slots.len())
            .finish_non_exhaustive()
    }
}
