//! Construction-time analysis of a site's declared chemistry.
//!
//! The analyzer runs once when a site is constructed. It is a pure function
//! of the reaction list: running it twice yields identical results. Errors
//! abort site construction; warnings are reported on the site handle and
//! through `tracing`.

use std::collections::BTreeMap;
use std::fmt;

use crate::molecule::MoleculeKind;
use crate::reaction::{Reaction, ReactionInfo};

/// Result of analyzing a reaction list.
pub(crate) struct Analysis {
    pub(crate) errors: Vec<AnalysisError>,
    pub(crate) warnings: Vec<AnalysisWarning>,
    /// Ids of the molecules seeded by static reactions, with display names.
    pub(crate) static_molecules: BTreeMap<u64, String>,
}

/// An error that aborts site construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A guardless reaction would always fire whenever another one could.
    Shadowing {
        /// The reaction that can never be selected.
        shadowed: String,
        /// The weaker reaction that always matches first.
        shadowing: String,
    },
    /// A guardless reaction unconditionally reproduces its own inputs.
    UnavoidableLivelock {
        /// Display form of the reaction.
        reaction: String,
    },
    /// A static molecule is not an input of any reaction.
    StaticNotConsumed {
        /// Display name of the molecule.
        molecule: String,
    },
    /// A reaction consumes more than one copy of a static molecule.
    StaticMultiplicity {
        /// Display name of the molecule.
        molecule: String,
        /// Display form of the reaction.
        reaction: String,
        /// Number of copies consumed.
        count: usize,
    },
    /// A reaction consumes a static molecule without re-emitting it.
    StaticNotReemitted {
        /// Display name of the molecule.
        molecule: String,
        /// Display form of the reaction.
        reaction: String,
    },
    /// A reaction emits a static molecule it does not consume.
    StaticNotConsumedByEmitter {
        /// Display name of the molecule.
        molecule: String,
        /// Display form of the reaction.
        reaction: String,
    },
    /// A static (seed) reaction carries a guard.
    GuardedSeed {
        /// Display form of the reaction.
        reaction: String,
    },
    /// A blocking molecule is declared static.
    BlockingStatic {
        /// Display name of the molecule.
        molecule: String,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shadowing {
                shadowed,
                shadowing,
            } => write!(
                f,
                "Unavoidable indeterminism: reaction {} is shadowed by {}",
                shadowed, shadowing
            ),
            Self::UnavoidableLivelock { reaction } => {
                write!(f, "Unavoidable livelock: reaction {}", reaction)
            }
            Self::StaticNotConsumed { molecule } => write!(
                f,
                "Incorrect static molecule declaration: static molecule {} is not consumed by any reaction",
                molecule
            ),
            Self::StaticMultiplicity {
                molecule,
                reaction,
                count,
            } => write!(
                f,
                "Incorrect static molecule declaration: static molecule {} is consumed {} times by reaction {}",
                molecule, count, reaction
            ),
            Self::StaticNotReemitted { molecule, reaction } => write!(
                f,
                "Incorrect static molecule declaration: static molecule {} is consumed but not emitted by reaction {}",
                molecule, reaction
            ),
            Self::StaticNotConsumedByEmitter { molecule, reaction } => write!(
                f,
                "Incorrect static molecule declaration: static molecule {} is emitted but not consumed by reaction {}",
                molecule, reaction
            ),
            Self::GuardedSeed { reaction } => write!(
                f,
                "Incorrect static molecule declaration: static reaction {} must not have a guard",
                reaction
            ),
            Self::BlockingStatic { molecule } => write!(
                f,
                "Incorrect static molecule declaration: molecule {} cannot be static because it is blocking",
                molecule
            ),
        }
    }
}

/// A suspicious but not fatal property of the declared chemistry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisWarning {
    /// Two declared reactions have identical chemistry.
    IdenticalReactions {
        /// Display form shared by the reactions.
        reaction: String,
    },
    /// A reaction may reproduce its own inputs.
    PossibleLivelock {
        /// Display form of the reaction.
        reaction: String,
    },
    /// A reaction consumes a blocking molecule together with a molecule that
    /// is only emitted after it.
    InputSideDeadlock {
        /// Display name of the blocking molecule.
        molecule: String,
        /// Display form of the consuming reaction.
        reaction: String,
    },
    /// A reaction emits a blocking molecule before further outputs that some
    /// reaction consumes together with it.
    OutputSideDeadlock {
        /// Display name of the blocking molecule.
        molecule: String,
        /// Display form of the emitting reaction.
        reaction: String,
    },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdenticalReactions { reaction } => {
                write!(f, "Identical reactions declared: {}", reaction)
            }
            Self::PossibleLivelock { reaction } => {
                write!(f, "Possible livelock: reaction {}", reaction)
            }
            Self::InputSideDeadlock { molecule, reaction } => write!(
                f,
                "Possible deadlock: molecule {} may deadlock due to the inputs of reaction {}",
                molecule, reaction
            ),
            Self::OutputSideDeadlock { molecule, reaction } => write!(
                f,
                "Possible deadlock: molecule {} may deadlock due to the outputs of reaction {}",
                molecule, reaction
            ),
        }
    }
}

/// Runs all checks over the declared reactions.
//
// TODO: detect livelocks spanning several reactions (a cycle in the
// reproduces relation); only the single-reaction case is checked here.
pub(crate) fn analyze(reactions: &[Reaction]) -> Analysis {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_identical(reactions, &mut warnings);
    let static_molecules = collect_static_molecules(reactions, &mut errors);
    check_static_discipline(reactions, &static_molecules, &mut errors);
    check_shadowing(reactions, &mut errors);
    check_livelock(reactions, &mut errors, &mut warnings);
    check_deadlock(reactions, &mut warnings);

    Analysis {
        errors,
        warnings,
        static_molecules,
    }
}

fn check_identical(reactions: &[Reaction], warnings: &mut Vec<AnalysisWarning>) {
    for (i, first) in reactions.iter().enumerate() {
        for second in &reactions[i + 1..] {
            if first.info.fingerprint == second.info.fingerprint {
                warnings.push(AnalysisWarning::IdenticalReactions {
                    reaction: first.info.to_string(),
                });
            }
        }
    }
}

/// Static molecules are the guaranteed outputs of seed reactions. Seeds must
/// be guardless and must not seed blocking molecules.
fn collect_static_molecules(
    reactions: &[Reaction],
    errors: &mut Vec<AnalysisError>,
) -> BTreeMap<u64, String> {
    let mut static_molecules = BTreeMap::new();

    for reaction in reactions.iter().filter(|r| r.info.is_seed()) {
        if !reaction.info.is_guardless() {
            errors.push(AnalysisError::GuardedSeed {
                reaction: reaction.info.to_string(),
            });
        }
        for output in reaction.info.guaranteed_outputs() {
            if output.mol.kind() == MoleculeKind::Blocking {
                errors.push(AnalysisError::BlockingStatic {
                    molecule: output.mol.display_name(),
                });
            } else {
                static_molecules.insert(output.mol.id(), output.mol.display_name());
            }
        }
    }

    static_molecules
}

fn check_static_discipline(
    reactions: &[Reaction],
    static_molecules: &BTreeMap<u64, String>,
    errors: &mut Vec<AnalysisError>,
) {
    let consuming: Vec<&ReactionInfo> = reactions
        .iter()
        .filter(|r| !r.info.is_seed())
        .map(|r| &r.info)
        .collect();

    for (&id, name) in static_molecules {
        if !consuming
            .iter()
            .any(|info| info.inputs.iter().any(|input| input.mol.id() == id))
        {
            errors.push(AnalysisError::StaticNotConsumed {
                molecule: name.clone(),
            });
        }

        for info in &consuming {
            let consumed = info
                .inputs
                .iter()
                .filter(|input| input.mol.id() == id)
                .count();
            let emitted = info
                .guaranteed_outputs()
                .any(|output| output.mol.id() == id);

            if consumed > 1 {
                errors.push(AnalysisError::StaticMultiplicity {
                    molecule: name.clone(),
                    reaction: info.to_string(),
                    count: consumed,
                });
            }
            if consumed > 0 && !emitted {
                errors.push(AnalysisError::StaticNotReemitted {
                    molecule: name.clone(),
                    reaction: info.to_string(),
                });
            }
            if consumed == 0 && emitted {
                errors.push(AnalysisError::StaticNotConsumedByEmitter {
                    molecule: name.clone(),
                    reaction: info.to_string(),
                });
            }
        }
    }
}

/// Reaction shadowing: a guardless reaction whose every input is weaker than
/// some distinct input of another reaction fires whenever the other could.
fn check_shadowing(reactions: &[Reaction], errors: &mut Vec<AnalysisError>) {
    let candidates: Vec<&ReactionInfo> = reactions
        .iter()
        .filter(|r| !r.info.is_seed())
        .map(|r| &r.info)
        .collect();

    for weaker in &candidates {
        if !weaker.is_guardless() {
            continue;
        }
        for stronger in &candidates {
            if std::ptr::eq(*weaker, *stronger) || !stronger.is_guardless() {
                continue;
            }
            // Identical chemistry is reported by the identical-reaction
            // check, not as shadowing.
            if weaker.fingerprint == stronger.fingerprint {
                continue;
            }
            let covered = injective_match(weaker.inputs.len(), stronger.inputs.len(), |a, b| {
                let first = &weaker.inputs[a];
                let second = &stronger.inputs[b];
                first.mol.id() == second.mol.id()
                    && first.pattern.weaker_or_equal(&second.pattern)
            });
            if covered {
                errors.push(AnalysisError::Shadowing {
                    shadowed: stronger.to_string(),
                    shadowing: weaker.to_string(),
                });
            }
        }
    }
}

fn check_livelock(
    reactions: &[Reaction],
    errors: &mut Vec<AnalysisError>,
    warnings: &mut Vec<AnalysisWarning>,
) {
    for reaction in reactions.iter().filter(|r| !r.info.is_seed()) {
        let info = &reaction.info;
        let guaranteed: Vec<_> = info.guaranteed_outputs().collect();

        // Unconditional reproduction: every input admits some distinct
        // guaranteed output of the same molecule.
        let unavoidable = info.is_guardless()
            && injective_match(info.inputs.len(), guaranteed.len(), |a, b| {
                let input = &info.inputs[a];
                let output = guaranteed[b];
                input.mol.id() == output.mol.id()
                    && input.pattern.weaker_than_output(&output.shape, true)
            });

        if unavoidable {
            errors.push(AnalysisError::UnavoidableLivelock {
                reaction: info.to_string(),
            });
            continue;
        }

        // Reproduction that a guard, a refutable pattern or a conditional
        // output might still prevent.
        let possible = injective_match(info.inputs.len(), info.outputs.len(), |a, b| {
            let input = &info.inputs[a];
            let output = &info.outputs[b];
            input.mol.id() == output.mol.id()
                && input.pattern.weaker_than_output(&output.shape, false)
        });

        if possible {
            warnings.push(AnalysisWarning::PossibleLivelock {
                reaction: info.to_string(),
            });
        }
    }
}

/// A blocking emission parks its emitter: outputs declared after a blocking
/// output are only emitted once somebody replies. A reaction that needs the
/// blocking molecule together with one of those later outputs may therefore
/// never fire.
fn check_deadlock(reactions: &[Reaction], warnings: &mut Vec<AnalysisWarning>) {
    let infos: Vec<&ReactionInfo> = reactions.iter().map(|r| &r.info).collect();

    for emitter in &infos {
        for (i, blocking) in emitter.outputs.iter().enumerate() {
            if blocking.mol.kind() != MoleculeKind::Blocking {
                continue;
            }
            for later in &emitter.outputs[i + 1..] {
                for consumer in infos.iter().filter(|info| !info.is_seed()) {
                    let takes_both = consumer
                        .inputs
                        .iter()
                        .any(|input| input.mol.id() == blocking.mol.id())
                        && consumer
                            .inputs
                            .iter()
                            .any(|input| input.mol.id() == later.mol.id());
                    if !takes_both {
                        continue;
                    }
                    let output_side = AnalysisWarning::OutputSideDeadlock {
                        molecule: blocking.mol.display_name(),
                        reaction: emitter.to_string(),
                    };
                    if !warnings.contains(&output_side) {
                        warnings.push(output_side);
                    }
                    if later.mol.kind() == MoleculeKind::NonBlocking {
                        let input_side = AnalysisWarning::InputSideDeadlock {
                            molecule: blocking.mol.display_name(),
                            reaction: consumer.to_string(),
                        };
                        if !warnings.contains(&input_side) {
                            warnings.push(input_side);
                        }
                    }
                }
            }
        }
    }
}

/// Whether an injective assignment exists mapping each of the `needles`
/// positions to a distinct `haystack` position accepted by the predicate.
/// Lists are small, so a plain backtracking search is used.
fn injective_match(needles: usize, haystack: usize, accepts: impl Fn(usize, usize) -> bool) -> bool {
    fn go(
        needle: usize,
        needles: usize,
        haystack: usize,
        used: &mut Vec<bool>,
        accepts: &impl Fn(usize, usize) -> bool,
    ) -> bool {
        if needle == needles {
            return true;
        }
        for candidate in 0..haystack {
            if used[candidate] || !accepts(needle, candidate) {
                continue;
            }
            used[candidate] = true;
            if go(needle + 1, needles, haystack, used, accepts) {
                return true;
            }
            used[candidate] = false;
        }
        false
    }

    let mut used = vec![false; haystack];
    go(0, needles, haystack, &mut used, &accepts)
}
