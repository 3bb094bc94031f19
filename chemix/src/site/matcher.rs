//! Pure search for a multiset of bag values satisfying a reaction.
//!
//! The matcher is a pure function of the reaction descriptor and the bag
//! contents at the moment of the call. Two paths exist:
//!
//! * a greedy fold over the inputs in most-constraining-first order, when no
//!   cross guard and no coupled repeated-emitter pattern is present;
//! * a backtracking search otherwise, threading the set of already-chosen
//!   occurrences so that repeated emitters always receive distinct values,
//!   and evaluating the cross guards on each complete assignment.

use std::any::Any;

use super::bag::Bag;
use crate::reaction::ReactionInfo;

/// Attempts to find one admissible assignment of bag values to the reaction's
/// input positions.
///
/// `input_mols` maps each input position to its site-local molecule index.
/// On success, returns the chosen sequence ids in input-declaration order.
pub(crate) fn find_assignment(
    info: &ReactionInfo,
    input_mols: &[usize],
    bag: &Bag,
) -> Option<Vec<u64>> {
    if !info.static_guard_passes() {
        return None;
    }

    // Cheap pre-check: every input molecule needs at least one candidate.
    for &molecule in input_mols {
        if bag.count(molecule) == 0 {
            return None;
        }
    }

    if info.needs_search() {
        search(info, input_mols, bag)
    } else {
        greedy(info, input_mols, bag)
    }
}

/// O(inputs) path: pick any admissible value per position; positions are
/// independent, so a failed position fails the reaction.
fn greedy(info: &ReactionInfo, input_mols: &[usize], bag: &Bag) -> Option<Vec<u64>> {
    let mut chosen = vec![0u64; info.inputs.len()];
    let mut used: Vec<(usize, u64)> = Vec::with_capacity(info.inputs.len());

    for &position in &info.inputs_sorted {
        let molecule = input_mols[position];
        let pattern = &info.inputs[position].pattern;
        let found = bag.values(molecule).iter().find(|stored| {
            !used.contains(&(molecule, stored.seq)) && pattern.admits(stored.value.payload_ref())
        })?;
        used.push((molecule, found.seq));
        chosen[position] = found.seq;
    }

    Some(chosen)
}

fn search(info: &ReactionInfo, input_mols: &[usize], bag: &Bag) -> Option<Vec<u64>> {
    let mut chosen = vec![0u64; info.inputs.len()];
    let mut used: Vec<(usize, u64)> = Vec::with_capacity(info.inputs.len());

    if backtrack(info, input_mols, bag, 0, &mut chosen, &mut used) {
        Some(chosen)
    } else {
        None
    }
}

fn backtrack(
    info: &ReactionInfo,
    input_mols: &[usize],
    bag: &Bag,
    depth: usize,
    chosen: &mut Vec<u64>,
    used: &mut Vec<(usize, u64)>,
) -> bool {
    if depth == info.inputs_sorted.len() {
        return cross_guards_pass(info, input_mols, bag, chosen);
    }

    let position = info.inputs_sorted[depth];
    let molecule = input_mols[position];
    let pattern = &info.inputs[position].pattern;

    // A trivial pattern at a position that nothing couples to: any available
    // value is as good as any other, so the first one is taken without
    // enumeration.
    let independent = pattern.is_trivial() && !info.cross_conditional[position];

    for stored in bag.values(molecule) {
        if used.contains(&(molecule, stored.seq)) {
            continue;
        }
        if !pattern.admits(stored.value.payload_ref()) {
            continue;
        }

        chosen[position] = stored.seq;
        used.push((molecule, stored.seq));
        if backtrack(info, input_mols, bag, depth + 1, chosen, used) {
            return true;
        }
        used.pop();

        if independent {
            return false;
        }
    }

    false
}

fn cross_guards_pass(
    info: &ReactionInfo,
    input_mols: &[usize],
    bag: &Bag,
    chosen: &[u64],
) -> bool {
    for guard in info.cross_guards() {
        let values: Vec<&dyn Any> = guard
            .indices
            .iter()
            .map(|&position| {
                let molecule = input_mols[position];
                bag.values(molecule)
                    .iter()
                    .find(|stored| stored.seq == chosen[position])
                    .expect("chosen value disappeared from the bag during matching")
                    .value
                    .payload_ref()
            })
            .collect();
        if !(guard.condition)(&values) {
            return false;
        }
    }
    true
}
