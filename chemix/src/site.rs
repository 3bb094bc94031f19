//! Reaction sites: bag ownership, scheduling and reaction execution.
//!
//! A site is constructed from the reactions that consume its molecules. At
//! construction the declared chemistry is [analyzed](AnalysisError), the
//! input emitters are bound, and the seed reactions run once to initialize
//! the static molecules. Afterwards the site reacts to every bag change:
//! a coalesced scheduling pass runs on the scheduler pool, matches pending
//! values against the reactions, atomically removes a chosen multiset and
//! dispatches the reaction body to a thread pool.
//!
//! Scheduling decisions are serialized by a per-site mutex; reaction bodies
//! run outside of it, in parallel with each other and with emissions.

mod analyzer;
mod bag;
mod matcher;

pub use analyzer::{AnalysisError, AnalysisWarning};

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::error_log::{ErrorLog, ReactionFailure};
use crate::executor::ThreadPool;
use crate::molecule::{EmitError, Instance, MoleculeCore, Payload};
use crate::reaction::{Reaction, ReactionInputs};
use crate::reply::{ReplyReceiver, ReplyStatus, WaitOutcome};
use self::bag::Bag;

/// Unique identifier for site instances.
static NEXT_SITE_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// The reaction currently executing on this thread, if any.
    static ACTIVE_REACTION: RefCell<Option<ReactionFrame>> = const { RefCell::new(None) };
}

/// Execution context of one reaction body, tracking its one-shot permissions
/// to emit static molecules.
struct ReactionFrame {
    site_id: u64,
    /// Site-local indices of the static molecules this execution may emit.
    allowed: Vec<usize>,
    /// Indices already emitted by this execution.
    used: Vec<usize>,
}

fn install_frame(frame: ReactionFrame) {
    ACTIVE_REACTION.with(|slot| *slot.borrow_mut() = Some(frame));
}

fn take_frame() -> ReactionFrame {
    ACTIVE_REACTION
        .with(|slot| slot.borrow_mut().take())
        .expect("reaction frame was removed while the body was running")
}

/// A reaction adopted by a site, with its site-local molecule indices.
struct SiteReaction {
    reaction: Reaction,
    /// Site-local molecule index per input position.
    input_mols: Vec<usize>,
    /// Site-local indices of the static molecules among the inputs.
    static_inputs: Vec<usize>,
    /// Cached display form.
    display: String,
}

struct SiteState {
    bag: Bag,
}

/// The runtime state of one reaction site.
pub(crate) struct ReactionSite {
    /// Back-reference to this site, used to hand `Arc` clones to pool tasks.
    weak_self: Weak<ReactionSite>,
    id: u64,
    /// The `Site{…}` header used in logs and error messages.
    header: String,
    reactions: Vec<SiteReaction>,
    /// Display name per site-local molecule index.
    molecule_names: Vec<String>,
    /// Site-local index per molecule id.
    index_of: HashMap<u64, usize>,
    /// Whether the molecule at each index is static.
    static_mols: Vec<bool>,
    /// Last emitted value of each static molecule, written under the site
    /// lock and cloned out on read.
    volatile: Vec<Option<Mutex<Option<Box<dyn Any + Send>>>>>,
    state: Mutex<SiteState>,
    /// Coalesces scheduling passes: set when a pass is pending.
    pass_pending: AtomicBool,
    /// Set once all output molecules were found bound.
    outputs_ok: AtomicBool,
    dispatch_pool: ThreadPool,
    scheduler_pool: ThreadPool,
    error_log: ErrorLog,
    warnings: Vec<String>,
}

impl ReactionSite {
    fn arc(&self) -> Arc<ReactionSite> {
        self.weak_self
            .upgrade()
            .expect("the site is alive while its methods run")
    }

    /// Adds a non-blocking value to the bag and wakes the scheduler.
    pub(crate) fn emit_nonblocking(&self, index: usize, value: Instance) -> Result<(), EmitError> {
        self.insert(index, value)?;
        self.notify();
        Ok(())
    }

    /// Adds a blocking value, wakes the scheduler and parks the calling
    /// thread on the reply slot.
    pub(crate) fn emit_blocking<R: Send + 'static>(
        &self,
        index: usize,
        value: Instance,
        receiver: ReplyReceiver<R>,
        timeout: Option<Duration>,
    ) -> Result<Option<R>, EmitError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let seq = self.insert(index, value)?;
        self.notify();

        match receiver.wait(deadline) {
            WaitOutcome::Replied(reply) => Ok(Some(reply)),
            WaitOutcome::Failed(detail) => Err(EmitError::ReplyFailed { detail }),
            WaitOutcome::TimedOut => {
                // Remove the value unless a reaction already consumed it; a
                // consuming reaction discovers the timeout via the checked
                // reply.
                let mut state = self.state.lock().unwrap();
                state.bag.remove(index, seq);
                Ok(None)
            }
        }
    }

    fn insert(&self, index: usize, value: Instance) -> Result<u64, EmitError> {
        self.check_outputs_bound()?;
        self.check_static_permission(index, &value)?;

        let mut state = self.state.lock().unwrap();
        if let Some(slot) = &self.volatile[index] {
            *slot.lock().unwrap() = Some(value.clone_payload());
        }
        Ok(state.bag.add(index, value))
    }

    /// First-emission check: every output molecule referenced by the site's
    /// reactions must be bound somewhere by now.
    fn check_outputs_bound(&self) -> Result<(), EmitError> {
        if self.outputs_ok.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut unbound: Vec<String> = Vec::new();
        for site_reaction in &self.reactions {
            for output in &site_reaction.reaction.info.outputs {
                if !output.mol.is_bound() {
                    let name = output.mol.display_name();
                    if !unbound.contains(&name) {
                        unbound.push(name);
                    }
                }
            }
        }

        if unbound.is_empty() {
            self.outputs_ok.store(true, Ordering::Release);
            Ok(())
        } else {
            Err(EmitError::UnboundOutputs {
                site: self.header.clone(),
                molecules: unbound,
            })
        }
    }

    /// Static molecules may only be emitted from a reaction of this site
    /// that consumes them (or from the seed reaction that declares them),
    /// at most once per execution.
    fn check_static_permission(&self, index: usize, value: &Instance) -> Result<(), EmitError> {
        if !self.static_mols[index] {
            return Ok(());
        }

        let refusal = ACTIVE_REACTION.with(|slot| {
            let mut slot = slot.borrow_mut();
            match slot.as_mut() {
                Some(frame) if frame.site_id == self.id => {
                    if !frame.allowed.contains(&index) {
                        Some("this reaction does not consume it")
                    } else if frame.used.contains(&index) {
                        Some("this reaction has already emitted it")
                    } else {
                        frame.used.push(index);
                        None
                    }
                }
                _ => Some("this thread does not run a chemical reaction"),
            }
        });

        match refusal {
            None => Ok(()),
            Some(reason) => Err(EmitError::StaticProtocol {
                site: self.header.clone(),
                detail: format!(
                    "Refusing to emit static molecule {}({}) because {}",
                    self.molecule_names[index],
                    value.display(),
                    reason
                ),
            }),
        }
    }

    /// Requests a scheduling pass, coalescing with one already pending.
    fn notify(&self) {
        if self.pass_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let site = self.arc();
        if self
            .scheduler_pool
            .submit(move || site.scheduling_pass())
            .is_err()
        {
            self.pass_pending.store(false, Ordering::Release);
            tracing::warn!(
                site = %self.header,
                "scheduler pool is shut down; pending molecules will not react"
            );
        }
    }

    /// Repeatedly commits and launches reactions while any is satisfiable.
    fn scheduling_pass(self: Arc<Self>) {
        self.pass_pending.store(false, Ordering::Release);
        loop {
            let decision = {
                let mut state = self.state.lock().unwrap();
                self.select_reaction(&mut state)
            };
            match decision {
                None => break,
                Some((index, inputs)) => self.launch(index, inputs),
            }
        }
    }

    /// One scheduling decision: the first reaction with an admissible
    /// assignment, whose inputs are atomically removed from the bag.
    fn select_reaction(&self, state: &mut SiteState) -> Option<(usize, Vec<Instance>)> {
        for (index, site_reaction) in self.reactions.iter().enumerate() {
            if site_reaction.reaction.info.is_seed() {
                continue;
            }
            let chosen = match matcher::find_assignment(
                &site_reaction.reaction.info,
                &site_reaction.input_mols,
                &state.bag,
            ) {
                None => continue,
                Some(chosen) => chosen,
            };

            let inputs = chosen
                .iter()
                .enumerate()
                .map(|(position, &seq)| {
                    state
                        .bag
                        .remove(site_reaction.input_mols[position], seq)
                        .expect("chosen input vanished from the bag")
                })
                .collect();
            tracing::trace!(
                site = %self.header,
                reaction = %site_reaction.display,
                "scheduling reaction"
            );
            return Some((index, inputs));
        }
        None
    }

    fn launch(&self, index: usize, inputs: Vec<Instance>) {
        let site_reaction = &self.reactions[index];
        let pool = site_reaction
            .reaction
            .pool
            .as_ref()
            .unwrap_or(&self.dispatch_pool)
            .clone();

        // The inputs are kept reachable so that a refused submission can
        // still unblock their waiters.
        let holder = Arc::new(Mutex::new(Some(inputs)));
        let task_inputs = holder.clone();
        let site = self.arc();
        let submitted = pool.submit(move || {
            if let Some(inputs) = task_inputs.lock().unwrap().take() {
                site.run_reaction(index, inputs);
            }
        });

        if submitted.is_err() {
            if let Some(inputs) = holder.lock().unwrap().take() {
                let message = format!(
                    "In {}: Reaction {} could not be started because the dispatch pool is shut down",
                    self.header, site_reaction.display
                );
                for instance in &inputs {
                    if let Some(status) = instance.reply_status() {
                        status.fail_if_unreplied(message.clone());
                    }
                }
                tracing::warn!(site = %self.header, "{}", message);
            }
        }
    }

    /// Body task: runs the reaction under a fresh reaction frame, then
    /// verifies replies and static re-emissions, or handles the failure.
    fn run_reaction(self: Arc<Self>, index: usize, inputs: Vec<Instance>) {
        let site_reaction = &self.reactions[index];

        let snapshot: Option<Vec<Instance>> = if site_reaction.reaction.retry {
            Some(inputs.iter().map(Instance::snapshot).collect())
        } else {
            None
        };
        let blocking: Vec<(usize, Arc<dyn ReplyStatus>)> = inputs
            .iter()
            .enumerate()
            .filter_map(|(position, instance)| {
                instance.reply_status().map(|status| (position, status))
            })
            .collect();
        let inputs_display = inputs
            .iter()
            .enumerate()
            .map(|(position, instance)| {
                format!(
                    "{}({})",
                    self.molecule_names[site_reaction.input_mols[position]],
                    instance.display()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        install_frame(ReactionFrame {
            site_id: self.id,
            allowed: site_reaction.static_inputs.clone(),
            used: Vec::new(),
        });
        let mut io = ReactionInputs::new(
            inputs
                .into_iter()
                .enumerate()
                .map(|(position, instance)| {
                    (
                        self.molecule_names[site_reaction.input_mols[position]].clone(),
                        instance,
                    )
                })
                .collect(),
        );
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (site_reaction.reaction.body)(&mut io)));
        let frame = take_frame();

        match outcome {
            Ok(Ok(())) => {
                for (position, status) in &blocking {
                    let molecule = &self.molecule_names[site_reaction.input_mols[*position]];
                    let message = format!(
                        "In {}: Reaction {} with inputs [{}] finished without replying to {}",
                        self.header, site_reaction.display, inputs_display, molecule
                    );
                    if status.fail_if_unreplied(message.clone()) {
                        self.record_failure(site_reaction, message);
                    }
                }
                for &molecule in &site_reaction.static_inputs {
                    if !frame.used.contains(&molecule) {
                        let message = format!(
                            "In {}: Reaction {} consumed static molecule {} but did not emit it",
                            self.header, site_reaction.display, self.molecule_names[molecule]
                        );
                        self.record_failure(site_reaction, message);
                    }
                }
            }
            outcome => {
                let reason = match outcome {
                    Ok(Err(error)) => error.to_string(),
                    Err(payload) => panic_reason(payload.as_ref()),
                    Ok(Ok(())) => unreachable!(),
                };
                match snapshot {
                    Some(snapshot) => {
                        tracing::warn!(
                            site = %self.header,
                            reaction = %site_reaction.display,
                            error = %reason,
                            "reaction failed; re-emitting its inputs"
                        );
                        let mut state = self.state.lock().unwrap();
                        for (position, instance) in snapshot.into_iter().enumerate() {
                            state
                                .bag
                                .add(site_reaction.input_mols[position], instance);
                        }
                    }
                    None => {
                        let message = format!(
                            "In {}: Reaction {} with inputs [{}] failed: {}",
                            self.header, site_reaction.display, inputs_display, reason
                        );
                        for (_, status) in &blocking {
                            status.fail_if_unreplied(message.clone());
                        }
                        self.record_failure(site_reaction, message);
                    }
                }
            }
        }

        self.notify();
    }

    fn record_failure(&self, site_reaction: &SiteReaction, message: String) {
        tracing::error!(site = %self.header, "{}", message);
        self.error_log.push(ReactionFailure {
            site: self.header.clone(),
            reaction: site_reaction.display.clone(),
            message,
        });
    }

    /// Runs the seed reactions synchronously, verifying that each emits its
    /// declared static molecules exactly once.
    fn run_seeds(&self) -> Result<(), ConfigError> {
        for site_reaction in &self.reactions {
            if !site_reaction.reaction.info.is_seed() {
                continue;
            }
            let declared: Vec<usize> = site_reaction
                .reaction
                .info
                .guaranteed_outputs()
                .filter_map(|output| self.index_of.get(&output.mol.id()).copied())
                .filter(|&index| self.static_mols[index])
                .collect();

            install_frame(ReactionFrame {
                site_id: self.id,
                allowed: declared.clone(),
                used: Vec::new(),
            });
            let mut io = ReactionInputs::new(Vec::new());
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (site_reaction.reaction.body)(&mut io)));
            let frame = take_frame();

            let seed_error = |detail: String| ConfigError::Seed {
                site: self.header.clone(),
                detail,
            };
            match outcome {
                Ok(Ok(())) => {
                    for &molecule in &declared {
                        if !frame.used.contains(&molecule) {
                            return Err(seed_error(format!(
                                "static reaction {} finished without emitting static molecule {}",
                                site_reaction.display, self.molecule_names[molecule]
                            )));
                        }
                    }
                }
                Ok(Err(error)) => {
                    return Err(seed_error(format!(
                        "static reaction {} failed: {}",
                        site_reaction.display, error
                    )))
                }
                Err(payload) => {
                    return Err(seed_error(format!(
                        "static reaction {} failed: {}",
                        site_reaction.display,
                        panic_reason(payload.as_ref())
                    )))
                }
            }
        }
        Ok(())
    }

    /// Returns the last value a reaction emitted for a static molecule.
    ///
    /// Readers may observe the previous value while an update reaction is
    /// running between consuming and re-emitting; this transient
    /// inconsistency is part of the contract.
    pub(crate) fn volatile_value<T: Payload>(&self, index: usize) -> Result<T, EmitError> {
        let slot = self.volatile[index]
            .as_ref()
            .ok_or_else(|| EmitError::NotStatic {
                site: self.header.clone(),
                molecule: self.molecule_names[index].clone(),
            })?;
        let guard = slot.lock().unwrap();
        let value = guard
            .as_ref()
            .expect("static molecule volatile slot is seeded at construction");
        Ok(value
            .downcast_ref::<T>()
            .expect("volatile value carries the emitter's payload type")
            .clone())
    }

    pub(crate) fn is_static(&self, index: usize) -> bool {
        self.static_mols[index]
    }

    /// Renders the bag contents for diagnostics.
    pub(crate) fn log_soup(&self) -> String {
        let state = self.state.lock().unwrap();
        if state.bag.is_empty() {
            return format!("{}\nNo molecules", self.header);
        }

        let mut groups: BTreeMap<(String, String), usize> = BTreeMap::new();
        for (molecule, stored) in state.bag.iter() {
            *groups
                .entry((self.molecule_names[molecule].clone(), stored.value.display()))
                .or_insert(0) += 1;
        }
        let rendered = groups
            .into_iter()
            .map(|((name, value), count)| {
                if count > 1 {
                    format!("{}({}) * {}", name, value, count)
                } else {
                    format!("{}({})", name, value)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}\nMolecules: {}", self.header, rendered)
    }
}

impl fmt::Display for ReactionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)
    }
}

impl fmt::Debug for ReactionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionSite")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("reaction body panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("reaction body panicked: {}", message)
    } else {
        "reaction body panicked".to_string()
    }
}

/// Builder for a reaction site.
///
/// Scheduling passes run on the scheduler pool (the dispatch pool unless one
/// is set explicitly); reaction bodies run on the dispatch pool or on a
/// per-reaction pool.
pub struct SiteInit {
    dispatch_pool: ThreadPool,
    scheduler_pool: Option<ThreadPool>,
    error_log: Option<ErrorLog>,
    reactions: Vec<Reaction>,
}

impl SiteInit {
    /// Starts building a site that dispatches reaction bodies on `pool`.
    pub fn new(dispatch_pool: ThreadPool) -> Self {
        Self {
            dispatch_pool,
            scheduler_pool: None,
            error_log: None,
            reactions: Vec::new(),
        }
    }

    /// Runs scheduling passes on a dedicated pool.
    pub fn scheduler_pool(mut self, pool: ThreadPool) -> Self {
        self.scheduler_pool = Some(pool);
        self
    }

    /// Records reaction failures into the given log instead of a fresh one.
    pub fn error_log(mut self, log: ErrorLog) -> Self {
        self.error_log = Some(log);
        self
    }

    /// Adds a reaction to the site.
    pub fn reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    /// Analyzes the chemistry, binds the input molecules, runs the seed
    /// reactions and starts the site.
    pub fn init(self) -> Result<SiteHandle, ConfigError> {
        let header = format!(
            "Site{{{}}}",
            self.reactions
                .iter()
                .map(|reaction| format!("{} → ...", reaction.info.header_inputs()))
                .collect::<Vec<_>>()
                .join("; ")
        );

        let analysis = analyzer::analyze(&self.reactions);
        if !analysis.errors.is_empty() {
            return Err(ConfigError::Analysis {
                site: header,
                errors: analysis.errors,
            });
        }
        let warnings: Vec<String> = analysis
            .warnings
            .iter()
            .map(|warning| warning.to_string())
            .collect();
        for warning in &warnings {
            tracing::warn!(site = %header, "{}", warning);
        }

        // Index the input molecules in first-seen order.
        let mut index_of: HashMap<u64, usize> = HashMap::new();
        let mut cores: Vec<Arc<MoleculeCore>> = Vec::new();
        for reaction in &self.reactions {
            for input in &reaction.info.inputs {
                index_of.entry(input.mol.id()).or_insert_with(|| {
                    cores.push(input.mol.clone());
                    cores.len() - 1
                });
            }
        }

        let molecule_names: Vec<String> = cores.iter().map(|core| core.display_name()).collect();
        let static_mols: Vec<bool> = cores
            .iter()
            .map(|core| analysis.static_molecules.contains_key(&core.id()))
            .collect();
        let volatile = static_mols
            .iter()
            .map(|&is_static| is_static.then(|| Mutex::new(None)))
            .collect();

        let reactions: Vec<SiteReaction> = self
            .reactions
            .into_iter()
            .map(|reaction| {
                let input_mols: Vec<usize> = reaction
                    .info
                    .inputs
                    .iter()
                    .map(|input| index_of[&input.mol.id()])
                    .collect();
                let static_inputs: Vec<usize> = input_mols
                    .iter()
                    .copied()
                    .filter(|&molecule| static_mols[molecule])
                    .collect();
                let display = reaction.info.to_string();
                SiteReaction {
                    reaction,
                    input_mols,
                    static_inputs,
                    display,
                }
            })
            .collect();

        let dispatch_pool = self.dispatch_pool;
        let scheduler_pool = self.scheduler_pool.unwrap_or_else(|| dispatch_pool.clone());

        let error_log = self.error_log.unwrap_or_default();
        let site = Arc::new_cyclic(|weak_self| ReactionSite {
            weak_self: weak_self.clone(),
            id: NEXT_SITE_ID.fetch_add(1, Ordering::Relaxed),
            header,
            reactions,
            molecule_names,
            index_of,
            static_mols,
            volatile,
            state: Mutex::new(SiteState {
                bag: Bag::new(cores.len()),
            }),
            pass_pending: AtomicBool::new(false),
            outputs_ok: AtomicBool::new(false),
            dispatch_pool,
            scheduler_pool,
            error_log,
            warnings,
        });

        for (index, core) in cores.iter().enumerate() {
            if core.bind(Arc::downgrade(&site), index).is_err() {
                return Err(ConfigError::AlreadyBound {
                    site: site.header.clone(),
                    molecule: core.display_name(),
                });
            }
        }

        site.run_seeds()?;

        tracing::info!(site = %site.header, "reaction site started");
        Ok(SiteHandle { site })
    }
}

impl fmt::Debug for SiteInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteInit")
            .field("reactions", &self.reactions.len())
            .finish_non_exhaustive()
    }
}

/// Owner handle of a running reaction site.
///
/// The handle keeps the site alive: the bound molecules only hold weak
/// back-pointers, so dropping the last handle effectively unbinds the
/// chemistry (subsequent emissions fail with the unbound-molecule error).
pub struct SiteHandle {
    site: Arc<ReactionSite>,
}

impl SiteHandle {
    /// Renders the current bag contents.
    pub fn log_soup(&self) -> String {
        self.site.log_soup()
    }

    /// The warnings produced by the static analyzer at construction.
    pub fn warnings(&self) -> &[String] {
        &self.site.warnings
    }
}

impl fmt::Display for SiteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.site.header)
    }
}

impl fmt::Debug for SiteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteHandle")
            .field("header", &self.site.header)
            .finish_non_exhaustive()
    }
}

/// Error aborting site construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An input molecule is already bound to another site.
    AlreadyBound {
        /// Header of the site under construction.
        site: String,
        /// Display name of the molecule.
        molecule: String,
    },
    /// The static analyzer rejected the chemistry.
    Analysis {
        /// Header of the site under construction.
        site: String,
        /// The individual errors.
        errors: Vec<AnalysisError>,
    },
    /// A seed reaction did not initialize its static molecules.
    Seed {
        /// Header of the site under construction.
        site: String,
        /// The specific violation.
        detail: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBound { site, molecule } => write!(
                f,
                "In {}: molecule {} cannot be consumed here because it is already bound to another reaction site",
                site, molecule
            ),
            Self::Analysis { site, errors } => {
                let rendered: Vec<String> = errors
                    .iter()
                    .map(|error| format!("In {}: {}", site, error))
                    .collect();
                write!(f, "{}", rendered.join("; "))
            }
            Self::Seed { site, detail } => write!(
                f,
                "In {}: Incorrect static molecule declaration: {}",
                site, detail
            ),
        }
    }
}

impl Error for ConfigError {}
