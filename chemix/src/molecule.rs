//! Molecule emitters and the values they place into reaction-site bags.
//!
//! An emitter is a cheap clonable handle identifying one message kind. A
//! non-blocking [`Molecule`] simply deposits a value; a [`BlockingMolecule`]
//! additionally suspends the emitting thread until a consuming reaction
//! replies. Emitters are created unbound and become bound to exactly one
//! [site](crate::site) when that site is constructed from the reactions that
//! consume them; the binding holds a weak site back-pointer so that the
//! chemistry graph stays free of ownership cycles.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use crate::pattern::const_display;
use crate::reply::{ReplyCore, ReplyReceiver, ReplyStatus};
use crate::site::ReactionSite;

/// Unique identifier for emitters.
static NEXT_MOLECULE_ID: AtomicU64 = AtomicU64::new(0);

/// Bound on the values a molecule can carry.
///
/// This is a blanket trait: any `'static` value that is `Clone`, `Debug` and
/// `Send` qualifies. `Clone` enables input re-emission on retry and volatile
/// reads of static molecules; `Debug` gives values a rendering in soup dumps
/// and error messages.
pub trait Payload: Any + Clone + fmt::Debug + Send {}
impl<T> Payload for T where T: Any + Clone + fmt::Debug + Send {}

/// Discriminates non-blocking from blocking emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MoleculeKind {
    NonBlocking,
    Blocking,
}

/// Binding of an emitter to the site that consumes it.
pub(crate) struct Binding {
    pub(crate) site: Weak<ReactionSite>,
    pub(crate) index: usize,
}

/// Data shared by all clones of one emitter.
pub(crate) struct MoleculeCore {
    id: u64,
    name: String,
    kind: MoleculeKind,
    binding: OnceLock<Binding>,
}

impl MoleculeCore {
    fn new(name: String, kind: MoleculeKind) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_MOLECULE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            kind,
            binding: OnceLock::new(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> MoleculeKind {
        self.kind
    }

    /// Display name; blocking emitters carry a `/B` marker.
    pub(crate) fn display_name(&self) -> String {
        match self.kind {
            MoleculeKind::NonBlocking => self.name.clone(),
            MoleculeKind::Blocking => format!("{}/B", self.name),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Binds this emitter to a site; at most one binding can ever succeed.
    pub(crate) fn bind(&self, site: Weak<ReactionSite>, index: usize) -> Result<(), ()> {
        self.binding.set(Binding { site, index }).map_err(|_| ())
    }

    /// Resolves the owning site, or fails with the unbound-molecule error.
    pub(crate) fn bound_site(&self) -> Result<(Arc<ReactionSite>, usize), EmitError> {
        let binding = self.binding.get().ok_or_else(|| self.unbound())?;
        let site = binding.site.upgrade().ok_or_else(|| self.unbound())?;
        Ok((site, binding.index))
    }

    fn unbound(&self) -> EmitError {
        EmitError::Unbound {
            molecule: self.display_name(),
        }
    }
}

impl fmt::Debug for MoleculeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoleculeCore")
            .field("name", &self.display_name())
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

/// A non-blocking emitter for values of type `T`.
///
/// Cloning is cheap; all clones refer to the same molecule. Emitting returns
/// as soon as the value has been added to the owning site's bag and a
/// scheduling pass has been requested.
pub struct Molecule<T: Payload> {
    core: Arc<MoleculeCore>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Payload> Molecule<T> {
    /// Creates a new, unbound emitter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: MoleculeCore::new(name.into(), MoleculeKind::NonBlocking),
            _marker: PhantomData,
        }
    }

    /// Returns the molecule name.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Emits one value into the owning site's bag.
    ///
    /// # Errors
    ///
    /// Fails if the molecule is unbound (or its site was dropped), if the
    /// site still references unbound output molecules, or if this molecule is
    /// static and the calling thread does not run one of its reactions.
    pub fn emit(&self, value: T) -> Result<(), EmitError> {
        let (site, index) = self.core.bound_site()?;
        site.emit_nonblocking(index, Instance::plain(value))
    }

    /// Returns the last value a reaction emitted for this static molecule.
    ///
    /// # Errors
    ///
    /// Fails if the molecule is unbound or is not static.
    pub fn volatile_value(&self) -> Result<T, EmitError> {
        let (site, index) = self.core.bound_site()?;
        site.volatile_value::<T>(index)
    }

    /// Whether this molecule was identified as static by its site.
    ///
    /// # Errors
    ///
    /// Fails if the molecule is unbound.
    pub fn is_static(&self) -> Result<bool, EmitError> {
        let (site, index) = self.core.bound_site()?;
        Ok(site.is_static(index))
    }

    /// Renders the current contents of the owning site's bag.
    pub fn log_soup(&self) -> Result<String, EmitError> {
        let (site, _) = self.core.bound_site()?;
        Ok(site.log_soup())
    }

    pub(crate) fn core(&self) -> &Arc<MoleculeCore> {
        &self.core
    }
}

impl<T: Payload> Clone for Molecule<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Payload> fmt::Debug for Molecule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Molecule")
            .field("name", &self.core.name())
            .field("bound", &self.core.is_bound())
            .finish_non_exhaustive()
    }
}

impl<T: Payload> fmt::Display for Molecule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.core.display_name())
    }
}

/// A blocking emitter carrying requests of type `T` and replies of type `R`.
///
/// Emitting suspends the calling thread until a consuming reaction replies
/// through the [`ReplyToken`](crate::reply::ReplyToken) it received along
/// with the value, or until the optional timeout elapses.
pub struct BlockingMolecule<T: Payload, R: Send + 'static> {
    core: Arc<MoleculeCore>,
    _marker: PhantomData<fn(T, R) -> (T, R)>,
}

impl<T: Payload, R: Send + 'static> BlockingMolecule<T, R> {
    /// Creates a new, unbound blocking emitter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: MoleculeCore::new(name.into(), MoleculeKind::Blocking),
            _marker: PhantomData,
        }
    }

    /// Returns the molecule name, without the `/B` marker.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Emits one value and blocks until a reaction replies.
    ///
    /// # Errors
    ///
    /// Fails like [`Molecule::emit`], and additionally when the consuming
    /// reaction finishes without a valid reply.
    pub fn emit_blocking(&self, value: T) -> Result<R, EmitError> {
        let (site, index) = self.core.bound_site()?;
        let core = ReplyCore::new();
        let receiver = ReplyReceiver::new(core.clone());
        let reply = site.emit_blocking(index, Instance::blocking(value, core), receiver, None)?;
        // A wait without deadline can only resolve with a reply or an error.
        Ok(reply.unwrap())
    }

    /// Emits one value and blocks until a reaction replies or the timeout
    /// elapses.
    ///
    /// On timeout, returns `Ok(None)` and removes the value from the bag if
    /// no reaction has consumed it yet.
    pub fn emit_blocking_timeout(
        &self,
        value: T,
        timeout: Duration,
    ) -> Result<Option<R>, EmitError> {
        let (site, index) = self.core.bound_site()?;
        let core = ReplyCore::new();
        let receiver = ReplyReceiver::new(core.clone());
        site.emit_blocking(index, Instance::blocking(value, core), receiver, Some(timeout))
    }

    /// Renders the current contents of the owning site's bag.
    pub fn log_soup(&self) -> Result<String, EmitError> {
        let (site, _) = self.core.bound_site()?;
        Ok(site.log_soup())
    }

    pub(crate) fn core(&self) -> &Arc<MoleculeCore> {
        &self.core
    }
}

impl<T: Payload, R: Send + 'static> Clone for BlockingMolecule<T, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Payload, R: Send + 'static> fmt::Debug for BlockingMolecule<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingMolecule")
            .field("name", &self.core.name())
            .field("bound", &self.core.is_bound())
            .finish_non_exhaustive()
    }
}

impl<T: Payload, R: Send + 'static> fmt::Display for BlockingMolecule<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.core.display_name())
    }
}

/// Type-erased reply handles carried by a blocking value.
#[derive(Clone)]
pub(crate) struct ReplyHandleErased {
    /// Status view used by the reaction completion hook.
    pub(crate) status: Arc<dyn ReplyStatus>,
    /// The typed `Arc<ReplyCore<R>>`, recovered when the body takes the value.
    pub(crate) core: Arc<dyn Any + Send + Sync>,
}

/// One value held in a bag: the erased payload plus the vtable needed to
/// render and clone it, and the reply handles for blocking values.
pub(crate) struct Instance {
    payload: Box<dyn Any + Send>,
    debug_fn: fn(&dyn Any) -> String,
    clone_fn: fn(&dyn Any) -> Box<dyn Any + Send>,
    reply: Option<ReplyHandleErased>,
}

impl Instance {
    pub(crate) fn plain<T: Payload>(value: T) -> Self {
        Self {
            payload: Box::new(value),
            debug_fn: debug_erased::<T>,
            clone_fn: clone_erased::<T>,
            reply: None,
        }
    }

    pub(crate) fn blocking<T: Payload, R: Send + 'static>(
        value: T,
        core: Arc<ReplyCore<R>>,
    ) -> Self {
        Self {
            payload: Box::new(value),
            debug_fn: debug_erased::<T>,
            clone_fn: clone_erased::<T>,
            reply: Some(ReplyHandleErased {
                status: core.clone(),
                core,
            }),
        }
    }

    pub(crate) fn payload_ref(&self) -> &dyn Any {
        self.payload.as_ref()
    }

    /// Renders the payload; the unit value renders empty.
    pub(crate) fn display(&self) -> String {
        (self.debug_fn)(self.payload.as_ref())
    }

    pub(crate) fn reply_status(&self) -> Option<Arc<dyn ReplyStatus>> {
        self.reply.as_ref().map(|handle| handle.status.clone())
    }

    pub(crate) fn clone_payload(&self) -> Box<dyn Any + Send> {
        (self.clone_fn)(self.payload.as_ref())
    }

    /// Clones this value for re-emission; blocking values keep their original
    /// reply slot.
    pub(crate) fn snapshot(&self) -> Instance {
        Instance {
            payload: (self.clone_fn)(self.payload.as_ref()),
            debug_fn: self.debug_fn,
            clone_fn: self.clone_fn,
            reply: self.reply.clone(),
        }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn Any + Send>, Option<ReplyHandleErased>) {
        (self.payload, self.reply)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("payload", &self.display())
            .field("blocking", &self.reply.is_some())
            .finish_non_exhaustive()
    }
}

fn debug_erased<T: Payload>(value: &dyn Any) -> String {
    match value.downcast_ref::<T>() {
        Some(value) => const_display(value),
        None => "?".to_string(),
    }
}

fn clone_erased<T: Payload>(value: &dyn Any) -> Box<dyn Any + Send> {
    Box::new(
        value
            .downcast_ref::<T>()
            .expect("payload type invariant violated")
            .clone(),
    )
}

/// Error raised by an emit entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The molecule has never been bound, or its site was dropped.
    Unbound {
        /// Display name of the molecule.
        molecule: String,
    },
    /// A static-molecule protocol violation.
    StaticProtocol {
        /// Header of the owning site.
        site: String,
        /// The specific refusal.
        detail: String,
    },
    /// Some output molecules of the site's reactions are still unbound.
    UnboundOutputs {
        /// Header of the owning site.
        site: String,
        /// Display names of the unbound outputs.
        molecules: Vec<String>,
    },
    /// The molecule is not static and carries no volatile value.
    NotStatic {
        /// Header of the owning site.
        site: String,
        /// Display name of the molecule.
        molecule: String,
    },
    /// A blocking emission was unblocked by a failure of the consuming
    /// reaction.
    ReplyFailed {
        /// The failure message recorded by the completion hook.
        detail: String,
    },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound { molecule } => {
                write!(f, "Molecule {} is not bound to any reaction site", molecule)
            }
            Self::StaticProtocol { site, detail } => write!(f, "In {}: {}", site, detail),
            Self::UnboundOutputs { site, molecules } => write!(
                f,
                "In {}: Some output molecules ({}) are not bound to any reaction site",
                site,
                molecules.join(", ")
            ),
            Self::NotStatic { site, molecule } => write!(
                f,
                "In {}: molecule {} is not static and has no volatile value",
                site, molecule
            ),
            Self::ReplyFailed { detail } => write!(f, "{}", detail),
        }
    }
}

impl Error for EmitError {}
