//! A join-calculus concurrency engine.
//!
//! Chemix expresses concurrent computation as *chemistry*: typed messages
//! (molecules) accumulate in the bag of a reaction site, and *reactions*
//! declaratively consume multisets of them, run a body, and emit further
//! molecules. The scheduler fires a reaction automatically whenever the bag
//! satisfies its input patterns, so no manual thread coordination is ever
//! written: the chemistry *is* the synchronization.
//!
//! The model follows the join calculus of Fournet and Gonthier. Three ideas
//! carry all of it:
//!
//! * **Molecules** are typed, named message kinds. A non-blocking
//!   [`Molecule`](molecule::Molecule) just deposits a value; a
//!   [`BlockingMolecule`](molecule::BlockingMolecule) suspends its emitter
//!   until some reaction replies, which turns a message exchange into a
//!   synchronous call.
//! * **Reactions** declare the multiset of molecules they consume, with
//!   per-value [patterns](pattern::Pattern) and optional cross-molecule
//!   guards, and a body run on a thread pool once the inputs are committed.
//! * **Reaction sites** own the bag and the scheduling decision. A site is
//!   built once, from the reactions that consume its molecules, and analyzes
//!   the declared chemistry before anything runs: pattern shadowing,
//!   unavoidable livelock and static-molecule violations are construction
//!   errors, not runtime surprises.
//!
//! # Example: a concurrent counter
//!
//! A counter with a blocking read-out. `c` carries the count, `d` decrements
//! it, and `g` reads it once it reaches zero:
//!
//! ```
//! use std::time::Duration;
//!
//! use chemix::executor::ThreadPool;
//! use chemix::molecule::{BlockingMolecule, Molecule};
//! use chemix::pattern::Pattern;
//! use chemix::reaction::Reaction;
//! use chemix::site::SiteInit;
//!
//! let pool = ThreadPool::new("counter", 4);
//!
//! let c = Molecule::<i32>::new("c");
//! let d = Molecule::<()>::new("d");
//! let g = BlockingMolecule::<(), i32>::new("g");
//!
//! let c_out = c.clone();
//! let decrement = Reaction::builder()
//!     .consume(&c, Pattern::bind("n"))
//!     .consume(&d, Pattern::any())
//!     .emits(&c)
//!     .run(move |inputs| {
//!         let n: i32 = inputs.take(0);
//!         c_out.emit(n - 1)?;
//!         Ok(())
//!     });
//!
//! let read_out = Reaction::builder()
//!     .consume(&c, Pattern::eq(0))
//!     .consume_blocking(&g, Pattern::any())
//!     .run(|inputs| {
//!         let ((), reply) = inputs.take_blocking::<(), i32>(1);
//!         reply.reply(0);
//!         Ok(())
//!     });
//!
//! let _site = SiteInit::new(pool.clone())
//!     .reaction(decrement)
//!     .reaction(read_out)
//!     .init()?;
//!
//! c.emit(2)?;
//! d.emit(())?;
//! d.emit(())?;
//!
//! let count = g.emit_blocking_timeout((), Duration::from_secs(1))?;
//! assert_eq!(count, Some(0));
//!
//! pool.shutdown(Duration::from_secs(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Scheduling model
//!
//! Each site serializes its scheduling decisions behind one lock: bag
//! mutation, candidate matching and the atomic removal of a chosen input
//! multiset never interleave. Everything else is parallel — reaction bodies
//! run on [thread pools](executor::ThreadPool), concurrently with each other
//! and with emissions, and no ordering exists across sites. An emission
//! strictly happens-before any scheduling decision that observes it.
//!
//! Matching is combinatorial where it has to be: reactions consuming several
//! copies of one molecule, or constrained by cross-molecule guards, trigger a
//! backtracking search over the candidate values; everything else uses a
//! greedy linear pass.
//!
//! # Static molecules
//!
//! A reaction declared without inputs is a *seed*: it runs exactly once at
//! site construction and its guaranteed outputs become *static* molecules —
//! molecules whose count is invariant: each consuming reaction must re-emit
//! them exactly once, only reactions of the owning site may emit them, and
//! their last value stays readable without consuming anything through
//! [`volatile_value`](molecule::Molecule::volatile_value).
//!
//! # Errors
//!
//! Construction problems ([`ConfigError`](site::ConfigError)) are returned
//! synchronously from [`SiteInit::init`](site::SiteInit::init). Emission
//! problems ([`EmitError`](molecule::EmitError)) are returned from the emit
//! call. Failures inside reaction bodies never propagate synchronously:
//! they reach the blocking waiter through its reply slot, when one exists,
//! and are appended to the site's [`ErrorLog`](error_log::ErrorLog) in all
//! cases.

#![warn(missing_docs, missing_debug_implementations)]

pub mod error_log;
pub mod executor;
pub mod molecule;
pub mod pattern;
pub mod reaction;
pub mod reply;
pub mod site;
