//! Static-molecule discipline: seeding, protected emission, volatile reads.

use std::time::Duration;

use chemix::error_log::ErrorLog;
use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, EmitError, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::SiteInit;

#[test]
fn user_threads_cannot_emit_a_static_molecule() {
    let pool = ThreadPool::new("static", 2);

    let c = BlockingMolecule::<(), String>::new("c");
    let d = Molecule::<String>::new("d");

    let d_serve = d.clone();
    let serve = Reaction::builder()
        .consume_blocking(&c, Pattern::any())
        .consume(&d, Pattern::bind("text"))
        .emits(&d)
        .run(move |inputs| {
            let ((), reply) = inputs.take_blocking::<(), String>(0);
            let text: String = inputs.take(1);
            d_serve.emit(text.clone())?;
            reply.reply(text);
            Ok(())
        });

    let d_seed = d.clone();
    let seed = Reaction::builder()
        .emits_value(&d, "ok".to_string())
        .run(move |_| {
            d_seed.emit("ok".to_string())?;
            Ok(())
        });

    let site = SiteInit::new(pool.clone())
        .reaction(serve)
        .reaction(seed)
        .init()
        .unwrap();

    // The seed ran at construction: the static molecule is present and
    // readable without consuming it.
    assert!(site.log_soup().contains("Molecules: d(ok)"));
    assert!(d.is_static().unwrap());
    assert_eq!(d.volatile_value().unwrap(), "ok");

    // Emission from a thread that runs no reaction of this site is refused.
    let refusal = d.emit("bad".to_string()).unwrap_err();
    assert!(matches!(refusal, EmitError::StaticProtocol { .. }));
    assert!(refusal.to_string().contains(
        "Refusing to emit static molecule d(bad) because this thread does not run a chemical reaction"
    ));

    // The chemistry keeps working, and the static count is invariant.
    assert_eq!(
        c.emit_blocking_timeout((), Duration::from_secs(1)).unwrap(),
        Some("ok".to_string())
    );
    assert_eq!(
        c.emit_blocking_timeout((), Duration::from_secs(1)).unwrap(),
        Some("ok".to_string())
    );
    assert!(site.log_soup().contains("Molecules: d(ok)"));
}

#[test]
fn a_reaction_cannot_emit_a_static_molecule_twice() {
    let pool = ThreadPool::new("static-twice", 2);
    let log = ErrorLog::new();

    let t = Molecule::<()>::new("t");
    let d = Molecule::<i32>::new("d");

    let d_out = d.clone();
    let doubler = Reaction::builder()
        .consume(&t, Pattern::any())
        .consume(&d, Pattern::bind("x"))
        .emits(&d)
        .run(move |inputs| {
            let x: i32 = inputs.take(1);
            d_out.emit(x)?;
            // The second emission violates the static protocol and fails the
            // body.
            d_out.emit(x)?;
            Ok(())
        });

    let d_seed = d.clone();
    let seed = Reaction::builder()
        .emits_value(&d, 1)
        .run(move |_| {
            d_seed.emit(1)?;
            Ok(())
        });

    let _site = SiteInit::new(pool.clone())
        .reaction(doubler)
        .reaction(seed)
        .error_log(log.clone())
        .init()
        .unwrap();

    t.emit(()).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while log.is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0]
        .message
        .contains("because this reaction has already emitted it"));
}

#[test]
fn a_seed_must_emit_its_declared_molecules() {
    let pool = ThreadPool::new("static-missing", 2);

    let d = Molecule::<i32>::new("d");

    let keeper = Reaction::builder()
        .consume(&d, Pattern::bind("x"))
        .emits(&d)
        .run(|_| Ok(()));
    // Declares d as static but never emits it.
    let seed = Reaction::builder().emits_value(&d, 1).run(|_| Ok(()));

    let error = SiteInit::new(pool.clone())
        .reaction(keeper)
        .reaction(seed)
        .init()
        .unwrap_err();
    assert!(error
        .to_string()
        .contains("finished without emitting static molecule d"));
}
