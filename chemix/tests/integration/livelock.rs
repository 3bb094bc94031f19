//! Construction-time refusal of chemistry that cannot help but spin.

use chemix::executor::ThreadPool;
use chemix::molecule::{EmitError, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::SiteInit;

#[test]
fn unavoidable_livelock_aborts_construction() {
    let pool = ThreadPool::new("livelock", 2);

    let a = Molecule::<()>::new("a");
    let c = Molecule::<i32>::new("c");

    // Reproduces its own inputs unconditionally: a(_) matches the emitted
    // a(), and the guard x > 0 admits the emitted c(1).
    let spinner = Reaction::builder()
        .consume(&a, Pattern::any())
        .consume(&c, Pattern::bind_if("x", |x: &i32| *x > 0))
        .emits_value(&c, 1)
        .emits_value(&a, ())
        .run(|_| Ok(()));

    let c_seed = c.clone();
    let seed = Reaction::builder()
        .emits_value(&c, 0)
        .run(move |_| {
            c_seed.emit(0)?;
            Ok(())
        });

    let error = SiteInit::new(pool.clone())
        .reaction(spinner)
        .reaction(seed)
        .init()
        .unwrap_err();
    assert!(error
        .to_string()
        .contains("Unavoidable livelock: reaction {a(_) + c(x if ?) => c(1) + a()}"));

    // Analysis precedes binding, so the molecules stay unbound.
    assert_eq!(
        a.emit(()),
        Err(EmitError::Unbound {
            molecule: "a".into()
        })
    );
}

#[test]
fn a_guard_downgrades_the_livelock_to_a_warning() {
    let pool = ThreadPool::new("livelock-warn", 2);

    let a = Molecule::<i32>::new("a");

    let a_out = a.clone();
    let spinner = Reaction::builder()
        .consume(&a, Pattern::bind("x"))
        .emits(&a)
        .when(|| false)
        .run(move |inputs| {
            let x: i32 = inputs.take(0);
            a_out.emit(x)?;
            Ok(())
        });

    let site = SiteInit::new(pool.clone()).reaction(spinner).init().unwrap();
    assert!(site
        .warnings()
        .iter()
        .any(|warning| warning.contains("Possible livelock: reaction {a(x) => a(?)}")));
}
