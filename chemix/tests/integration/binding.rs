//! Binding lifecycle: unbound emitters, rebinding, unbound outputs.

use chemix::executor::ThreadPool;
use chemix::molecule::{EmitError, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::{ConfigError, SiteInit};

#[test]
fn rebinding_a_molecule_is_refused() {
    let pool = ThreadPool::new("rebind", 2);

    let a = Molecule::<i32>::new("a");

    let first = SiteInit::new(pool.clone())
        .reaction(
            Reaction::builder()
                .consume(&a, Pattern::bind("x"))
                .run(|_| Ok(())),
        )
        .init();
    assert!(first.is_ok());

    let second = SiteInit::new(pool.clone())
        .reaction(
            Reaction::builder()
                .consume(&a, Pattern::eq(1))
                .run(|_| Ok(())),
        )
        .init();
    match second {
        Err(ConfigError::AlreadyBound { molecule, .. }) => assert_eq!(molecule, "a"),
        other => panic!("expected a rebinding error, got {:?}", other),
    }
}

#[test]
fn emission_requires_all_outputs_bound() {
    let pool = ThreadPool::new("outputs", 2);

    let t = Molecule::<()>::new("t");
    let x = Molecule::<i32>::new("x");

    let x_out = x.clone();
    let forward = Reaction::builder()
        .consume(&t, Pattern::any())
        .emits(&x)
        .run(move |_| {
            x_out.emit(1)?;
            Ok(())
        });

    let _site = SiteInit::new(pool.clone()).reaction(forward).init().unwrap();

    // `x` is not consumed anywhere yet.
    let error = t.emit(()).unwrap_err();
    match &error {
        EmitError::UnboundOutputs { molecules, .. } => {
            assert_eq!(molecules, &vec!["x".to_string()])
        }
        other => panic!("expected an unbound-outputs error, got {:?}", other),
    }
    assert!(error
        .to_string()
        .contains("Some output molecules (x) are not bound to any reaction site"));

    // Binding `x` through a second site clears the check.
    let _sink = SiteInit::new(pool.clone())
        .reaction(
            Reaction::builder()
                .consume(&x, Pattern::bind("v"))
                .run(|_| Ok(())),
        )
        .init()
        .unwrap();
    assert!(t.emit(()).is_ok());
}

#[test]
fn dropping_the_site_handle_unbinds_the_chemistry() {
    let pool = ThreadPool::new("drop", 2);

    let a = Molecule::<i32>::new("a");

    let site = SiteInit::new(pool.clone())
        .reaction(
            Reaction::builder()
                .consume(&a, Pattern::bind("x"))
                .run(|_| Ok(())),
        )
        .init()
        .unwrap();

    assert!(a.emit(1).is_ok());

    // Drain the in-flight scheduling work so the handle holds the only
    // strong reference, then drop it.
    assert!(pool.shutdown(std::time::Duration::from_secs(1)));
    drop(site);

    assert_eq!(
        a.emit(2),
        Err(EmitError::Unbound {
            molecule: "a".into()
        })
    );
}
