//! Timeouts on blocking emissions and their effect on the bag.

use std::time::Duration;

use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::reply::ReplyToken;
use chemix::site::SiteInit;

#[test]
fn a_timed_out_molecule_is_removed_from_the_bag() {
    let pool = ThreadPool::new("timeout", 2);

    let f = BlockingMolecule::<(), ()>::new("f");
    let m = Molecule::<()>::new("m");

    // The partner molecule `m` is never emitted, so `f` cannot react.
    let pair = Reaction::builder()
        .consume_blocking(&f, Pattern::any())
        .consume(&m, Pattern::any())
        .run(|inputs| {
            let ((), reply) = inputs.take_blocking::<(), ()>(0);
            reply.reply(());
            Ok(())
        });

    let site = SiteInit::new(pool.clone()).reaction(pair).init().unwrap();

    let outcome = f
        .emit_blocking_timeout((), Duration::from_millis(100))
        .unwrap();
    assert_eq!(outcome, None);

    let soup = site.log_soup();
    assert!(soup.contains("No molecules"), "soup still holds f: {}", soup);
}

#[test]
fn a_zero_timeout_leaves_the_bag_unchanged() {
    let pool = ThreadPool::new("timeout-zero", 2);

    let f = BlockingMolecule::<(), ()>::new("f");
    let m = Molecule::<()>::new("m");

    let pair = Reaction::builder()
        .consume_blocking(&f, Pattern::any())
        .consume(&m, Pattern::any())
        .run(|inputs| {
            let ((), reply) = inputs.take_blocking::<(), ()>(0);
            reply.reply(());
            Ok(())
        });

    let site = SiteInit::new(pool.clone()).reaction(pair).init().unwrap();

    assert_eq!(f.emit_blocking_timeout((), Duration::ZERO).unwrap(), None);
    assert!(site.log_soup().contains("No molecules"));
}

#[test]
fn a_late_reaction_observes_the_timeout_through_the_checked_reply() {
    let pool = ThreadPool::new("timeout-late", 2);

    let f = BlockingMolecule::<(), ()>::new("f");
    let m = Molecule::<()>::new("m");
    let leftovers = Molecule::<bool>::new("leftovers");

    // Holds the reply token until after the waiter gave up, then reports
    // whether the checked reply was refused.
    let leftovers_out = leftovers.clone();
    let pair = Reaction::builder()
        .consume_blocking(&f, Pattern::any())
        .consume(&m, Pattern::any())
        .emits(&leftovers)
        .run(move |inputs| {
            let ((), reply) = inputs.take_blocking::<(), ()>(0);
            std::thread::sleep(Duration::from_millis(300));
            let refused = match reply.reply_checked(()) {
                Ok(()) => false,
                Err(refused) => {
                    let ((), _token) = refused.into_parts();
                    true
                }
            };
            leftovers_out.emit(refused)?;
            Ok(())
        });
    let sink = Reaction::builder()
        .consume(&leftovers, Pattern::eq(true))
        .run(|_| Ok(()));

    let site = SiteInit::new(pool.clone())
        .reaction(pair)
        .reaction(sink)
        .init()
        .unwrap();

    // Emit the partner first so the reaction starts immediately, then time
    // out long before the body replies.
    m.emit(()).unwrap();
    let outcome = f
        .emit_blocking_timeout((), Duration::from_millis(50))
        .unwrap();
    assert_eq!(outcome, None);

    // The sink consumes `leftovers(true)` only if the body saw the refusal.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if site.log_soup().contains("No molecules") {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!(
        "reaction did not observe the timeout: {}",
        site.log_soup()
    );
}

#[test]
fn replies_win_when_they_beat_the_timeout() {
    let pool = ThreadPool::new("timeout-race", 2);

    let f = BlockingMolecule::<i32, i32>::new("f");
    let m = Molecule::<()>::new("m");

    let pair = Reaction::builder()
        .consume_blocking(&f, Pattern::bind("x"))
        .consume(&m, Pattern::any())
        .run(|inputs| {
            let (x, reply): (i32, ReplyToken<i32>) = inputs.take_blocking(0);
            reply.reply(x * 2);
            Ok(())
        });

    let _site = SiteInit::new(pool.clone()).reaction(pair).init().unwrap();

    m.emit(()).unwrap();
    assert_eq!(
        f.emit_blocking_timeout(21, Duration::from_secs(5)).unwrap(),
        Some(42)
    );
}
