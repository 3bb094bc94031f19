//! A counter driven by non-blocking decrements with a blocking read-out.

use std::thread;
use std::time::Duration;

use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::{SiteHandle, SiteInit};

fn counter_site(
    pool: &ThreadPool,
) -> (SiteHandle, Molecule<i32>, Molecule<()>, BlockingMolecule<(), i32>) {
    let c = Molecule::<i32>::new("c");
    let d = Molecule::<()>::new("d");
    let g = BlockingMolecule::<(), i32>::new("g");

    let c_out = c.clone();
    let decrement = Reaction::builder()
        .consume(&c, Pattern::bind("n"))
        .consume(&d, Pattern::any())
        .emits(&c)
        .run(move |inputs| {
            let n: i32 = inputs.take(0);
            c_out.emit(n - 1)?;
            Ok(())
        });

    let read_out = Reaction::builder()
        .consume(&c, Pattern::eq(0))
        .consume_blocking(&g, Pattern::any())
        .run(|inputs| {
            let ((), reply) = inputs.take_blocking::<(), i32>(1);
            reply.reply(0);
            Ok(())
        });

    let site = SiteInit::new(pool.clone())
        .reaction(decrement)
        .reaction(read_out)
        .init()
        .unwrap();

    (site, c, d, g)
}

#[test]
fn counter_reaches_zero() {
    let pool = ThreadPool::new("counter", 4);
    let (_site, c, d, g) = counter_site(&pool);

    c.emit(2).unwrap();
    d.emit(()).unwrap();
    d.emit(()).unwrap();

    assert_eq!(
        g.emit_blocking_timeout((), Duration::from_secs(1)).unwrap(),
        Some(0)
    );

    assert!(pool.shutdown(Duration::from_secs(1)));
}

#[test]
fn counter_under_concurrent_decrements() {
    const DECREMENTS: i32 = 100;

    let pool = ThreadPool::new("counter-mt", 4);
    let (_site, c, d, g) = counter_site(&pool);

    c.emit(DECREMENTS).unwrap();

    let emitters: Vec<_> = (0..4)
        .map(|_| {
            let d = d.clone();
            thread::spawn(move || {
                for _ in 0..(DECREMENTS / 4) {
                    d.emit(()).unwrap();
                }
            })
        })
        .collect();
    for emitter in emitters {
        emitter.join().unwrap();
    }

    assert_eq!(
        g.emit_blocking_timeout((), Duration::from_secs(5)).unwrap(),
        Some(0)
    );

    assert!(pool.shutdown(Duration::from_secs(1)));
}
