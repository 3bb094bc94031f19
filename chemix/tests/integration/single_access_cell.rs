//! A single-access variable built from a static `val` molecule and blocking
//! `put`/`get` accessors.

use std::thread;

use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::{SiteHandle, SiteInit};

fn cell_site(
    pool: &ThreadPool,
    initial: i32,
) -> (
    SiteHandle,
    Molecule<i32>,
    BlockingMolecule<i32, ()>,
    BlockingMolecule<(), i32>,
) {
    let val = Molecule::<i32>::new("val");
    let put = BlockingMolecule::<i32, ()>::new("put");
    let get = BlockingMolecule::<(), i32>::new("get");

    let val_put = val.clone();
    let put_reaction = Reaction::builder()
        .consume_blocking(&put, Pattern::bind("w"))
        .consume(&val, Pattern::any())
        .emits(&val)
        .run(move |inputs| {
            let (new, reply) = inputs.take_blocking::<i32, ()>(0);
            val_put.emit(new)?;
            reply.reply(());
            Ok(())
        });

    let val_get = val.clone();
    let get_reaction = Reaction::builder()
        .consume_blocking(&get, Pattern::any())
        .consume(&val, Pattern::bind("v"))
        .emits(&val)
        .run(move |inputs| {
            let ((), reply) = inputs.take_blocking::<(), i32>(0);
            let current: i32 = inputs.take(1);
            val_get.emit(current)?;
            reply.reply(current);
            Ok(())
        });

    let val_seed = val.clone();
    let seed = Reaction::builder()
        .emits_value(&val, initial)
        .run(move |_| {
            val_seed.emit(initial)?;
            Ok(())
        });

    let site = SiteInit::new(pool.clone())
        .reaction(put_reaction)
        .reaction(get_reaction)
        .reaction(seed)
        .init()
        .unwrap();

    (site, val, put, get)
}

#[test]
fn get_returns_the_initial_then_the_put_value() {
    let pool = ThreadPool::new("cell", 4);
    let (_site, val, put, get) = cell_site(&pool, 7);

    assert_eq!(get.emit_blocking(()).unwrap(), 7);
    put.emit_blocking(42).unwrap();
    assert_eq!(get.emit_blocking(()).unwrap(), 42);
    assert_eq!(val.volatile_value().unwrap(), 42);
}

#[test]
fn concurrent_access_never_loses_the_value() {
    const ROUNDS: i32 = 50;

    let pool = ThreadPool::new("cell-mt", 4);
    let (_site, val, put, get) = cell_site(&pool, 0);

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let put = put.clone();
            let get = get.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    put.emit_blocking(worker * ROUNDS + round).unwrap();
                    // The cell always holds a value: a blocking get without a
                    // timeout returning proves `val` was not lost.
                    get.emit_blocking(()).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Once quiescent, the cell holds the last put value, which the volatile
    // reader also observes.
    let last = get.emit_blocking(()).unwrap();
    assert_eq!(val.volatile_value().unwrap(), last);
}
