//! Readers/writer exclusion expressed as chemistry: a `count` molecule holds
//! the number of active readers and disappears entirely while the writer is
//! in its critical section.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::SiteInit;

const MAX_READERS: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    ReaderAcquired(String),
    ReaderReleased(String),
    WriterAcquired,
    WriterReleased,
}

#[test]
fn readers_and_writer_alternate_correctly() {
    const ROUNDS: usize = 20;

    let pool = ThreadPool::new("rw", 4);
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));

    let count = Molecule::<i32>::new("count");
    let r_acq = BlockingMolecule::<String, ()>::new("r_acq");
    let r_rel = BlockingMolecule::<String, ()>::new("r_rel");
    let w_acq = BlockingMolecule::<(), ()>::new("w_acq");
    let w_rel = BlockingMolecule::<(), ()>::new("w_rel");

    let count_up = count.clone();
    let log = events.clone();
    let reader_acquire = Reaction::builder()
        .consume(&count, Pattern::bind_if("n", |n: &i32| *n < MAX_READERS))
        .consume_blocking(&r_acq, Pattern::bind("name"))
        .emits(&count)
        .run(move |inputs| {
            let n: i32 = inputs.take(0);
            let (name, reply) = inputs.take_blocking::<String, ()>(1);
            log.lock().unwrap().push(Event::ReaderAcquired(name));
            count_up.emit(n + 1)?;
            reply.reply(());
            Ok(())
        });

    let count_down = count.clone();
    let log = events.clone();
    let reader_release = Reaction::builder()
        .consume(&count, Pattern::bind_if("n", |n: &i32| *n > 0))
        .consume_blocking(&r_rel, Pattern::bind("name"))
        .emits(&count)
        .run(move |inputs| {
            let n: i32 = inputs.take(0);
            let (name, reply) = inputs.take_blocking::<String, ()>(1);
            log.lock().unwrap().push(Event::ReaderReleased(name));
            count_down.emit(n - 1)?;
            reply.reply(());
            Ok(())
        });

    // The writer takes `count` out of the soup entirely, so no reader can
    // acquire until the release re-emits it.
    let log = events.clone();
    let writer_acquire = Reaction::builder()
        .consume(&count, Pattern::eq(0))
        .consume_blocking(&w_acq, Pattern::any())
        .run(move |inputs| {
            let ((), reply) = inputs.take_blocking::<(), ()>(1);
            log.lock().unwrap().push(Event::WriterAcquired);
            reply.reply(());
            Ok(())
        });

    let count_back = count.clone();
    let log = events.clone();
    let writer_release = Reaction::builder()
        .consume_blocking(&w_rel, Pattern::any())
        .emits(&count)
        .run(move |inputs| {
            let ((), reply) = inputs.take_blocking::<(), ()>(0);
            log.lock().unwrap().push(Event::WriterReleased);
            count_back.emit(0)?;
            reply.reply(());
            Ok(())
        });

    let _site = SiteInit::new(pool.clone())
        .reaction(reader_acquire)
        .reaction(reader_release)
        .reaction(writer_acquire)
        .reaction(writer_release)
        .init()
        .unwrap();

    count.emit(0).unwrap();

    let writer = {
        let w_acq = w_acq.clone();
        let w_rel = w_rel.clone();
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                w_acq.emit_blocking(()).unwrap();
                w_rel.emit_blocking(()).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..MAX_READERS)
        .map(|reader| {
            let r_acq = r_acq.clone();
            let r_rel = r_rel.clone();
            let name = format!("r{}", reader);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    r_acq.emit_blocking(name.clone()).unwrap();
                    r_rel.emit_blocking(name.clone()).unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let events = events.lock().unwrap();

    // Acquisitions and releases balance overall.
    let acquired = events
        .iter()
        .filter(|event| {
            matches!(event, Event::ReaderAcquired(_) | Event::WriterAcquired)
        })
        .count();
    let released = events
        .iter()
        .filter(|event| {
            matches!(event, Event::ReaderReleased(_) | Event::WriterReleased)
        })
        .count();
    assert_eq!(acquired, released);

    // The writer's acquisitions and releases alternate strictly.
    let mut writer_active = false;
    for event in events.iter() {
        match event {
            Event::WriterAcquired => {
                assert!(!writer_active, "writer acquired twice in a row");
                writer_active = true;
            }
            Event::WriterReleased => {
                assert!(writer_active, "writer released without acquiring");
                writer_active = false;
            }
            // No reader acquisition appears inside a writer critical section.
            Event::ReaderAcquired(name) => {
                assert!(
                    !writer_active,
                    "reader {} acquired while the writer held access",
                    name
                );
            }
            Event::ReaderReleased(_) => {}
        }
    }
    assert!(!writer_active);

    // Each named reader's acquisitions and releases alternate strictly.
    for reader in 0..MAX_READERS {
        let name = format!("r{}", reader);
        let mut holding = false;
        for event in events.iter() {
            match event {
                Event::ReaderAcquired(acquired) if *acquired == name => {
                    assert!(!holding, "reader {} acquired twice in a row", name);
                    holding = true;
                }
                Event::ReaderReleased(released) if *released == name => {
                    assert!(holding, "reader {} released without acquiring", name);
                    holding = false;
                }
                _ => {}
            }
        }
        assert!(!holding);
    }

    assert!(pool.shutdown(Duration::from_secs(1)));
}
