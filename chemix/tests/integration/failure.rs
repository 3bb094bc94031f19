//! Reaction-body failures: reply verification, error logging, retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chemix::error_log::ErrorLog;
use chemix::executor::ThreadPool;
use chemix::molecule::{BlockingMolecule, EmitError, Molecule};
use chemix::pattern::Pattern;
use chemix::reaction::Reaction;
use chemix::site::SiteInit;

#[test]
fn a_missing_reply_unblocks_the_waiter_with_an_error() {
    let pool = ThreadPool::new("no-reply", 2);
    let log = ErrorLog::new();

    let g = BlockingMolecule::<(), i32>::new("g");
    let m = Molecule::<()>::new("m");

    // Consumes the blocking molecule but never replies.
    let silent = Reaction::builder()
        .consume_blocking(&g, Pattern::any())
        .consume(&m, Pattern::any())
        .run(|_| Ok(()));

    let _site = SiteInit::new(pool.clone())
        .reaction(silent)
        .error_log(log.clone())
        .init()
        .unwrap();

    m.emit(()).unwrap();
    let error = g.emit_blocking(()).unwrap_err();

    assert!(matches!(error, EmitError::ReplyFailed { .. }));
    assert!(error
        .to_string()
        .contains("finished without replying to g/B"));

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("finished without replying"));
}

#[test]
fn a_panicking_body_unblocks_the_waiter_and_is_logged() {
    let pool = ThreadPool::new("panic", 2);
    let log = ErrorLog::new();

    let g = BlockingMolecule::<(), i32>::new("g");
    let m = Molecule::<()>::new("m");

    let explosive = Reaction::builder()
        .consume_blocking(&g, Pattern::any())
        .consume(&m, Pattern::any())
        .run(|_| panic!("deliberate"));

    let _site = SiteInit::new(pool.clone())
        .reaction(explosive)
        .error_log(log.clone())
        .init()
        .unwrap();

    m.emit(()).unwrap();
    let error = g.emit_blocking(()).unwrap_err();

    assert!(error.to_string().contains("deliberate"));
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn retry_re_emits_the_inputs_until_the_body_succeeds() {
    let pool = ThreadPool::new("retry", 2);
    let log = ErrorLog::new();

    let g = BlockingMolecule::<i32, i32>::new("g");
    let attempts = Arc::new(AtomicUsize::new(0));

    let seen = attempts.clone();
    let flaky = Reaction::builder()
        .consume_blocking(&g, Pattern::bind("x"))
        .retry()
        .run(move |inputs| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err("flaky".into());
            }
            let (x, reply) = inputs.take_blocking::<i32, i32>(0);
            reply.reply(x + 1);
            Ok(())
        });

    let _site = SiteInit::new(pool.clone())
        .reaction(flaky)
        .error_log(log.clone())
        .init()
        .unwrap();

    assert_eq!(
        g.emit_blocking_timeout(4, Duration::from_secs(5)).unwrap(),
        Some(5)
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // Transient failures are not user-visible errors.
    assert!(log.is_empty());
}
