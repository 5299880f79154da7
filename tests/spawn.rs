// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use talon::Builder;

#[test]
fn spawn_and_join_a_hundred_tasks() {
    let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    rt.block_on(async {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                talon::spawn(async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap()
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
    });

    assert_eq!(counter.load(Ordering::Relaxed), 100);
}

#[test]
fn a_panicking_task_surfaces_through_its_join_handle() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let handle = talon::spawn(async { panic!("boom") }).unwrap();
        let err = handle.await.unwrap_err();
        assert!(!err.is_cancelled());
    });
}

#[test]
fn aborting_a_handle_before_it_polls_again_reports_cancelled() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let (tx, rx) = talon::sync::channel::<()>(1);
        let handle = talon::spawn(async move {
            rx.receive().await;
        })
        .unwrap();
        talon::task::yield_now().await;
        handle.abort();
        drop(tx);
        let result = handle.await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_cancelled());
    });
}
