// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::time::{Duration, Instant};
use talon::time::{sleep, timeout};
use talon::Builder;

#[test]
fn sleep_resolves_no_earlier_than_requested() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let start = Instant::now();
        sleep(Duration::from_millis(40)).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    });
}

#[test]
fn concurrently_sleeping_tasks_each_wake_within_their_own_window() {
    let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();
    rt.block_on(async {
        let start = Instant::now();
        let mut handles = Vec::new();
        for millis in [10u64, 20, 30, 40] {
            handles.push(
                talon::spawn(async move {
                    sleep(Duration::from_millis(millis)).await;
                    millis
                })
                .unwrap(),
            );
        }
        for (expected, handle) in [10u64, 20, 30, 40].into_iter().zip(handles) {
            let woke_after = handle.await.unwrap();
            assert_eq!(woke_after, expected);
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    });
}

#[test]
fn a_timeout_shorter_than_the_operation_elapses_first() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let result = timeout(Duration::from_millis(10), sleep(Duration::from_secs(10))).await;
        assert!(result.is_err());
    });
}

#[test]
fn a_timeout_longer_than_the_operation_yields_its_output() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let result = timeout(Duration::from_secs(10), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    });
}
