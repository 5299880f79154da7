// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use talon::Builder;

/// Spawns far more tasks than fit in one worker's local queue from a single
/// producer task, so the rest are forced through the injector/steal path;
/// more than one worker thread ending up running tasks is evidence that
/// stealing, not just round-robin injection, moved work across workers.
#[test]
fn work_fans_out_across_more_than_one_worker_thread() {
    let mut rt = Builder::new_multi_thread().worker_threads(8).build().unwrap();
    let seen: Arc<Mutex<HashSet<ThreadId>>> = Arc::new(Mutex::new(HashSet::new()));

    rt.block_on(async {
        let producer_seen = Arc::clone(&seen);
        let producer = talon::spawn(async move {
            let mut handles = Vec::with_capacity(4000);
            for _ in 0..4000 {
                let seen = Arc::clone(&producer_seen);
                handles.push(
                    talon::spawn(async move {
                        seen.lock().unwrap().insert(std::thread::current().id());
                        talon::task::yield_now().await;
                        seen.lock().unwrap().insert(std::thread::current().id());
                    })
                    .unwrap(),
                );
            }
            for handle in handles {
                handle.await.unwrap();
            }
        })
        .unwrap();
        producer.await.unwrap();
    });

    assert!(
        seen.lock().unwrap().len() > 1,
        "expected spawned tasks to run on more than one worker thread"
    );
}
