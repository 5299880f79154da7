// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Exercises the executor, timer and reactor end to end, against a real
//! worker pool instead of the single-threaded test harness.

use std::time::Duration;
use talon::sync::{channel, Mutex};

fn main() {
    tracing_subscriber::fmt::init();

    let mut runtime = talon::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .expect("failed to build runtime");

    runtime.block_on(async {
        tracing::info!("spawning fan-out workers");

        let counter = std::sync::Arc::new(Mutex::new(0u64));
        let (tx, rx) = channel::<u64>(8);

        let mut producers = Vec::new();
        for worker in 0..8u64 {
            let counter = std::sync::Arc::clone(&counter);
            let tx = tx.clone();
            producers.push(
                talon::spawn(async move {
                    talon::time::sleep(Duration::from_millis(worker)).await;
                    *counter.lock().await += worker;
                    tx.send(worker).await.expect("receiver still alive");
                })
                .expect("runtime not yet shut down"),
            );
        }
        drop(tx);

        let mut received = Vec::new();
        while let Some(value) = rx.receive().await {
            received.push(value);
        }
        for producer in producers {
            producer.await.expect("producer task panicked");
        }

        received.sort_unstable();
        assert_eq!(received, (0..8).collect::<Vec<_>>());
        assert_eq!(*counter.lock().await, (0..8u64).sum::<u64>());

        tracing::info!(total = *counter.lock().await, "fan-out complete");
    });

    tracing::info!("smoke run finished");
}
