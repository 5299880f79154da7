// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use talon::sync::channel;
use talon::Builder;

#[test]
fn a_bounded_channel_preserves_send_order_across_workers() {
    let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();

    rt.block_on(async {
        let (tx, rx) = channel::<u32>(4);

        let producer = talon::spawn(async move {
            for i in 0..200 {
                tx.send(i).await.unwrap();
            }
        })
        .unwrap();

        let mut received = Vec::with_capacity(200);
        while received.len() < 200 {
            received.push(rx.receive().await.unwrap());
        }

        producer.await.unwrap();
        assert_eq!(received, (0..200).collect::<Vec<_>>());
    });
}

#[test]
fn every_sent_value_is_received_exactly_once_with_multiple_producers() {
    let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();

    rt.block_on(async {
        let (tx, rx) = channel::<u32>(8);
        let mut producers = Vec::new();
        for batch in 0..4u32 {
            let tx = tx.clone();
            producers.push(
                talon::spawn(async move {
                    for i in 0..50 {
                        tx.send(batch * 50 + i).await.unwrap();
                    }
                })
                .unwrap(),
            );
        }
        drop(tx);

        let mut received = Vec::with_capacity(200);
        while let Some(value) = rx.receive().await {
            received.push(value);
        }
        for producer in producers {
            producer.await.unwrap();
        }

        received.sort_unstable();
        assert_eq!(received, (0..200).collect::<Vec<_>>());
    });
}
