// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{Read, Write};
use talon::{AsyncIo, Builder};

#[test]
fn a_pipe_round_trips_through_the_reactor() {
    let mut rt = Builder::new_multi_thread().worker_threads(2).build().unwrap();
    rt.block_on(async {
        let (mut writer_raw, reader_raw) = mio::unix::pipe::new().unwrap();
        let reader = AsyncIo::new(reader_raw, mio::Interest::READABLE).unwrap();

        let writer = talon::spawn(async move {
            writer_raw.write_all(b"talon").unwrap();
        })
        .unwrap();

        let mut buf = [0u8; 5];
        let mut read = 0;
        while read < buf.len() {
            read += reader
                .read_ready(|source| source.read(&mut buf[read..]))
                .await
                .unwrap();
        }
        writer.await.unwrap();
        assert_eq!(&buf, b"talon");
    });
}

#[test]
fn dropping_a_pending_registration_does_not_leak_its_reactor_slot() {
    let mut rt = Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        for _ in 0..64 {
            let (_writer, reader_raw) = mio::unix::pipe::new().unwrap();
            let reader = AsyncIo::new(reader_raw, mio::Interest::READABLE).unwrap();
            let result = talon::time::timeout(std::time::Duration::from_millis(5), async {
                let mut buf = [0u8; 1];
                reader.read_ready(|source| source.read(&mut buf)).await
            })
            .await;
            assert!(result.is_err(), "nothing was ever written to the pipe");
        }
    });
}
