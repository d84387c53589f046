//! Black-box integration tests driving [`dqueue::Queue`] only through its
//! public API.

use dqueue::{OpenMode, Queue};
use tempfile::tempdir;

#[test]
fn round_trips_a_batch_of_packets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dqueue.bin");

    let mut producer = Queue::open(&path, 1).unwrap();
    producer
        .push(vec![&b"first"[..], &b"second"[..], &b"third"[..]])
        .unwrap();

    let mut consumer = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();
    let packets = consumer.pop().unwrap();
    let collected: Vec<&[u8]> = packets.iter().collect();
    assert_eq!(collected, vec![&b"first"[..], &b"second"[..], &b"third"[..]]);
}

#[test]
fn reopen_without_reset_preserves_unread_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dqueue.bin");

    {
        let mut producer = Queue::open(&path, 1).unwrap();
        producer.push(vec![&b"persisted"[..]]).unwrap();
    }

    let mut reopened = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();
    let packets = reopened.pop().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets.get(0), Some(&b"persisted"[..]));
}

#[test]
fn open_with_reset_discards_prior_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dqueue.bin");

    {
        let mut producer = Queue::open(&path, 1).unwrap();
        producer.push(vec![&b"stale"[..]]).unwrap();
    }

    let mut reset = Queue::open(&path, 1).unwrap();
    let packets = reset.pop().unwrap();
    assert!(packets.is_empty());
}

#[test]
fn producer_and_consumer_can_interleave_across_handles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dqueue.bin");

    let mut producer = Queue::open(&path, 1).unwrap();
    let mut consumer = Queue::open_with_mode(&path, 1, OpenMode::Reopen).unwrap();

    for batch in 0..5 {
        let label = format!("batch-{}", batch);
        producer.push(vec![label.as_bytes()]).unwrap();

        let packets = consumer.pop().unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets.get(0), Some(label.as_bytes()));
    }
}

#[test]
fn a_batch_with_an_oversized_packet_is_rejected_and_written_data_is_unaffected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dqueue.bin");
    let mut q = Queue::open(&path, 32).unwrap();

    let huge = vec![0u8; dqueue::MAX_PACKET_SIZE + 1];
    let err = q.push(vec![&b"ok"[..], huge.as_slice()]).unwrap_err();
    assert!(err.is_packet_too_large());

    // Neither "ok" nor the oversized payload made it into the queue.
    let packets = q.pop().unwrap();
    assert!(packets.is_empty());
}
