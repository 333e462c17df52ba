mod common;

use common::{Harness, pid};
use dio_abi::{PortRange, Status};
use dioport::DriverOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const RANGE: [PortRange; 1] = [PortRange::new(0x7000, 0x700F)];

#[test]
fn concurrent_grants_have_one_winner() {
    let h = Arc::new(Harness::started(DriverOptions::default()));
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (1..=contenders as u64)
        .map(|raw| {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                let status = h.grant(pid(raw), &RANGE).status;
                match status {
                    Status::Success => {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    other => assert_eq!(other, Status::AccessDenied),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    let owner = h.device.owner().unwrap();
    assert_eq!(h.platform.io_access(owner), Some(true));
}

#[test]
fn exit_notification_frees_the_slot_without_revoking() {
    let h = Harness::started(DriverOptions::default());
    assert_eq!(h.grant(pid(10), &RANGE).status, Status::Success);
    assert_eq!(h.grant(pid(11), &RANGE).status, Status::AccessDenied);

    assert!(!h.device.process_exited(pid(11)));
    assert!(h.device.process_exited(pid(10)));
    assert_eq!(h.platform.io_access(pid(10)), Some(true));
    assert!(h.platform.installed_map().iter().all(|&b| b == 0xFF));

    assert_eq!(h.grant(pid(11), &RANGE).status, Status::Success);
    assert_eq!(h.device.owner(), Some(pid(11)));
}

/// The next owner's grant must survive a release running concurrently on
/// another thread, whichever finishes first.
fn grant_survives_concurrent_release(release: fn(&Harness)) {
    for _ in 0..200 {
        let h = Arc::new(Harness::started(DriverOptions::default()));
        assert_eq!(h.grant(pid(1), &RANGE).status, Status::Success);
        let barrier = Arc::new(Barrier::new(2));

        let releaser = {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                release(&h);
            })
        };
        let grantor = {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                while h.grant(pid(2), &RANGE).status != Status::Success {
                    thread::yield_now();
                }
            })
        };
        releaser.join().unwrap();
        grantor.join().unwrap();

        assert_eq!(h.device.owner(), Some(pid(2)));
        assert!(h.device.is_port_accessible(0x7000));
        assert_eq!(h.read(pid(2), &RANGE, 8 + 16).0.status, Status::Success);
    }
}

#[test]
fn grant_racing_exit_notification_keeps_its_map() {
    grant_survives_concurrent_release(|h| assert!(h.device.process_exited(pid(1))));
}

#[test]
fn grant_racing_cleanup_keeps_its_map() {
    grant_survives_concurrent_release(|h| assert_eq!(h.device.cleanup(pid(1)), Status::Success));
}

#[test]
fn cleanup_releases_and_revokes() {
    let h = Harness::started(DriverOptions::default());
    h.grant(pid(1), &RANGE);
    assert_eq!(h.device.cleanup(pid(2)), Status::Success);
    assert_eq!(h.device.owner(), Some(pid(1)));

    assert_eq!(h.device.cleanup(pid(1)), Status::Success);
    assert_eq!(h.device.close(pid(1)), Status::Success);
    assert_eq!(h.device.owner(), None);
    assert_eq!(h.platform.io_access(pid(1)), Some(false));
    assert!(!h.device.is_port_accessible(0x7000));
}

#[test]
fn cleanup_can_leave_io_access_alone() {
    let options = DriverOptions::new().with_revoke_on_unregister(false);
    let h = Harness::started(options);
    h.grant(pid(1), &RANGE);
    assert_eq!(h.device.cleanup(pid(1)), Status::Success);
    assert_eq!(h.device.owner(), None);
    assert_eq!(h.platform.io_access(pid(1)), Some(true));
}

#[test]
fn open_registers_when_configured() {
    let h = Harness::started(DriverOptions::new().with_register_on_open(true));
    assert_eq!(h.device.create(pid(1)), Status::Success);
    assert_eq!(h.device.owner(), Some(pid(1)));
    assert_eq!(h.device.create(pid(1)), Status::Success);
    assert_eq!(h.device.create(pid(2)), Status::AccessDenied);
}

#[test]
fn open_binds_nothing_by_default() {
    let h = Harness::started(DriverOptions::default());
    assert_eq!(h.device.create(pid(1)), Status::Success);
    assert_eq!(h.device.create(pid(2)), Status::Success);
    assert_eq!(h.device.owner(), None);
}
