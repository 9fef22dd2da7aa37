//! Session manager shared across threads.

use cp1600::{SessionError, SessionManager, StopReason, Word};
use std::sync::Arc;
use std::thread;

/// MVI #n,R0 / INCR R0 / HLT
fn program(n: Word) -> [Word; 4] {
    [0x02B8, n, 0x0008, 0x0000]
}

#[test]
fn sessions_run_independently_on_threads() {
    let manager = Arc::new(SessionManager::new());

    let handles: Vec<_> = (0..8u16)
        .map(|n| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let id = manager.create(Some(format!("worker-{}", n))).unwrap();
                manager
                    .with_machine(&id, |m| {
                        m.load_rom_words(&program(n * 10), Some(format!("prog-{}.bin", n)))?;
                        m.run(100)
                    })
                    .unwrap()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let report = handle.join().unwrap();
        assert_eq!(report.reason, StopReason::Halted);
        assert_eq!(report.state.registers[0], n as Word * 10 + 1);
    }

    let summaries = manager.list();
    assert_eq!(summaries.len(), 8);
    assert!(summaries.iter().all(|s| s.halted && s.instructions_executed == 3));
    assert_eq!(summaries[0].id, "worker-0");
    assert_eq!(summaries[0].rom_name.as_deref(), Some("prog-0.bin"));
}

#[test]
fn one_session_stepped_from_two_threads() {
    let manager = Arc::new(SessionManager::new());
    let id = manager.create(None).unwrap();
    manager
        .with_machine(&id, |m| m.load_rom_words(&[0x0008; 2000], None))
        .unwrap();

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    manager.with_machine(&id, |m| m.step().map(|_| ())).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let handle = manager.get(&id).unwrap();
    let machine = handle.lock().unwrap();
    assert_eq!(machine.instructions_executed(), 1000);
    assert_eq!(machine.cpu().register(0).unwrap(), 1000);
    assert_eq!(machine.cpu().pc(), 0x5000 + 1000);
}

#[test]
fn destroyed_session_is_gone_for_everyone() {
    let manager = SessionManager::new();
    let id = manager.create(Some("temp".into())).unwrap();
    let handle = manager.get(&id).unwrap();

    manager.destroy(&id).unwrap();
    assert_eq!(manager.get(&id).unwrap_err(), SessionError::NotFound("temp".into()));
    assert!(manager.is_empty());

    // An outstanding handle keeps its machine alive.
    assert!(!handle.lock().unwrap().is_halted());
}
