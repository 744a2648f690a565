//! End-to-end two-process integration test for the shared-memory transport.
//!
//! Uses the self-spawning pattern: the same test binary is re-invoked with
//! an environment variable selecting the writer or reader role, so the two
//! sides genuinely run as separate OS processes sharing only the backing
//! file.

use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use piper_transport::{Backer, Medium, Transport};

macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "PIPER_E2E_ROLE";
const ROLE_WRITER: &str = "writer";
const ROLE_READER: &str = "reader";

const BLOCK_COUNT: u64 = 20_000;
const SLOT_COUNT: u32 = 512;
const CONTENT_SIZE: u32 = 64;

const WRITER_BATCH_SIZE: u64 = 200;
const WRITER_BATCH_DELAY_US: u64 = 50;

fn test_path() -> String {
    let pid = std::process::id();
    format!("/tmp/piper_e2e_transport_{pid}")
}

fn run_writer(path: &str) {
    log!("[WRITER] creating backer at {path}");
    let metadata = vec![0u8; 64];
    let backer = Backer::create(path, &metadata, &[16, CONTENT_SIZE], SLOT_COUNT)
        .expect("writer: failed to create backer");
    let medium = Medium::open(&backer).expect("writer: failed to open medium");
    let transport = Transport::new(&backer, &medium);
    let session = transport.begin().expect("writer: failed to begin session");

    let start = Instant::now();
    for p in 0..BLOCK_COUNT {
        let slot = transport.input(session, p, 1).expect("writer: input failed");
        slot.fill((p % 251) as u8);
        transport.flush(session).expect("writer: flush failed");

        if (p + 1) % WRITER_BATCH_SIZE == 0 {
            std::thread::sleep(Duration::from_micros(WRITER_BATCH_DELAY_US));
        }
    }
    transport.finish(session).expect("writer: finish failed");

    let elapsed = start.elapsed();
    log!("[WRITER] flushed {BLOCK_COUNT} blocks in {elapsed:?}");
}

fn run_reader(path: &str) {
    log!("[READER] waiting for backer at {path}");
    let open_deadline = Instant::now() + Duration::from_secs(5);
    let backer = loop {
        match Backer::open(path) {
            Ok(b) => break b,
            Err(_) if Instant::now() < open_deadline => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => panic!("[READER] failed to open backer: {e}"),
        }
    };
    let medium = Medium::open(&backer).expect("reader: failed to open medium");
    let transport = Transport::new(&backer, &medium);

    let mut cursor = transport.until();
    let mut blocks_read: u64 = 0;
    let mut resyncs: u64 = 0;
    let read_deadline = Instant::now() + Duration::from_secs(10);
    let mut idle_spins: u32 = 0;

    while Instant::now() < read_deadline {
        let middle = transport.middle();
        let start = transport.start();
        if start > cursor {
            resyncs += 1;
            cursor = transport.until();
            continue;
        }
        if cursor >= middle {
            idle_spins += 1;
            if idle_spins > 200_000 && blocks_read > 0 {
                break;
            }
            std::hint::spin_loop();
            continue;
        }
        match transport.view(cursor, 1) {
            Ok(bytes) => {
                let expected = (cursor % 251) as u8;
                assert!(
                    bytes.iter().all(|&b| b == expected),
                    "content mismatch at position {cursor}"
                );
                blocks_read += 1;
                idle_spins = 0;
                cursor += 1;
            }
            Err(_) => {
                // the writer advanced past us between the start()/view() reads;
                // resync on the next loop iteration.
                resyncs += 1;
                cursor = transport.until();
            }
        }
    }

    log!("[READER] blocks read: {blocks_read}, resyncs: {resyncs}");
    assert!(blocks_read > 0, "reader observed no blocks at all");
}

#[test]
fn e2e_two_process_transport() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let path = env::var("PIPER_E2E_PATH").expect("PIPER_E2E_PATH not set");
        match role.as_str() {
            ROLE_WRITER => run_writer(&path),
            ROLE_READER => run_reader(&path),
            other => panic!("unknown role: {other}"),
        }
        return;
    }

    let path = test_path();
    let exe = env::current_exe().expect("failed to get current executable path");

    log!("[ORCHESTRATOR] spawning writer");
    let mut writer_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_transport")
        .env(ENV_ROLE, ROLE_WRITER)
        .env("PIPER_E2E_PATH", &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn writer process");

    std::thread::sleep(Duration::from_millis(5));

    log!("[ORCHESTRATOR] spawning reader");
    let mut reader_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_transport")
        .env(ENV_ROLE, ROLE_READER)
        .env("PIPER_E2E_PATH", &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn reader process");

    let writer_status = writer_proc.wait().expect("failed to wait for writer");
    let reader_status = reader_proc.wait().expect("failed to wait for reader");

    let _ = std::fs::remove_file(&path);

    assert!(writer_status.success(), "writer process failed: {writer_status}");
    assert!(reader_status.success(), "reader process failed: {reader_status}");
}

/// A writer killed between `begin()` and `finish()` leaves the session
/// atomic occupied; `unclog` must reclaim it for the next writer.
#[test]
fn crash_recovery_via_unclog() {
    let path = format!("/tmp/piper_e6_{}", std::process::id());
    let metadata = vec![0u8; 64];
    let backer = Backer::create(&path, &metadata, &[16, 64], 8).unwrap();
    let medium = Medium::open(&backer).unwrap();
    let transport = Transport::new(&backer, &medium);

    let _session = transport.begin().unwrap();
    // simulate the writer process dying without calling finish(): the session
    // atomic is left occupied.
    assert!(transport.begin().is_err());

    transport.unclog();
    let new_session = transport.begin().unwrap();
    assert!(new_session >= 1);
    transport.finish(new_session).unwrap();

    let _ = std::fs::remove_file(&path);
}
