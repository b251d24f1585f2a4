//! End-to-end cycler behaviour on a mock line bank.
//!
//! Presses are injected through the mock handle and time runs paused, so
//! every timer, beep and expiry is deterministic.

mod common;

use common::{COOLDOWN, Rig, SUPPRESSION, TRIPLE_BEEP, settle};
use kiosk_core::{Error, Level};
use kiosk_feedback::{CyclerConfig, Phase, Readiness, ReadinessPolicy};
use std::io::Write;
use std::time::Duration;

const MS: Duration = Duration::from_millis(1);

// ============================================================================
// Press handling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_press_lights_lamp_one() {
    let rig = Rig::start();
    assert_eq!(rig.lamps(), [false, false, false]);

    rig.press();

    assert_eq!(rig.state(), 1);
    assert_eq!(rig.lamps(), [false, true, false]);
    assert_eq!(rig.cycler.machine().phase(), Phase::Suppressed);
}

#[tokio::test(start_paused = true)]
async fn test_press_inside_suppression_window_is_ignored() {
    let rig = Rig::start();

    rig.press();
    settle(SUPPRESSION - 10 * MS).await;
    rig.press();

    assert_eq!(rig.state(), 1);
    assert_eq!(rig.lamps(), [false, true, false]);
    let stats = rig.cycler.stats();
    assert_eq!(stats.accepted_edges, 1);
    assert_eq!(stats.suppressed_edges, 1);
}

#[tokio::test(start_paused = true)]
async fn test_contact_bounce_counts_once() {
    let rig = Rig::start();

    rig.gpio.bounce(rig.config.button_line, 5);

    assert_eq!(rig.state(), 1);
    assert_eq!(rig.cycler.stats().suppressed_edges, 4);
    settle(SUPPRESSION).await;
    assert_eq!(rig.beeps(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_press_beeps_once() {
    let rig = Rig::start();

    rig.press();
    settle(SUPPRESSION).await;

    assert_eq!(rig.beeps(), 1);
    assert_eq!(rig.gpio.level(rig.buzzer()), Level::Low);
}

#[tokio::test(start_paused = true)]
async fn test_state_wraps_after_three_presses() {
    let rig = Rig::start();
    let gap = SUPPRESSION + 100 * MS;

    rig.press();
    settle(gap).await;
    rig.press();
    assert_eq!(rig.lamps(), [false, false, true]);
    settle(gap).await;
    rig.press();

    assert_eq!(rig.state(), 0);
    assert_eq!(rig.lamps(), [true, false, false]);
}

// ============================================================================
// Cooldown expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_expiry_reports_and_resets() {
    let rig = Rig::start();
    let channel = rig.cycler.channel().clone();

    rig.press();
    settle(COOLDOWN - MS).await;
    assert!(channel.is_empty());
    assert_eq!(rig.state(), 1);

    settle(2 * MS).await;
    assert_eq!(channel.len(), 2);
    assert_eq!(rig.state(), 0);
    assert_eq!(rig.lamps(), [false, false, false]);
    assert_eq!(rig.cycler.machine().phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_read_after_expiry_is_read_once() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    rig.press();
    settle(COOLDOWN + MS).await;

    assert_eq!(&consumer.read(64)[..], b"1\n");
    assert!(consumer.read(64).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expiry_plays_triple_beep() {
    let rig = Rig::start();

    rig.press();
    settle(COOLDOWN + TRIPLE_BEEP + 10 * MS).await;

    assert_eq!(rig.beeps(), 4);
    assert_eq!(rig.gpio.level(rig.buzzer()), Level::Low);
    assert_eq!(rig.cycler.stats().expiries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_press_rearms_cooldown() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    rig.press();
    settle(500 * MS).await;
    rig.press();
    assert_eq!(rig.state(), 2);

    // The first cooldown would have fired here.
    settle(COOLDOWN - 100 * MS).await;
    assert!(consumer.read(64).is_empty());
    assert_eq!(rig.state(), 2);

    settle(200 * MS).await;
    assert_eq!(&consumer.read(64)[..], b"2\n");

    let stats = rig.cycler.stats();
    assert_eq!(stats.accepted_edges, 2);
    assert_eq!(stats.cancelled_timers, 1);
    assert_eq!(stats.expiries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_press_during_triple_beep_stays_suppressed_until_its_beep() {
    let rig = Rig::start();

    rig.press();
    settle(COOLDOWN + MS).await;
    rig.press();
    assert_eq!(rig.state(), 1);

    // The confirmation beep is still queued behind the triple.
    settle(450 * MS).await;
    assert_eq!(rig.beeps(), 4);
    rig.press();
    assert_eq!(rig.state(), 1);
    assert_eq!(rig.cycler.stats().suppressed_edges, 1);

    // Triple ends at 5.6s, confirmation beep plus guard at 6.0s.
    settle(600 * MS).await;
    assert_eq!(rig.beeps(), 5);
    rig.press();
    assert_eq!(rig.state(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_wrapped_state_reports_zero() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    for _ in 0..3 {
        rig.press();
        settle(SUPPRESSION + 50 * MS).await;
    }
    settle(COOLDOWN).await;

    assert_eq!(&consumer.read(64)[..], b"0\n");
}

// ============================================================================
// Consumer side
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_consumer_write_reads_back_until_expiry() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    assert_eq!(consumer.write(b"hello"), 5);
    assert_eq!(&consumer.read(64)[..], b"hello");

    consumer.write(b"hello");
    rig.press();
    settle(COOLDOWN + MS).await;

    assert_eq!(&consumer.read(64)[..], b"1\n");
}

#[tokio::test(start_paused = true)]
async fn test_oversized_write_is_truncated() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    assert_eq!(consumer.write(&[b'x'; 100]), 63);
    assert_eq!(consumer.read(64).len(), 63);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_reader_wakes_on_expiry() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();
    let reader = tokio::spawn(async move { consumer.read_when_ready(64).await });

    rig.press();
    let data = tokio::time::timeout(2 * COOLDOWN, reader)
        .await
        .expect("reader should wake")
        .unwrap();

    assert_eq!(&data[..], b"1\n");
}

#[tokio::test(start_paused = true)]
async fn test_blocked_reader_times_out() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();

    let result = consumer.read_timeout(64, Duration::from_secs(1)).await;

    assert!(matches!(result, Err(Error::Timeout { duration_ms: 1000 })));
}

#[tokio::test(start_paused = true)]
async fn test_consumer_policy_readiness() {
    let rig = Rig::start();
    let consumer = rig.cycler.open();
    assert_eq!(consumer.poll_readiness(), Readiness::WRITABLE);

    rig.press();
    let ready = consumer
        .wait_ready_timeout(Readiness::READABLE, 2 * COOLDOWN)
        .await
        .unwrap();

    assert_eq!(ready, Readiness::READABLE);
    assert!(consumer.poll_readiness().contains(Readiness::WRITABLE));
}

#[tokio::test(start_paused = true)]
async fn test_producer_policy_readiness() {
    let rig = Rig::with_policy(ReadinessPolicy::Producer);
    let consumer = rig.cycler.open();
    assert_eq!(consumer.poll_readiness(), Readiness::WRITABLE);

    rig.press();
    settle(COOLDOWN + MS).await;
    assert_eq!(consumer.poll_readiness(), Readiness::empty());

    let writable = tokio::spawn({
        let channel = rig.cycler.channel().clone();
        async move { channel.wait_ready(Readiness::WRITABLE).await }
    });
    tokio::task::yield_now().await;
    assert!(!writable.is_finished());

    assert_eq!(&consumer.read(64)[..], b"1\n");
    assert_eq!(writable.await.unwrap(), Readiness::WRITABLE);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_everything() {
    let rig = Rig::start();
    assert_eq!(rig.gpio.claimed_count(), 5);

    rig.press();
    settle(50 * MS).await;
    assert_eq!(rig.gpio.level(rig.buzzer()), Level::High);

    let Rig { cycler, gpio, config } = rig;
    cycler.shutdown();

    assert_eq!(gpio.claimed_count(), 0);
    assert_eq!(gpio.interrupt_count(), 0);
    assert_eq!(gpio.level(config.buzzer_line), Level::Low);
    for lamp in config.lamp_lines {
        assert_eq!(gpio.level(lamp), Level::Low);
    }
}

#[tokio::test(start_paused = true)]
async fn test_presses_after_shutdown_are_ignored() {
    let rig = Rig::start();
    let machine = rig.cycler.machine().clone();

    let Rig { cycler, gpio, config } = rig;
    cycler.shutdown();
    gpio.press(config.button_line);

    assert_eq!(machine.state().as_u8(), 0);
    assert_eq!(machine.stats().accepted_edges, 0);
}

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_timing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cooldown_ms = 1000").unwrap();
    writeln!(file, "buffer_capacity = 4").unwrap();

    let config = CyclerConfig::load(file.path()).unwrap();
    let rig = Rig::with_config(config);
    let consumer = rig.cycler.open();
    assert_eq!(rig.cycler.channel().usable_capacity(), 3);

    rig.press();
    settle(Duration::from_millis(1000) + MS).await;

    assert_eq!(&consumer.read(64)[..], b"1\n");
}
