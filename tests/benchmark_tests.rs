//! Performance benchmarks for the hot paths of the movement sync layer

use client::game::ClientGame;
use server::authority::Authority;
use shared::{
    ConnectionHandle, HeadlessPresentation, HorizontalDirection, Message, MovementIntent,
    Position, UserSetup, UserUpdate, VerticalDirection, MOVE_STEP,
};
use std::time::{Duration, Instant};

fn report(label: &str, iterations: u32, duration: Duration) {
    println!(
        "{}: {} iterations in {:?} ({:.2} ns/iter)",
        label,
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );
}

/// Benchmarks frame encoding of the largest message
#[test]
fn benchmark_frame_encoding() {
    let message = Message::from(UserSetup::new(
        ConnectionHandle(1),
        true,
        "User0001",
        "trollface_1.bmp",
        "192.168.100.200:65535",
    ));

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = message.encode().unwrap();
        std::hint::black_box(frame);
    }

    let duration = start.elapsed();
    report("UserSetup encoding", iterations, duration);

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks frame decoding of position updates
#[test]
fn benchmark_frame_decoding() {
    let frame = Message::from(UserUpdate::new("User0001", Position::new(1.0, 2.0, 3.0)))
        .encode()
        .unwrap();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let message = Message::decode(&frame).unwrap();
        std::hint::black_box(message);
    }

    let duration = start.elapsed();
    report("UserUpdate decoding", iterations, duration);

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks movement resolution with a full session
#[test]
fn benchmark_movement_resolution() {
    let mut authority = Authority::with_seed(
        HeadlessPresentation::new(),
        MOVE_STEP,
        vec!["trollface_1.bmp".to_string()],
        3,
    );
    for id in 1..=32 {
        authority.player_connected(ConnectionHandle(id), "127.0.0.1:1");
    }

    let intents = [
        MovementIntent::new(HorizontalDirection::Left, VerticalDirection::Up),
        MovementIntent::new(HorizontalDirection::Right, VerticalDirection::None),
        MovementIntent::new(HorizontalDirection::None, VerticalDirection::Down),
    ];

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let identity = ConnectionHandle(i % 32 + 1);
        let update = authority.resolve_movement(identity, intents[i as usize % intents.len()]);
        assert!(update.is_some());
    }

    let duration = start.elapsed();
    report("Movement resolution", iterations, duration);

    assert!(duration.as_millis() < 2000);
}

/// Stress test: a client applying a burst of update frames
#[test]
fn stress_test_client_update_burst() {
    let mut game = ClientGame::new(HeadlessPresentation::new());
    let names: Vec<String> = (0..32).map(|i| format!("User{:04}", i)).collect();
    for (i, name) in names.iter().enumerate() {
        game.apply_user_setup(&UserSetup::new(ConnectionHandle(i as u32), false, name, "", ""));
    }

    let frames: Vec<_> = (0..1000)
        .map(|i| {
            Message::from(UserUpdate::new(
                &names[i % names.len()],
                Position::new(i as f32 * 0.01, 0.0, 0.0),
            ))
            .encode()
            .unwrap()
        })
        .collect();

    let start = Instant::now();

    for _ in 0..20 {
        for frame in &frames {
            game.handle_frame(frame);
        }
    }

    let duration = start.elapsed();
    report("Client update frames", 20_000, duration);

    assert_eq!(game.registry().len(), 32);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks interpolation stepping for many gliding players
#[test]
fn benchmark_interpolation_advance() {
    let mut game =
        ClientGame::new(HeadlessPresentation::new()).with_interpolation(Duration::from_secs(10));
    for i in 0..64u32 {
        let name = format!("User{:04}", i);
        game.apply_user_setup(&UserSetup::new(ConnectionHandle(i), false, &name, "", ""));
        game.apply_user_update(&UserUpdate::new(&name, Position::new(5.0, 5.0, 0.0)));
    }

    let iterations = 5_000;
    let start = Instant::now();

    for _ in 0..iterations {
        game.advance(Duration::from_micros(100));
    }

    let duration = start.elapsed();
    report("Interpolation advance (64 glides)", iterations, duration);

    assert!(duration.as_millis() < 2000);
}
