//! Criterion benchmarks for the codriver binary codec.
//!
//! Measures encoding and decoding latency for representative message kinds.
//! Pointer moves are the hot path: a 100-step drag encodes 100 of them, so
//! per-message codec cost multiplies directly into drag wall-clock time.
//!
//! Run with:
//! ```bash
//! cargo bench --package codriver-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codriver_core::domain::geometry::{CoordinateConversion, Position};
use codriver_core::keys::KeyCode;
use codriver_core::marshal::Value;
use codriver_core::protocol::messages::{
    AgentMessage, CallMethodMessage, ClickObjectMessage, GetObjectPositionMessage, HelloMessage,
    HookMask, MouseButton, ReplyMessage, PROTOCOL_VERSION,
};
use codriver_core::protocol::{decode_message, encode_message};
use uuid::Uuid;

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_hello() -> AgentMessage {
    AgentMessage::Hello(HelloMessage {
        client_id: Uuid::new_v4(),
        protocol_version: PROTOCOL_VERSION,
        client_name: "benchmark-driver".to_string(),
    })
}

fn make_enable_hooks() -> AgentMessage {
    AgentMessage::EnableHooks {
        mask: HookMask::ALL,
    }
}

fn make_pointer_move() -> AgentMessage {
    AgentMessage::PointerMove { x: 960.5, y: 540.25 }
}

fn make_keys_down() -> AgentMessage {
    AgentMessage::KeysDown {
        keys: vec![KeyCode::ShiftLeft, KeyCode::ArrowDown],
    }
}

fn make_click_object() -> AgentMessage {
    AgentMessage::ClickObject(ClickObjectMessage {
        button: MouseButton::Left,
        selector: "//*[@name='Load_UISample']".to_string(),
    })
}

fn make_call_method() -> AgentMessage {
    AgentMessage::CallMethod(CallMethodMessage {
        selector: "//*[@name='Canvas']/fn:component('ProjectManager')".to_string(),
        method: "DoMath".to_string(),
        args: vec![Value::Int(1), Value::Int(2)],
    })
}

fn make_get_object_position() -> AgentMessage {
    AgentMessage::GetObjectPosition(GetObjectPositionMessage {
        selector: "//*[@name='Cylinder']".to_string(),
        conversion: CoordinateConversion::WorldToScreen,
    })
}

fn make_reply_position() -> AgentMessage {
    AgentMessage::Reply(ReplyMessage {
        outcome: Ok(Value::Position(Position::screen(640.0, 360.0))),
    })
}

fn fixtures() -> Vec<(&'static str, AgentMessage)> {
    vec![
        ("hello", make_hello()),
        ("enable_hooks", make_enable_hooks()),
        ("pointer_move", make_pointer_move()),
        ("keys_down", make_keys_down()),
        ("click_object", make_click_object()),
        ("call_method", make_call_method()),
        ("get_object_position", make_get_object_position()),
        ("reply_position", make_reply_position()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg), black_box(42)).unwrap());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, msg) in fixtures() {
        let bytes = encode_message(&msg, 42).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

fn bench_drag_frame_burst(c: &mut Criterion) {
    // A 100-step drag as the input simulator produces it: 100 pointer moves
    // encoded one after another.
    c.bench_function("encode_100_step_drag", |b| {
        b.iter(|| {
            for i in 0..100u32 {
                let msg = AgentMessage::PointerMove {
                    x: i as f32,
                    y: i as f32 * 0.5,
                };
                black_box(encode_message(&msg, u64::from(i)).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_drag_frame_burst);
criterion_main!(benches);
