//! End-to-end relay runs against small modules written in WAT.

use anyhow::Result;
use blurworker_shared::{InboundMessage, ModuleResult};
use blurworker_wasm::{
    spawn_file_worker, GuestModule, ModuleSlot, Relay, RelayConfig, RelayError, WasmRuntime,
};
use std::io::Write;
use std::time::Duration;

/// Bump allocator that poisons fresh memory with 0xff, so a terminator seen
/// by the module must have been written by the host.
const ALLOCATOR: &str = r#"
  (memory (export "memory") 1)
  (global $next (mut i32) (i32.const 1024))
  (func $alloc (export "alloc") (param $size i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $next))
    (memory.fill (local.get $ptr) (i32.const 255) (local.get $size))
    (global.set $next (i32.add (global.get $next) (local.get $size)))
    (local.get $ptr))
  (func (export "dealloc") (param i32 i32))
"#;

/// Returns the payload as an output record
const ECHO: &str = r#"
  (func (export "start") (param $args i32) (param $payload i32) (param $len i32) (result i32)
    (local $out i32)
    (local.set $out (call $alloc (i32.add (local.get $len) (i32.const 4))))
    (i32.store (local.get $out) (local.get $len))
    (memory.copy (i32.add (local.get $out) (i32.const 4)) (local.get $payload) (local.get $len))
    (local.get $out))
"#;

/// Returns -(bytes up to and including the argument terminator)
const ARG_LEN: &str = r#"
  (func (export "start") (param $args i32) (param $payload i32) (param $len i32) (result i32)
    (local $i i32)
    (block $done
      (loop $scan
        (br_if $done (i32.eqz (i32.load8_u (i32.add (local.get $args) (local.get $i)))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $scan)))
    (i32.sub (i32.const 0) (i32.add (local.get $i) (i32.const 1))))
"#;

/// Returns a status value that is not an output record (memory is one page)
const STATUS: &str = r#"
  (func (export "start") (param i32 i32 i32) (result i32)
    (i32.const 70000))
"#;

/// Never returns
const SPIN: &str = r#"
  (func (export "start") (param i32 i32 i32) (result i32)
    (loop $forever (br $forever))
    (i32.const 0))
"#;

fn module_wat(imports: &str, entry: &str) -> String {
    format!("(module {} {} {})", imports, ALLOCATOR, entry)
}

fn relay_for(wat: &str, config: RelayConfig) -> Result<Relay<blurworker_wasm::WasmModule>> {
    let runtime = WasmRuntime::new(config.clone())?;
    let module = runtime.load_module("test", wat.as_bytes())?;
    assert!(module.is_ready());
    Ok(Relay::new(ModuleSlot::ready(module), &config))
}

#[tokio::test]
async fn test_echo_round_trip() -> Result<()> {
    let mut relay = relay_for(&module_wat("", ECHO), RelayConfig::default())?;
    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

    let reply = relay
        .handle(InboundMessage::new(payload.clone(), "-s5 -epng"))
        .await?;

    assert_eq!(reply.result, ModuleResult::Output(payload));
    assert!(reply.elapsed_ms >= 0.0);
    Ok(())
}

#[tokio::test]
async fn test_args_arrive_nul_terminated() -> Result<()> {
    let mut relay = relay_for(&module_wat("", ARG_LEN), RelayConfig::default())?;

    let reply = relay
        .handle(InboundMessage::new(vec![0u8; 10], "-x=5"))
        .await?;
    assert_eq!(reply.result, ModuleResult::Error(-5));
    assert_eq!(reply.raw, -5);

    let reply = relay.handle(InboundMessage::new(vec![0u8; 10], "")).await?;
    assert_eq!(reply.result, ModuleResult::Error(-1));
    Ok(())
}

#[tokio::test]
async fn test_status_return_is_relayed_verbatim() -> Result<()> {
    let mut relay = relay_for(&module_wat("", STATUS), RelayConfig::default())?;

    let reply = relay
        .handle(InboundMessage::new(vec![0u8; 10], "-x=5"))
        .await?;
    assert_eq!(reply.raw, 70000);
    assert_eq!(reply.result, ModuleResult::Unreadable(70000));
    Ok(())
}

#[tokio::test]
async fn test_empty_payload() -> Result<()> {
    let mut relay = relay_for(&module_wat("", ECHO), RelayConfig::default())?;

    let reply = relay
        .handle(InboundMessage::new(Vec::<u8>::new(), "-s1"))
        .await?;
    assert_eq!(reply.result, ModuleResult::Output(Vec::new()));
    Ok(())
}

#[tokio::test]
async fn test_unknown_imports_and_host_log() -> Result<()> {
    let imports = r#"
      (import "env" "log" (func $log (param i32 i32)))
      (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
    "#;
    let entry = r#"
      (func (export "start") (param $args i32) (param $payload i32) (param $len i32) (result i32)
        (call $log (local.get $args) (i32.const 3))
        (i32.const 0))
    "#;
    let mut relay = relay_for(&module_wat(imports, entry), RelayConfig::default())?;

    let reply = relay
        .handle(InboundMessage::new(vec![1u8, 2, 3], "-s2"))
        .await?;
    assert_eq!(reply.result, ModuleResult::Empty);
    Ok(())
}

#[tokio::test]
async fn test_fuel_exhaustion_is_a_relay_error() -> Result<()> {
    let config = RelayConfig {
        fuel_per_call: Some(100_000),
        ..Default::default()
    };
    let mut relay = relay_for(&module_wat("", SPIN), config)?;

    let err = relay
        .handle(InboundMessage::new(vec![0u8; 4], "-s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Guest { stage: "run entry point", .. }));
    Ok(())
}

#[tokio::test]
async fn test_payload_larger_than_memory_is_a_relay_error() -> Result<()> {
    let mut relay = relay_for(&module_wat("", ECHO), RelayConfig::default())?;

    // one page of memory, allocator does not grow it
    let err = relay
        .handle(InboundMessage::new(vec![0u8; 128 * 1024], ""))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Guest { .. }));
    Ok(())
}

#[tokio::test]
async fn test_file_worker() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".wat").tempfile()?;
    write!(file, "{}", module_wat("", ECHO))?;

    let handle = spawn_file_worker(RelayConfig::default(), file.path().to_path_buf())?;
    let reply = tokio::time::timeout(
        Duration::from_secs(30),
        handle.post(InboundMessage::new(b"file bytes".to_vec(), "-s3")),
    )
    .await??;

    assert_eq!(reply.result.output(), Some(&b"file bytes"[..]));
    Ok(())
}

#[tokio::test]
async fn test_file_worker_missing_module() -> Result<()> {
    let handle = spawn_file_worker(
        RelayConfig::default(),
        "/nonexistent/blur.wasm".into(),
    )?;

    let err = handle
        .post(InboundMessage::new(Vec::<u8>::new(), ""))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::ModuleUnavailable(_)));
    Ok(())
}
