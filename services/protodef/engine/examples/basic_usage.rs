//! Basic usage example for the protodef engine.

use protodef_engine::{EngineOptions, OpcodeTable, ProtocolEngine, VersionRequest};
use protodef_registry::{Bundle, DeprecationEntry};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Protodef Engine Example ===\n");

    // 1. Build a protocol map and a bundle
    println!("1. Preparing the protocol map and default bundle...");
    let map = OpcodeTable::from_map_str(
        "# opcodes\nC_CHECK_VERSION = 19900\nS_CHAT 22001\nS_LEGACY 22002",
    )?;

    let mut bundle = Bundle::default();
    bundle.insert_source(
        "C_CHECK_VERSION.1.def",
        "array version\n- int32 index\n- int32 value",
    );
    bundle.insert_source("S_CHAT.1.def", "uint32 channel\nstring message");
    bundle.insert_source(
        "S_CHAT.2.def",
        "uint32 channel\nuint64 author\nstring message",
    );
    bundle.insert_source("S_CHAT.2.console.def", "uint32 channel\nstring message");
    bundle.insert_source("S_LEGACY.1.def", "byte flag");
    bundle.deprecated.entry("S_LEGACY".to_string()).or_default().insert(
        1,
        DeprecationEntry {
            min: None,
            max: Some(80),
            readable: Some(true),
        },
    );
    println!("   {} bundle entries", bundle.entries.len());

    // 2. Load definitions
    println!("\n2. Loading definitions for pc, major patch 92...");
    let mut engine = ProtocolEngine::new(EngineOptions::new("pc", 92)?, Box::new(map));
    let report = engine.load(&bundle, None)?;
    println!(
        "   registered {}, skipped {}, failed {}",
        report.registered, report.skipped, report.failed
    );

    // 3. Resolve and encode
    println!("\n3. Encoding S_CHAT at the latest version...");
    let resolved = engine.resolve("S_CHAT", VersionRequest::Latest)?;
    println!(
        "   {} v{} (opcode {}, latest {:?})",
        resolved.name, resolved.version, resolved.code, resolved.latest_version
    );

    let data = json!({ "channel": 4, "author": 1_000_001u64, "message": "hello" });
    let bytes = engine.write(&resolved, Some(&data))?;
    println!("   Encoded {} bytes: {:02X?}", bytes.len(), &bytes[..]);

    // 4. Decode the frame by its own opcode
    println!("\n4. Decoding the frame...");
    let (frame, decoded) = engine.parse_frame(&bytes)?;
    println!("   {} v{}: {}", frame.name, frame.version, decoded);
    assert_eq!(decoded, data);

    // 5. Deprecated definitions
    println!("\n5. Checking deprecation...");
    let legacy = engine.resolve(22002u16, VersionRequest::Latest)?;
    match engine.write(&legacy, None) {
        Ok(_) => println!("   unexpected: S_LEGACY was writeable"),
        Err(e) => println!("   write refused: {}", e),
    }
    let value = engine.parse(&legacy, &[5, 0, 0xF2, 0x55, 1])?;
    println!("   still readable: {}", value);

    // 6. Outdated versions
    println!("\n6. Requesting an outdated version...");
    if let Err(e) = engine.resolve("S_CHAT", VersionRequest::Exact(0)) {
        println!("   {}", e);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
