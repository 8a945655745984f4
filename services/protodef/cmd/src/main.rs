//! Protodef command-line tool.
//!
//! Loads a definition bundle, an optional custom definition directory, and a
//! protocol map, then resolves, decodes, or encodes messages.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use protodef_engine::{Identifier, OpcodeTable, ProtocolEngine, VersionRequest};
use protodef_registry::{Bundle, Permissions};
use protodef_wire::Platform;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::ProtodefConfig;
use logging::ProtodefLogFormatter;

/// Versioned protocol definition tool
#[derive(Parser, Debug)]
#[command(name = "protodef", version, about = "Versioned protocol definition registry and codec")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "protodef.yaml")]
    config: PathBuf,

    /// Target platform (pc, console, classic)
    #[arg(long)]
    platform: Option<String>,

    /// Major patch version for deprecation checks
    #[arg(long)]
    major_patch: Option<u32>,

    /// Default definition bundle (JSON)
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Custom definition directory
    #[arg(long)]
    custom_dir: Option<PathBuf>,

    /// Protocol map file
    #[arg(long)]
    map: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Disable colored log output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// List registered definitions
    List,
    /// Show what an identifier resolves to
    Resolve {
        /// Message name or opcode
        id: String,
        /// Definition version (latest when omitted)
        #[arg(long)]
        version: Option<u32>,
    },
    /// Decode a hex-encoded message and print it as JSON
    Decode {
        /// Message name or opcode
        id: String,
        /// Whole message, header included
        hex: String,
        /// Definition version (latest when omitted)
        #[arg(long)]
        version: Option<u32>,
    },
    /// Encode a JSON value and print the message as hex
    Encode {
        /// Message name or opcode
        id: String,
        /// Message data
        json: String,
        /// Definition version (latest when omitted)
        #[arg(long)]
        version: Option<u32>,
    },
    /// Decode a hex-encoded frame using the opcode in its header
    Frame {
        /// Whole message, header included
        hex: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level, !args.no_color)?;
    component_debug!("cli", "Starting protodef v{}", env!("CARGO_PKG_VERSION"));

    let output = resolve_config(&args)
        .and_then(|config| build_engine(&config))
        .and_then(|mut engine| execute(&mut engine, &args.command));
    match output {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            component_error!("cli", "{:#}", e);
            Err(e)
        }
    }
}

fn init_tracing(log_level: &str, color: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let mut filter = EnvFilter::new("warn");
            for target in [
                "protodef",
                "protodef_wire",
                "protodef_schema",
                "protodef_registry",
                "protodef_engine",
            ] {
                filter = filter.add_directive(format!("{}={}", target, log_level).parse()?);
            }
            filter
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .event_format(ProtodefLogFormatter::new("protodef", color))
        .init();
    Ok(())
}

/// Config file and environment first, then command-line flags
fn resolve_config(args: &Args) -> Result<ProtodefConfig> {
    let mut config = ProtodefConfig::load_from_file(&args.config)?;
    apply_cli_flags(&mut config, args)?;
    Ok(config)
}

fn apply_cli_flags(config: &mut ProtodefConfig, args: &Args) -> Result<()> {
    if let Some(platform) = &args.platform {
        config.platform = platform
            .parse::<Platform>()
            .with_context(|| format!("unsupported --platform '{}'", platform))?;
    }
    if let Some(patch) = args.major_patch {
        config.major_patch_version = patch;
    }
    if let Some(bundle) = &args.bundle {
        config.bundle_path = bundle.clone();
    }
    if let Some(dir) = &args.custom_dir {
        config.custom_dir = Some(dir.clone());
    }
    if let Some(map) = &args.map {
        config.map_path = map.clone();
    }
    Ok(())
}

fn build_engine(config: &ProtodefConfig) -> Result<ProtocolEngine> {
    let map = OpcodeTable::from_map_file(&config.map_path)
        .with_context(|| format!("failed to load protocol map {:?}", config.map_path))?;
    let bundle = Bundle::from_json_file(&config.bundle_path)
        .with_context(|| format!("failed to load bundle {:?}", config.bundle_path))?;

    let mut engine = ProtocolEngine::new(config.engine_options(), Box::new(map));
    let report = engine
        .load(&bundle, config.custom_dir.as_deref())
        .context("failed to load definitions")?;

    component_info!(
        "load",
        "Loaded {} definitions ({} skipped, {} failed)",
        report.registered,
        report.skipped,
        report.failed
    );
    if report.failed > 0 {
        component_warn!("load", "{} definitions failed to load", report.failed);
    }
    Ok(engine)
}

fn execute(engine: &mut ProtocolEngine, command: &Command) -> Result<String> {
    match command {
        Command::List => Ok(list(engine)),
        Command::Resolve { id, version } => {
            let resolved = engine.resolve(id.parse::<Identifier>()?, (*version).into())?;
            let def = &resolved.definition;
            Ok(format!(
                "{} opcode={} version={} latest={} origin={} platform={} permissions={}",
                resolved.name,
                resolved.code,
                resolved.version,
                resolved
                    .latest_version
                    .map_or_else(|| "-".to_string(), |v| v.to_string()),
                def.origin,
                def.platform.map_or("any", |p| p.as_str()),
                permission_flags(def.permissions)
            ))
        }
        Command::Decode { id, hex, version } => {
            let bytes = decode_hex(hex)?;
            let value = engine.parse_message(
                id.parse::<Identifier>()?,
                VersionRequest::from(*version),
                &bytes,
            )?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        Command::Encode { id, json, version } => {
            let data: Value = serde_json::from_str(json).context("invalid JSON data")?;
            let bytes = engine.write_message(
                id.parse::<Identifier>()?,
                VersionRequest::from(*version),
                Some(&data),
            )?;
            Ok(encode_hex(&bytes))
        }
        Command::Frame { hex } => {
            let bytes = decode_hex(hex)?;
            let (resolved, value) = engine.parse_frame(&bytes)?;
            component_debug!(
                "cli",
                "Frame opcode {} decoded as {}.{}",
                resolved.code,
                resolved.name,
                resolved.version
            );
            Ok(format!(
                "{}.{}\n{}",
                resolved.name,
                resolved.version,
                serde_json::to_string_pretty(&value)?
            ))
        }
    }
}

fn list(engine: &ProtocolEngine) -> String {
    let registry = engine.registry();
    let mut out = String::new();
    for name in registry.names() {
        let code = engine
            .map()
            .code(&name)
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        for version in registry.versions(&name) {
            if let Some(def) = registry.get(&name, version) {
                let _ = writeln!(
                    out,
                    "{:<32} {:>6} v{:<4} {:<8} {}",
                    name,
                    code,
                    version,
                    def.origin,
                    permission_flags(def.permissions)
                );
            }
        }
    }
    out.trim_end().to_string()
}

fn permission_flags(permissions: Permissions) -> &'static str {
    match (
        permissions.contains(Permissions::READABLE),
        permissions.contains(Permissions::WRITEABLE),
    ) {
        (true, true) => "rw",
        (true, false) => "r-",
        (false, true) => "-w",
        (false, false) => "--",
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    let digits = digits
        .strip_prefix(b"0x".as_slice())
        .unwrap_or(digits.as_slice());
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("hex input is not ASCII")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("invalid hex byte '{}'", pair))
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
