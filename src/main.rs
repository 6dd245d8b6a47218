mod logging;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use sbproxy_config::{load_config, Config};
use sbproxy_remote::protocol::ReturnStatus;
use sbproxy_remote::{debugger, Session};
use sbproxy_rpc::{Connection, PipeCallInvoker};

/// Connect to the remote debugger, bootstrap it, run one command and
/// release everything again.
fn run_session(address_override: Option<String>) -> Result<()> {
    let config_dir = logging::default_config_dir();
    let project_dir = env::current_dir().ok();
    let loaded = load_config(&config_dir, project_dir.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(logging::default_log_file_path);
    logging::init(&log_path, config.log.level)?;
    if let Err(e) = loaded {
        error!("config load failed, using defaults: {}", e);
    }

    let address = address_override.unwrap_or_else(|| config.connection.address.clone());
    info!(%address, channels = config.connection.channel_count, "connecting");
    // Channels are dialled by the first call; the bootstrap call below
    // waits for the server when `wait_for_ready` is set.
    let invoker = PipeCallInvoker::connect_tcp(address.as_str(), config.connection.channel_count)
        .with_context(|| format!("invalid server address {address}"))?;

    let connection = Connection::new(Arc::new(invoker), &config.connection);
    connection.set_rpc_error_handler(Box::new(|method, err| {
        warn!(method, code = %err.code(), "remote call failed");
    }));
    let session = Session::new(connection);

    let debugger = debugger::create(
        &session,
        config.debugger.source_init_files,
        config.connection.bootstrap_deadline(),
        config.connection.wait_for_ready,
    )
    .context("remote debugger did not start")?;

    debugger.set_async(config.debugger.async_mode);
    for entry in &config.debugger.log_channels {
        if !debugger.enable_log(&entry.channel, &entry.categories) {
            warn!(channel = %entry.channel, "could not enable debugger log channel");
        }
    }
    debugger.apply_default_settings();

    let interpreter = debugger
        .command_interpreter()
        .context("remote debugger has no command interpreter")?;
    let (status, result) = interpreter.handle_command("version");
    match result {
        Some(result) if status != ReturnStatus::Invalid => {
            println!("{}", result.output().trim_end());
        }
        _ => println!("version: no result ({status:?})"),
    }

    // Release remote objects while the connection is still up.
    drop(interpreter);
    drop(debugger);
    let released = session.flush_deletions();
    info!(released, "released remote handles");
    session.shutdown();
    Ok(())
}

fn main() {
    let address = env::args().nth(1);
    if let Err(e) = run_session(address) {
        eprintln!("sbproxy: {:#}", e);
        std::process::exit(1);
    }
}
