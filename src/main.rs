//! Entry point: initialize logging, build the shared proxy state, and run
//! every listener until a shutdown signal arrives.

use std::process::ExitCode as ProcessExitCode;

use tracing_subscriber::EnvFilter;

use latency_space::{ExitCode, Proxy};

#[tokio::main]
async fn main() -> ProcessExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let proxy = match Proxy::init() {
        Ok(proxy) => proxy,
        Err(code) => return to_process_exit_code(code),
    };

    to_process_exit_code(proxy.run().await)
}

fn to_process_exit_code(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code as u8)
}
