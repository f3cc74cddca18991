//! Command-line shell: argument parsing only, no interactive REPL — this
//! gateway's product surface is the WebSocket endpoint, not a console.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Reference host application for rpc-core")]
pub struct Args {
    /// TCP port to listen on. `0` asks the OS for an ephemeral port.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Maximum simultaneous connections the `/rpc` endpoint admits.
    #[arg(long, default_value_t = 16)]
    pub max_conns: usize,

    /// Don't launch a browser pointed at the UI after startup.
    #[arg(long)]
    pub no_browser: bool,

    /// Run without any UI-facing side effects (implies `--no-browser`).
    #[arg(long)]
    pub headless: bool,
}

impl Args {
    pub fn should_launch_browser(&self) -> bool {
        !self.no_browser && !self.headless
    }
}
