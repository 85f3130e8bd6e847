#![forbid(unsafe_code)]

//! stb: statusboard daemon entry point. No flags; configuration comes from
//! `$STB_CONFIG` or `~/.config/statusboard/config.toml`.

use statusboard::core::config::Config;
use statusboard::core::errors::Result;
use statusboard::daemon::loop_main::run_on_hardware;

fn main() {
    if let Err(e) = run() {
        eprintln!("stb: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Config::load_from_env()?;
    if !run_on_hardware(config)? {
        eprintln!("stb: shutdown did not complete cleanly");
    }
    Ok(())
}
