use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_init;
mod cmd_dump;
mod cmd_persist;
mod cmd_pictures;
mod cmd_resave;

fn init_logger() {
    // RUST_LOG wins; default is info.
    // Example: RUST_LOG=debug pptstore dump --path deck/
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let password = cli.password;
    match cli.cmd {
        cli::Cmd::Init { path } => cmd_init::exec(path),

        cli::Cmd::Dump { path, json, depth } => cmd_dump::exec(path, password, json, depth),

        cli::Cmd::Persist { path, json } => cmd_persist::exec(path, password, json),

        cli::Cmd::Pictures { path, json, extract } => {
            cmd_pictures::exec(path, password, json, extract)
        }

        cli::Cmd::Resave { path, out, normalize } => {
            cmd_resave::exec_resave(path, out, password, normalize)
        }

        cli::Cmd::Encrypt { path, out, new_password } => {
            cmd_resave::exec_encrypt(path, out, password, new_password)
        }

        cli::Cmd::Decrypt { path, out } => cmd_resave::exec_decrypt(path, out, password),
    }
}
