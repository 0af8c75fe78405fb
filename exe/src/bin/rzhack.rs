// SPDX-License-Identifier: GPL-2.0 OR MIT

use std::io;
use std::process;

use clap::Parser;

use rzhack_exe_lib::{init_logging, run, Cli};

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_format) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }

    let stdout = io::stdout();
    let code = match run(&cli.command, &mut stdout.lock()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };

    process::exit(code);
}
