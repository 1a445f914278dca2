use clap::{Command, arg, crate_version};

pub fn cli() -> Command {
    Command::new("lector")
        .about("Connectivity and mode orchestration daemon for an assistive reading device")
        .version(crate_version!())
        .arg(
            arg!(--config <path>)
                .short('c')
                .required(false)
                .help("Path to the config file"),
        )
        .subcommand(Command::new("status").about("Probe connectivity once and print the result"))
        .subcommand(Command::new("scan").about("List visible SSIDs and exit"))
        .subcommand(
            Command::new("connect")
                .about("Attempt one connect and print the outcome")
                .arg(arg!(<ssid> "Network name"))
                .arg(arg!(--password <password>).required(false))
                .arg(arg!(--hidden "Target a hidden network")),
        )
}
