// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .default_value("walletpass.toml")
        .help("Configuration file")
}

/// Common argument: output file
fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("PATH")
        .help("Output file (default: <serial>.pkpass)")
}

/// Common argument: authentication token
fn auth_arg() -> Arg {
    Arg::new("auth")
        .short('a')
        .long("auth")
        .required(true)
        .help("Authentication token, bare or as `ApplePass <token>`")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(clap::ArgAction::SetTrue)
        .help("Output as JSON")
}

fn build_cli() -> Command {
    Command::new("walletpass")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Walletpass Contributors")
        .about("Assemble, sign and verify wallet pass packages")
        .subcommand_required(false)
        .arg(config_arg())
        .subcommand(
            Command::new("generate")
                .about("Build a single package without touching pass state")
                .arg(Arg::new("name").short('n').long("name").default_value("Customer").help("Card holder name"))
                .arg(Arg::new("serial").short('s').long("serial").help("Serial number (generated when omitted)"))
                .arg(Arg::new("balance").short('b').long("balance").default_value("0").help("Balance shown on the card"))
                .arg(Arg::new("token").long("token").help("Authentication token embedded in the pass"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("issue")
                .about("Issue a new pass and record it in the state store")
                .arg(Arg::new("name").default_value("Customer").help("Card holder name"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("register")
                .about("Register a device for updates to a pass")
                .arg(Arg::new("serial").required(true).help("Pass serial number"))
                .arg(Arg::new("device").required(true).help("Device library identifier"))
                .arg(Arg::new("push_token").required(true).help("Push token for the device"))
                .arg(auth_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch the latest version of a pass")
                .arg(Arg::new("serial").required(true).help("Pass serial number"))
                .arg(auth_arg())
                .arg(
                    Arg::new("if_modified_since")
                        .long("if-modified-since")
                        .help("Only fetch if changed since this HTTP date"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("balance")
                .about("Set the balance shown on a pass")
                .arg(Arg::new("serial").required(true).help("Pass serial number"))
                .arg(Arg::new("balance").required(true).help("New balance")),
        )
        .subcommand(
            Command::new("inspect")
                .about("List the entries of a package")
                .arg(Arg::new("package").required(true).help("Package file"))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify manifest digests and the signature of a package")
                .arg(Arg::new("package").required(true).help("Package file"))
                .arg(
                    Arg::new("public_key")
                        .long("public-key")
                        .help("PEM public key, certificate or private key for raw signatures"),
                )
                .arg(
                    Arg::new("certificate")
                        .long("certificate")
                        .help("Require the detached signer to be this PEM certificate"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(["detached", "raw"])
                        .help("Expected signature form; detected when omitted"),
                )
                .arg(json_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("walletpass.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
