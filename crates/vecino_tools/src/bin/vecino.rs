#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal, Read};

use vecino_tools::loyalty_cli::{execute_loyalty_command, hash_password_command, USAGE};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let subcommand = args.first().ok_or_else(|| USAGE.to_string())?.as_str();
    let output = if subcommand == "hash-password" {
        hash_password_command(&read_password()?)?
    } else {
        execute_loyalty_command(subcommand, &args[1..])?
    };
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn read_password() -> Result<String, String> {
    if io::stdin().is_terminal() {
        rpassword::prompt_password("Password:").map_err(|e| e.to_string())
    } else {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| e.to_string())?;
        Ok(input.trim_end_matches(['\r', '\n']).to_string())
    }
}
