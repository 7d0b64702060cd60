//! Command-line surface

use crate::engine::ScriptFlags;
use crate::resolver::esplora::DEFAULT_ENDPOINT;
use crate::resolver::InputRequest;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "scriptty",
    version,
    about = "Step-through debugger for transaction scripts",
    disable_version_flag = true
)]
pub struct Cli {
    /// Print the version number and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Write log events to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enter the script debugging mode
    Debug(InputArgs),
    /// Execute a script, print the result and exit
    Execute(InputArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// The full transaction hex or a txid. A txid is looked up on the server.
    #[arg(short = 't', long = "tx", value_name = "HEX|TXID")]
    pub transaction: String,

    /// The input index to debug
    #[arg(short = 'i', long = "idx", default_value_t = 0, value_name = "N")]
    pub input_index: usize,

    /// The amount of the input in satoshis. Looked up on the server when
    /// omitted or zero.
    #[arg(short = 'a', long = "amt", value_name = "SATS")]
    pub amount: Option<u64>,

    /// The locking script of the spent output. Looked up on the server when
    /// omitted.
    #[arg(short = 's', long = "pkscript", value_name = "HEX")]
    pub locking_script: Option<String>,

    /// Esplora API used to fetch anything not given on the command line
    #[arg(long = "rpcserver", default_value = DEFAULT_ENDPOINT, value_name = "URL")]
    pub rpc_server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    pub timeout: u64,

    /// Verify signatures over the fork-id digest, which commits to the amount
    #[arg(long)]
    pub forkid: bool,
}

impl InputArgs {
    pub fn request(&self) -> InputRequest {
        InputRequest {
            transaction: self.transaction.clone(),
            input_index: self.input_index,
            amount: self.amount,
            locking_script: self.locking_script.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn flags(&self) -> ScriptFlags {
        ScriptFlags {
            sighash_forkid: self.forkid,
            ..ScriptFlags::STANDARD
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_debug_defaults() {
        let cli = Cli::try_parse_from(["scriptty", "debug", "-t", "0100"]).unwrap();
        let Command::Debug(args) = cli.command else {
            panic!("expected debug command");
        };
        assert_eq!(args.input_index, 0);
        assert_eq!(args.amount, None);
        assert_eq!(args.rpc_server, DEFAULT_ENDPOINT);
        assert_eq!(args.timeout(), Duration::from_secs(10));
        assert_eq!(args.flags(), ScriptFlags::STANDARD);
    }

    #[test]
    fn test_execute_with_all_options() {
        let cli = Cli::try_parse_from([
            "scriptty",
            "--log-file",
            "out.log",
            "execute",
            "--tx",
            "0100",
            "--idx",
            "2",
            "--amt",
            "5000",
            "--pkscript",
            "51",
            "--rpcserver",
            "http://localhost:3000",
            "--timeout",
            "3",
            "--forkid",
        ])
        .unwrap();

        assert_eq!(cli.log_file, Some(PathBuf::from("out.log")));
        let Command::Execute(args) = cli.command else {
            panic!("expected execute command");
        };
        let request = args.request();
        assert_eq!(request.input_index, 2);
        assert_eq!(request.amount, Some(5000));
        assert_eq!(request.locking_script.as_deref(), Some("51"));
        assert_eq!(args.rpc_server, "http://localhost:3000");
        assert!(args.flags().sighash_forkid);
    }

    #[test]
    fn test_transaction_is_required() {
        assert!(Cli::try_parse_from(["scriptty", "execute"]).is_err());
    }
}
