// scriptty: step-through debugger for transaction scripts

use std::process::ExitCode;

use clap::Parser;

use scriptty::cli::{Cli, Command, InputArgs};
use scriptty::error::DebuggerError;
use scriptty::launch;
use scriptty::logging::{init_logger, LogTarget};
use scriptty::resolver::EsploraClient;
use scriptty::ui::{with_terminal, App, InputSummary};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version requests are not failures
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DebuggerError> {
    match cli.command {
        Command::Execute(args) => {
            init_logger(cli.log_file.map_or(LogTarget::Stderr, LogTarget::File))?;
            let client = EsploraClient::new(&args.rpc_server, args.timeout());
            launch::execute(&client, &args.request(), args.flags())?;
            println!("Success!!!");
            Ok(())
        }
        Command::Debug(args) => {
            // The TUI owns the terminal, so logs only go to a file
            init_logger(cli.log_file.map_or(LogTarget::Discard, LogTarget::File))?;
            debug(&args)
        }
    }
}

fn debug(args: &InputArgs) -> Result<(), DebuggerError> {
    let client = EsploraClient::new(&args.rpc_server, args.timeout());

    // Resolve everything before touching the terminal
    let prepared = launch::prepare_session(&client, &args.request(), args.flags())?;
    let summary = InputSummary::from_input(&prepared.input);

    let mut app = App::new(prepared.session, summary);
    with_terminal(|terminal| app.run(terminal))
}
