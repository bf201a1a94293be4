use clap::Parser;

mod action;
mod cli;
mod connect;
mod debug;
mod dispatch;
mod group;
mod hexdump;
mod number;
mod options;
mod report;

fn main() -> anyhow::Result<()> {
    let args = cli::CliArgs::parse();
    args.debug.init_logging();

    let options = args.decode();
    let verbose = args.debug.debug > 0;

    if verbose {
        println!("========================");
        println!("CAPAROC Commander");
        println!("========================");
        println!("Connecting to {}", options.connection.target());
        println!();
        println!("Command Line Options:");
        println!("{}", options);
    }

    let mut device = options.connection.open(&args.debug)?;

    if verbose {
        println!("Connected successfully!");
        println!();
    }

    let stdout = std::io::stdout();
    dispatch::Dispatcher::new(&options, device.as_mut(), stdout.lock()).run()?;

    Ok(())
}
