use clap::Parser;
use loxpp::Lox;

#[derive(Parser, Debug)]
#[command(name = "loxpp", about = "Tree-walking interpreter for the loxpp language")]
struct Args {
    /// Execute a script from the given file path
    #[arg(short, long)]
    file: Option<String>,

    /// Drop into the interactive prompt after running the script
    #[arg(short)]
    interactive: bool,

    /// Print the parsed arguments before running
    #[arg(short)]
    verbose: bool,

    /// Dump tokens and the AST while running
    #[arg(short = 'D')]
    debug: bool,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    if args.verbose {
        eprintln!("{args:?}");
    }

    let mut lox = Lox::new();
    match &args.file {
        Some(path) => {
            let errors = lox.run_file(path)?;

            if args.interactive {
                lox.run_prompt()?;
            } else if errors > 0 {
                std::process::exit(65);
            }
        }
        None => lox.run_prompt()?,
    }

    Ok(())
}
