use clap::{Parser, Subcommand};

mod cmd;

/// Tax return analysis: liabilities, page triage and multi-year summaries
#[derive(Parser, Debug)]
#[command(name = "taxlens", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the tax liability on a taxable income
    Calc(cmd::calc::CalcCommand),
    /// Choose which pages of a classified document to extract
    Triage(cmd::triage::TriageCommand),
    /// Summarise extracted returns across years
    Summary(cmd::summary::SummaryCommand),
    /// Print expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Calc(command) => command.exec(),
        Command::Triage(command) => command.exec(),
        Command::Summary(command) => command.exec(),
        Command::Schema(command) => command.exec(),
    }
}
