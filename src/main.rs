use clap::Parser;
use miette::Result;
use reptracker::cli::{Cli, Commands};
use reptracker::core::{logging, Config};

fn main() -> Result<()> {
    // Terminate quietly on a closed pipe (`reptracker search | head`)
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    if let Commands::Completions(args) = cli.command {
        return reptracker::cli::commands::completions::run(args);
    }

    let mut config = Config::load()?;
    if let Some(db) = &global.db {
        config.database = Some(db.clone());
    }
    logging::init(global.verbose, config.log_level.as_deref());

    match cli.command {
        Commands::Init(args) => reptracker::cli::commands::init::run(args, &global, &config),
        Commands::Search(args) => reptracker::cli::commands::search::run(args, &global, &config),
        Commands::Order(args) => reptracker::cli::commands::order::run(args, &global, &config),
        Commands::Coldhead(cmd) => reptracker::cli::commands::coldhead::run(cmd, &global, &config),
        Commands::Displacer(cmd) => {
            reptracker::cli::commands::displacer::run(cmd, &global, &config)
        }
        Commands::Wip(cmd) => reptracker::cli::commands::wip::run(cmd, &global, &config),
        Commands::Test(cmd) => reptracker::cli::commands::test::run(cmd, &global, &config),
        Commands::Completions(args) => reptracker::cli::commands::completions::run(args),
    }
}
