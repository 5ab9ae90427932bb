use clap::Parser;

use action_graph::compile::Compiler;
use action_graph::config::CompilerConfig;
use action_graph::query::{Query, QueryEngine};

const YALE: &str = "
# Yale shooting problem
initially alive
initially ~loaded
Load causes loaded
Shoot causes ~alive if loaded
Shoot causes ~loaded
Load lasts 1
Shoot lasts 2
";

const YALE_QUERIES: [&str; 4] = [
    "necessary ~alive after Load, Shoot",
    "possibly ~alive after Shoot",
    "necessary executable Load, Shoot with cost 3 from alive and ~loaded",
    "necessary ~alive after Shoot from alive",
];

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Program file (statements separated by newlines or `;`). Defaults to the Yale shooting domain.
    #[arg(value_name = "FILE")]
    program: Option<std::path::PathBuf>,

    /// Query to answer; may be repeated.
    #[clap(short, long = "query", value_name = "QUERY")]
    queries: Vec<String>,

    /// Duration of actions without a `lasts` statement.
    #[clap(long, value_name = "INT", default_value = "0")]
    default_duration: u64,

    /// Print the compiled graph.
    #[clap(long)]
    show: bool,

    /// Enable debug logging.
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = if args.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let program = match &args.program {
        Some(path) => std::fs::read_to_string(path)?,
        None => YALE.to_string(),
    };
    let queries: Vec<String> = if args.queries.is_empty() && args.program.is_none() {
        YALE_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        args.queries.clone()
    };

    let config = CompilerConfig::default().with_default_duration(args.default_duration);
    let mut compiler = Compiler::new(config);
    let graph = compiler.compile_program(&program)?;
    log::info!(
        "compiled {} states, {} edges ({} initial, {} ending)",
        graph.states().len(),
        graph.edges().len(),
        graph.initial_states().len(),
        graph.ending_states().len()
    );

    if args.show {
        print!("{}", graph);
    }

    let engine = QueryEngine::new(&graph);
    for text in &queries {
        let query: Query = text.parse()?;
        let outcome = engine.answer(&query)?;
        match outcome.min_cost {
            Some(cost) => println!("{} => {} (min cost {})", query, outcome.holds, cost),
            None => println!("{} => {}", query, outcome.holds),
        }
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
