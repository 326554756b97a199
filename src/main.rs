use clap::{arg, command, value_parser, Command};
use fdm_lesc::{d2, d3};
use rayon::ThreadPoolBuilder;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = command!()
        .arg(
            arg!(
                -d --dimensions <DIMENSIONS> "Sets the dimension of the simulation: 2 or 3"
            )
            .required(true)
            .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(
                -n --number_of_threads <NUMBER_OF_THREADS> "Sets the number of threads: 1, 2, 4, 8, 16 or 32"
            )
            .required(true)
            .value_parser(value_parser!(usize)),
        )
        .subcommand(
            Command::new("run")
                .about("Runs the simulation")
                .arg(
                    arg!(
                        -b --benchmark "Runs the benchmark"
                    )
                    .required(false),
                ),
        )
        .get_matches();

    if let Some(&num_threads) = matches.get_one::<usize>("number_of_threads") {
        if let Err(e) = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            eprintln!("Error while building the thread pool: {e}.");
            std::process::exit(1);
        }
    }

    if let Some(("run", sub_matches)) = matches.subcommand() {
        let benchmark = sub_matches.get_flag("benchmark");
        if let Some(dimensions) = matches.get_one::<usize>("dimensions") {
            let result = match (dimensions, benchmark) {
                (2, false) => d2::run(),
                (2, true) => d2::run_benchmark(),
                (3, false) => d3::run(),
                (3, true) => d3::run_benchmark(),
                _ => {
                    eprintln!(
                        "Error: the number of dimensions {dimensions} is not valid. Please, use 2 or 3."
                    );
                    std::process::exit(1);
                }
            };
            if let Err(e) = result {
                eprintln!("Error: {e:#}.");
                std::process::exit(1);
            }
        }
    }
}
