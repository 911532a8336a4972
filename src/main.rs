mod config;
mod process;
mod unix;

use clap::{App, Arg};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("LAUNCHER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() {
    let matches = App::new("launcher")
        .version(clap::crate_version!())
        .author("huangyuhui <i@huangyuhui.net>")
        .about(
            "launcher pulls, builds and brings up a ROS 2 workspace.

            Steps (source sync, build) run one after another, then every process is
            started in order. The last process runs in the foreground: its exit code
            becomes the launcher's, after all background processes have exited too.

            To run the built-in plan:

                $ launcher

            To run a plan from a file, passing extra arguments to the foreground node:

                $ launcher -f <plan-toml> -- --save map1

            Log verbosity is taken from LAUNCHER_LOG (default \"info\").
            ",
        )
        .arg(Arg::with_name("file").short("f").long("file").takes_value(true).help("a toml file describing the launch plan"))
        .arg(Arg::with_name("config").short("c").long("config").takes_value(true).help("pass toml launch plan in command line"))
        .arg(Arg::with_name("dry-run").long("dry-run").help("print the resolved plan and exit"))
        .arg(Arg::with_name("args").multiple(true).last(true).help("extra arguments for the foreground process"))
        .get_matches();

    init_logging();

    if matches.value_of("file").is_some() && matches.value_of("config").is_some() {
        eprintln!("Options --file and --config must not appear together.");
        std::process::exit(1)
    }

    let config = if let Some(file) = matches.value_of("file") {
        match std::fs::read_to_string(file) {
            Ok(raw_config) => parse_or_exit(&raw_config),
            Err(err) => {
                eprintln!("Failed to read configuration file {}: {}", file, err);
                std::process::exit(1)
            }
        }
    } else if let Some(raw_config) = matches.value_of("config") {
        parse_or_exit(raw_config)
    } else {
        config::Config::default()
    };

    let args: Vec<String> = matches
        .values_of("args")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    if matches.is_present("dry-run") {
        if let Err(err) = unix::validate(&config) {
            eprintln!("Invalid launch plan: {}", err);
            std::process::exit(1)
        }
        print!("{}", config);
        if !args.is_empty() {
            println!("foreground args: {}", args.join(" "));
        }
        std::process::exit(0)
    }

    if cfg!(unix) {
        unix::run(&config, args);
    } else {
        eprintln!("Unsupported operating system");
        std::process::exit(1);
    }
}

fn parse_or_exit(raw_config: &str) -> config::Config {
    match config::Config::parse(raw_config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration unparsable: {}", err);
            std::process::exit(1)
        }
    }
}
