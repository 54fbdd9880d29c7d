use log::{error, info};

use pg_usher::app::{args, logger, server};
use pg_usher::{config, pool};

fn main() {
    let args = args::parse();

    // Configuration is loaded on a throwaway runtime; the worker runtime
    // is sized from it afterwards.
    let bootstrap = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build runtime: {err}");
            std::process::exit(exitcode::OSERR);
        }
    };
    if let Err(err) = bootstrap.block_on(config::parse(&args.config_file)) {
        eprintln!("config error: {err}");
        std::process::exit(exitcode::CONFIG);
    }
    drop(bootstrap);

    let config = config::get_config();
    logger::init_logging(&args, &config);

    if args.test_config {
        info!("Config {} is ok", args.config_file);
        std::process::exit(exitcode::OK);
    }

    config.show();
    pool::from_config();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.general.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to build runtime: {err}");
            std::process::exit(exitcode::OSERR);
        }
    };

    let code = match runtime.block_on(server::run()) {
        Ok(()) => exitcode::OK,
        Err(err) => {
            error!("fatal: {err}");
            exitcode::SOFTWARE
        }
    };

    std::process::exit(code);
}
