use std::process;

fn main() {
    env_logger::init();
    if let Err(err) = six::run(std::env::args_os()) {
        eprintln!("{}: {err}", six::PROG_NAME);
        process::exit(1);
    }
}
