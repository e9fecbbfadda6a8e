use std::process;

fn main() {
    if let Err(err) = castleguard::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
