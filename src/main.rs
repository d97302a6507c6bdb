fn main() {
    if let Err(err) = sentra::app::run() {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}
