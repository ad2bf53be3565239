fn main() {
    if let Err(err) = turnstile_tracker::app::run() {
        eprintln!("api startup failed: {err}");
        std::process::exit(1);
    }
}
