fn main() {
    if let Err(e) = pipewright::run() {
        std::process::exit(pipewright::report(&e));
    }
}
