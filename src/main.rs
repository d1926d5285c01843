fn main() {
    if let Err(err) = smart_indexer::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
