fn main() {
    if let Err(err) = fitvoice_lib::run() {
        eprintln!("fitvoice: {err:#}");
        std::process::exit(1);
    }
}
