fn main() {
    if let Err(err) = show_vault_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
