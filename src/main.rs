fn main() {
    if let Err(err) = zaptec_charge_report::app::run() {
        eprintln!("charge report failed: {err}");
        std::process::exit(1);
    }
}
