fn main() {
    if let Err(err) = zaptec_charge_report::app::run_summary() {
        eprintln!("summary report failed: {err}");
        std::process::exit(1);
    }
}
