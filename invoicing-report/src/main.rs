fn main() {
    if let Err(err) = zaptec_charge_report::app::run_invoicing() {
        eprintln!("invoicing report failed: {err}");
        std::process::exit(1);
    }
}
