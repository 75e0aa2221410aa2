//! Main application entry point.

fn main() {
    env_logger::init();
    log::info!("Starting Web Marker");

    if let Err(error) = webmarker_app::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
