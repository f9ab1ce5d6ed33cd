//! Version command

/// Run the version command.
pub fn run() {
    println!("vagrantp {}", env!("CARGO_PKG_VERSION"));
}
