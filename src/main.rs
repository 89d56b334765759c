fn main() {
    #[cfg(feature = "cli")]
    oxipatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("oxipatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
