fn main() -> anyhow::Result<()> {
    aquatracker::cli::run()
}
