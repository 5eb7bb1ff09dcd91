fn main() -> anyhow::Result<()> {
    broccoli::cli::run_cli()
}
