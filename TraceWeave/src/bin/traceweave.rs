fn main() -> anyhow::Result<()> {
    traceweave::cli::run_cli()
}
