fn main() -> anyhow::Result<()> {
    nepomuk_cli::run()
}
