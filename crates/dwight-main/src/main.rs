fn main() -> anyhow::Result<()> {
    dwight_cli::run()
}
