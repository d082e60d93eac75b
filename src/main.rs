use anyhow::Context as _;

fn main() -> anyhow::Result<()> {
    sirlabor::runner::run_with_args().context("simulation failed")?;
    Ok(())
}
