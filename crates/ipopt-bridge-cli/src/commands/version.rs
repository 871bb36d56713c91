use anyhow::Result;

#[cfg(feature = "native")]
pub fn handle() -> Result<()> {
    println!(
        "ipopt-bridge {} (IPOPT {})",
        env!("CARGO_PKG_VERSION"),
        ipopt_bridge::Ipopt::version()
    );
    Ok(())
}

#[cfg(not(feature = "native"))]
pub fn handle() -> Result<()> {
    println!("ipopt-bridge {}", env!("CARGO_PKG_VERSION"));
    tracing::error!("IPOPT is not available - this binary was built without the `native` feature");
    anyhow::bail!("no native solver linked")
}
