use stress_test::{stress_test_convergence, stress_test_scaling};
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            CONVERGENCE STRESS TESTS                         ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut all_converged = true;

    // Test 1: few participants, frequent relays
    let stats = stress_test_convergence(3, 100, 10).await?;
    stats.print();
    all_converged &= stats.converged;

    // Test 2: few participants, long offline stretches
    let stats = stress_test_convergence(3, 200, 150).await?;
    stats.print();
    all_converged &= stats.converged;

    // Test 3: more participants
    let stats = stress_test_convergence(8, 250, 50).await?;
    stats.print();
    all_converged &= stats.converged;

    // Test 4: scaling analysis
    all_converged &= stress_test_scaling(12, 4).await?;

    if !all_converged {
        return Err("replicas diverged".into());
    }
    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
