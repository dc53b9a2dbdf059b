use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coffee_gate::init_tracing();
    coffee_gate::run_coffee_gate().await
}
