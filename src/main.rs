#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    soundpalette_lib::run().await
}
