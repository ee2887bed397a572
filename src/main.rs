#[tokio::main]
async fn main() {
    arena_bracket::run().await;
}
