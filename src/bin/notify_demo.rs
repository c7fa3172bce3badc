//! Demo that pushes a success and a failure event through the multiplexer
//! (log only when no channel is configured).

use bean_crawler::NotifierMux;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();
    let mux = NotifierMux::from_env();

    mux.notify_success("demo", "Demo Roasters", 12, 3.4).await;
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    mux.notify_failure("demo", "Demo Roasters", "HTTP 503 from https://demo.example/beans")
        .await;

    println!("notify-demo done");
}
