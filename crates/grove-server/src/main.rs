use grove_server::{ServerBuilder, init_tracing};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let builder = match ServerBuilder::from_env() {
        Ok(builder) => builder,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = builder.run().await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}
