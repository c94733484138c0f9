use securekyc_cli::{failure_lines, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        for line in failure_lines(&err) {
            eprintln!("{line}");
        }
        std::process::exit(1);
    }
}
