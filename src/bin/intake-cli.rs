use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};

#[derive(Parser)]
#[command(name = "intake-cli")]
#[command(about = "Command-line client for the photo intake service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one file
    Upload {
        /// File to send
        file: PathBuf,

        /// Declared MIME type (guessed from the extension when omitted)
        #[arg(short, long)]
        mime: Option<String>,

        /// Multipart field name
        #[arg(short, long, default_value = "photo")]
        field: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Upload { file, mime, field } => {
            let data = tokio::fs::read(&file).await?;
            let mime = match mime.or_else(|| guess_mime(&file).map(str::to_owned)) {
                Some(mime) => mime,
                None => return Err("cannot guess the MIME type, pass --mime".into()),
            };
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let part = Part::bytes(data).file_name(file_name).mime_str(&mime)?;
            let form = Form::new().part(field, part);

            let res = client
                .post(format!("{}/upload", cli.url.trim_end_matches('/')))
                .multipart(form)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let remaining = res
        .headers()
        .get("ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = res.text().await?;

    println!("{} {}", status.as_u16(), body);
    if let Some(remaining) = remaining {
        println!("requests remaining in window: {}", remaining);
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
