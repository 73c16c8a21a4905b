use std::env;

use anyhow::Context;
use nova_apns_legacy::{
    pack_hex_token, push_notification, read_feedback, ApnsConfig, Credential, Notification,
    TlsConnector,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nova_apns_legacy=info".parse().expect("valid directive")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    dotenvy::dotenv().ok();
    let config = ApnsConfig::from_env()?;
    let credential = Credential::from_config(&config)
        .with_context(|| format!("failed to load credential from {}", config.credential_path))?;
    let connector = TlsConnector::from_config(&config)?;

    info!(
        population = %credential.population(),
        subject = %credential.subject(),
        "Configuration loaded"
    );

    match args[1].as_str() {
        "push" if args.len() == 4 => {
            let token = pack_hex_token(&args[2])?;
            let notification = Notification::new(token, args[3].as_bytes());
            if !notification.is_valid() {
                anyhow::bail!("payload is {} bytes, limit is 256", notification.payload.len());
            }
            let summary = push_notification(&connector, &credential, notification).await?;
            println!("Sent {} notification(s)", summary.sent);
        }
        "feedback" if args.len() == 2 => {
            let records = read_feedback(&connector, &credential).await?;
            for record in &records {
                println!(
                    "{} {}",
                    record.rejected_at.to_rfc3339(),
                    hex::encode(&record.device_token)
                );
            }
            println!("Read {} feedback record(s)", records.len());
        }
        _ => usage(),
    }

    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  apns-cli push <hex_device_token> <json_payload>");
    eprintln!("  apns-cli feedback");
    eprintln!();
    eprintln!("Environment: APNS_CREDENTIAL_PATH, APNS_CERTIFICATE_PASSPHRASE, APNS_CA_BUNDLE_PATH, APNS_CONNECT_TIMEOUT_SECS");
    std::process::exit(1);
}
