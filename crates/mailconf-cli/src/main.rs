//! mailconf - discover outbound SMTP settings for an e-mail address.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mailconf_cli::run().await
}
