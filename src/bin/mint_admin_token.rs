//! Prints an admin bearer token signed with `JWT_SECRET`.
//!
//! Usage: `mint_admin_token [subject] [hours]` (defaults: `admin`, 12).

use feedback_manager::auth::{AuthKeys, Role};
use feedback_manager::AppConfig;

fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    let cfg = AppConfig::from_env()?;
    let mut args = std::env::args().skip(1);
    let subject = args.next().unwrap_or_else(|| "admin".to_string());
    let hours: i64 = match args.next() {
        Some(h) => h.parse().map_err(|_| anyhow::anyhow!("hours must be an integer, got {h:?}"))?,
        None => 12,
    };
    let token = AuthKeys::new(cfg.jwt_secret.as_bytes()).create_jwt(&subject, vec![Role::Admin], hours)?;
    println!("{token}");
    Ok(())
}
