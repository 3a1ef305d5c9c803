#![forbid(unsafe_code)]

use vecino_engines::credentials::{hash_password, CredentialConfig};
use vecino_engines::loyalty::{LoyaltyConfig, LoyaltyRuntime};
use vecino_kernel_contracts::loyalty::DEFAULT_TIER_BAND_WIDTH;

pub const USAGE: &str =
    "usage: vecino <tiers [band_width]|progress <points> [band_width]|hash-password>";

/// Runs a read-only loyalty command and returns the text to print.
pub fn execute_loyalty_command(subcommand: &str, args: &[String]) -> Result<String, String> {
    match subcommand {
        "tiers" => {
            let runtime = runtime_for(args.first().map(String::as_str))?;
            Ok(render_tiers(&runtime))
        }
        "progress" => {
            let raw = args
                .first()
                .ok_or_else(|| "usage: vecino progress <points> [band_width]".to_string())?;
            let points = parse_points(raw)?;
            let runtime = runtime_for(args.get(1).map(String::as_str))?;
            Ok(render_progress(&runtime, points))
        }
        _ => Err(format!(
            "unknown subcommand: {subcommand}. expected one of: tiers, progress, hash-password"
        )),
    }
}

/// Hash in the stored credential format, for seeding operator fixtures.
pub fn hash_password_command(password: &str) -> Result<String, String> {
    if password.trim().is_empty() {
        return Err("password must not be empty".to_string());
    }
    Ok(hash_password(password, CredentialConfig::mvp_v1()))
}

fn parse_points(raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("points must be a non-negative integer, got '{raw}'"))
}

fn runtime_for(band_width: Option<&str>) -> Result<LoyaltyRuntime, String> {
    let band_width = match band_width {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("band width must be a positive integer, got '{raw}'"))?,
        None => DEFAULT_TIER_BAND_WIDTH,
    };
    LoyaltyRuntime::new(LoyaltyConfig::with_band_width(band_width)).map_err(|e| e.to_string())
}

fn render_tiers(runtime: &LoyaltyRuntime) -> String {
    runtime
        .table()
        .bands()
        .iter()
        .map(|band| format!("{:>6}  {}", band.floor, band.code.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_progress(runtime: &LoyaltyRuntime, points: u64) -> String {
    let progress = runtime.progress(points);
    let mut out = format!(
        "points={} tier={} percent={}",
        progress.points,
        progress.tier.display_name(),
        progress.percent
    );
    match progress.next_tier {
        Some(next) => out.push_str(&format!(
            " next={} remaining={}",
            next.display_name(),
            progress.points_remaining
        )),
        None => out.push_str(" next=-"),
    }
    out
}
