//! `trailguard`: command-line client for the Trailguard tracking API.
//!
//! # Usage
//!
//! ```
//! trailguard --url http://localhost:5000 tourists --status emergency
//! trailguard --config ~/.config/trailguard/config.toml replay TID-1 walk.csv
//! trailguard alerts --open
//! ```

mod client;
mod subscription;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, Delivery};
use serde::Deserialize;
use subscription::{LocationSubscription, parse_track};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trailguard_core::{
  lifecycle::TrackingAlert,
  location::LocationSample,
  tourist::{GeoPoint, NewLink, TouristInfo, TouristStatus, TrackedTourist},
};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "trailguard", about = "Client for the Trailguard tracking API")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:5000).
  #[arg(long, env = "TRAILGUARD_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "TRAILGUARD_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "TRAILGUARD_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Link a digital tourist ID to a phone and start tracking.
  Link {
    blockchain_id: String,
    #[arg(long)]
    phone:        String,
    #[arg(long, allow_hyphen_values = true)]
    lat:          f64,
    #[arg(long, allow_hyphen_values = true)]
    lng:          f64,
    #[arg(long)]
    name:         Option<String>,
    #[arg(long)]
    email:        Option<String>,
    #[arg(long)]
    nationality:  Option<String>,
    #[arg(long)]
    emergency_contact: Option<String>,
  },
  /// Report a single location fix.
  Locate {
    blockchain_id: String,
    #[arg(long, allow_hyphen_values = true)]
    lat:      f64,
    #[arg(long, allow_hyphen_values = true)]
    lng:      f64,
    #[arg(long)]
    accuracy: Option<f64>,
  },
  /// List tourists whose card is still out.
  Tourists {
    #[arg(long)]
    status: Option<TouristStatus>,
  },
  /// Show one tourist with their alerts.
  Show { blockchain_id: String },
  /// Print location history, newest first.
  History {
    blockchain_id: String,
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Follow the cursor until the whole history is printed.
    #[arg(long)]
    all:   bool,
  },
  /// Return the card and stop tracking.
  Return { blockchain_id: String },
  /// List alerts, newest first.
  Alerts {
    /// Only alerts for this tourist.
    #[arg(long)]
    tourist: Option<String>,
    /// Only unacknowledged alerts.
    #[arg(long)]
    open:    bool,
    #[arg(long, default_value_t = 50)]
    limit:   usize,
  },
  /// Acknowledge an alert.
  Ack {
    alert_id: String,
    #[arg(long)]
    by:       Option<String>,
  },
  /// Feed a recorded track (`lat,lng[,accuracy]` per line) to the server.
  Replay {
    blockchain_id: String,
    file:          PathBuf,
    /// Milliseconds between samples.
    #[arg(long, default_value_t = 5_000)]
    interval_ms:   u64,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:5000".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Link {
      blockchain_id,
      phone,
      lat,
      lng,
      name,
      email,
      nationality,
      emergency_contact,
    } => {
      let input = NewLink {
        blockchain_id,
        phone_number: phone,
        tourist_info: TouristInfo { name, email, nationality, emergency_contact },
        initial_location: GeoPoint { latitude: lat, longitude: lng },
      };
      let tourist = client.link(&input).await?;
      println!("linked {} (visit {})", tourist.blockchain_id, tourist.visit_id);
    }
    Command::Locate { blockchain_id, lat, lng, accuracy } => {
      let sample = LocationSample { accuracy, ..LocationSample::at(lat, lng) };
      match client.send_location(&blockchain_id, &sample).await? {
        Delivery::Accepted(ack) if ack.applied => println!(
          "current location {:.6}, {:.6}",
          ack.current_location.latitude, ack.current_location.longitude
        ),
        Delivery::Accepted(ack) => println!(
          "stored as history entry {} (older than current location)",
          ack.entry.entry_id
        ),
        Delivery::RateLimited { retry_after } => {
          anyhow::bail!("rate limited; retry after {retry_after:?}")
        }
      }
    }
    Command::Tourists { status } => {
      let list = client.tourists(status).await?;
      println!("{} tourist(s)", list.count);
      for t in &list.tourists {
        print_tourist(t);
      }
    }
    Command::Show { blockchain_id } => {
      let details = client.tourist(&blockchain_id).await?;
      print_tourist(&details.tourist);
      for a in &details.alerts {
        print_alert(a);
      }
    }
    Command::History { blockchain_id, limit, all } => {
      let mut before = None;
      loop {
        let page = client.history(&blockchain_id, limit, before).await?;
        for e in &page.history {
          let flag = if e.out_of_order { " (late)" } else { "" };
          println!(
            "{} {:.6}, {:.6} {}{flag}",
            e.recorded_at, e.latitude, e.longitude, e.source
          );
        }
        match page.next {
          Some(next) if all && page.count > 0 => before = Some(next),
          _ => break,
        }
      }
    }
    Command::Return { blockchain_id } => {
      let ack = client.return_card(&blockchain_id).await?;
      match ack.returned_at {
        Some(at) => println!("{blockchain_id} {} at {at}", ack.status),
        None => println!("{blockchain_id} {}", ack.status),
      }
    }
    Command::Alerts { tourist, open, limit } => {
      let list = client
        .alerts(tourist.as_deref(), open.then_some(false), limit)
        .await?;
      println!("{} alert(s)", list.count);
      for a in &list.alerts {
        print_alert(a);
      }
    }
    Command::Ack { alert_id, by } => {
      let alert = client.acknowledge(&alert_id, by.as_deref()).await?;
      print_alert(&alert);
    }
    Command::Replay { blockchain_id, file, interval_ms } => {
      let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading track {}", file.display()))?;
      let track = parse_track(&raw)?;
      info!(points = track.len(), "replaying track");
      replay(&client, &blockchain_id, track, Duration::from_millis(interval_ms)).await?;
    }
  }

  Ok(())
}

/// Post every sample of `track`, stopping early on Ctrl-C.
async fn replay(
  client: &ApiClient,
  blockchain_id: &str,
  track: Vec<subscription::TrackPoint>,
  interval: Duration,
) -> Result<()> {
  let mut sub = LocationSubscription::replay(track, interval, 8);
  let (mut sent, mut skipped) = (0usize, 0usize);

  loop {
    let sample = tokio::select! {
      s = sub.next() => s,
      _ = tokio::signal::ctrl_c() => {
        sub.stop();
        None
      }
    };
    let Some(sample) = sample else { break };

    match client.send_location(blockchain_id, &sample).await? {
      Delivery::Accepted(_) => sent += 1,
      Delivery::RateLimited { retry_after } => {
        warn!(?retry_after, "sample skipped by rate limit");
        skipped += 1;
      }
    }
  }

  if sub.is_stopped() {
    println!("replay interrupted");
  }
  println!("sent {sent} sample(s), {skipped} rate limited");
  Ok(())
}

fn print_alert(a: &TrackingAlert) {
  let state = match (&a.resolved_by, a.resolved) {
    (Some(by), true) => format!("acknowledged by {by}"),
    (None, true) => "acknowledged".to_string(),
    (_, false) => "open".to_string(),
  };
  println!(
    "  {} [{}] {} {}: {} ({state})",
    a.alert_id, a.raised_at, a.blockchain_id, a.kind, a.message
  );
}

fn print_tourist(t: &TrackedTourist) {
  let name = t.tourist_info.name.as_deref().unwrap_or("-");
  let loc = &t.current_location;
  println!(
    "{:<24} {:<10} {:<20} {:.6}, {:.6} @ {}",
    t.blockchain_id, t.status, name, loc.latitude, loc.longitude, loc.recorded_at
  );
}
