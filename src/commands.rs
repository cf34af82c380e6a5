/// CLI subcommands and their handlers
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use steadyfetch::app::App;
use steadyfetch::{FetchRequest, FetchResult};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Fetch content, falling back to saved content when the network fails
  Fetch {
    /// Kind of content to request (e.g. story, image, dialogue)
    #[arg(short, long)]
    kind: String,

    /// Thematic tag used to match saved content
    #[arg(short, long)]
    topic: Option<String>,

    /// Extra request parameter, repeatable (key=value)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
  },

  /// Write the bundled defaults into the offline store (idempotent)
  Seed,

  /// Remove fetched content older than the given number of days
  Prune {
    /// Defaults to offline.prune_after_days from the config
    #[arg(short, long)]
    days: Option<u32>,
  },

  /// List everything in the offline store
  List,

  /// Delete everything in the offline store, seeded defaults included
  Wipe,

  /// Record activity and print the current streak
  Streak {
    /// Calendar day of the activity (YYYY-MM-DD), defaults to today
    #[arg(short, long, value_parser = parse_date)]
    date: Option<NaiveDate>,
  },
}

/// Parse a `key=value` pair
fn parse_param(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
  let key = key.trim();
  if key.is_empty() {
    return Err(format!("empty key in '{}'", s));
  }
  Ok((key.to_string(), value.trim().to_string()))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

/// Run a command against an opened app
pub async fn run(app: &App, command: Command) -> Result<()> {
  match command {
    Command::Fetch {
      kind,
      topic,
      params,
    } => {
      let mut request = FetchRequest::new(kind);
      if let Some(topic) = topic {
        request = request.with_topic(topic);
      }
      for (key, value) in params {
        request = request.with_param(key, value);
      }

      match app.fetch(&request).await {
        FetchResult::Success { payload, tier } => {
          if tier.is_fallback() {
            eprintln!("(network unavailable, using {} content)", tier);
          } else {
            eprintln!("(fresh from {})", tier);
          }
          let pretty = serde_json::to_string_pretty(&payload)
            .map_err(|e| eyre!("Failed to format payload: {}", e))?;
          println!("{}", pretty);
          Ok(())
        }
        FetchResult::Failure(kind) => Err(eyre!(
          "No content available ({:?}); check the synthetic table in your config",
          kind
        )),
      }
    }
    Command::Seed => {
      let written = app.seed().await?;
      println!("Seeded {} item(s)", written);
      Ok(())
    }
    Command::Prune { days } => {
      let days = days.unwrap_or(app.config().offline.prune_after_days);
      let removed = app.prune(days).await?;
      println!("Pruned {} item(s) older than {} day(s)", removed, days);
      Ok(())
    }
    Command::List => {
      for item in app.list().await? {
        println!(
          "{}  {:<8} {:<10} {:<12} {}",
          item.created_at.format("%Y-%m-%d %H:%M"),
          format!("{:?}", item.origin).to_lowercase(),
          item.kind,
          item.topic.as_deref().unwrap_or("-"),
          item.identifier
        );
      }
      Ok(())
    }
    Command::Wipe => {
      let removed = app.wipe().await?;
      println!("Removed {} item(s)", removed);
      Ok(())
    }
    Command::Streak { date } => {
      let date = date.unwrap_or_else(|| Local::now().date_naive());
      let state = app.record_activity(date).await?;
      println!(
        "Current streak: {} day(s), active on {} day(s) in total",
        state.current_streak, state.total_active_days
      );
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_param() {
    assert_eq!(
      parse_param("turn=3").unwrap(),
      ("turn".to_string(), "3".to_string())
    );
    assert_eq!(
      parse_param(" mood = calm ").unwrap(),
      ("mood".to_string(), "calm".to_string())
    );
  }

  #[test]
  fn test_parse_param_keeps_extra_equals() {
    assert_eq!(
      parse_param("q=a=b").unwrap(),
      ("q".to_string(), "a=b".to_string())
    );
  }

  #[test]
  fn test_parse_param_rejects_bad_input() {
    assert!(parse_param("novalue").is_err());
    assert!(parse_param("=x").is_err());
  }

  #[test]
  fn test_parse_date() {
    assert_eq!(
      parse_date("2024-02-29").unwrap(),
      NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    );
    assert!(parse_date("2023-02-29").is_err());
  }
}
