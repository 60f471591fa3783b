//! Dry-run agents for capabilities backed by third-party services.
//!
//! Messaging, calendar, telephony and web search need credentials and a
//! transport that live outside this crate. These agents check the
//! parameters a real integration would need and describe the action they
//! would take, so plans can be exercised end to end without side effects.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::agents::{required_str, Agent, CALENDAR, COMMUNICATION, MESSAGING, SEARCH};
use crate::core::{AgentResult, Parameters};

type Outcome = std::result::Result<Value, String>;

/// Posts a message to a channel (`channel`, `message`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagingAgent;

#[async_trait]
impl Agent for MessagingAgent {
    fn capability(&self) -> &str {
        MESSAGING
    }

    async fn execute(&self, parameters: &Parameters) -> AgentResult {
        post_message(parameters).into()
    }
}

fn post_message(parameters: &Parameters) -> Outcome {
    let channel = required_str(parameters, "channel")?;
    let message = required_str(parameters, "message")?;
    if !channel.starts_with('#') {
        return Err(format!("channel `{}` must start with '#'", channel));
    }
    Ok(json!({
        "dryRun": true,
        "action": "post_message",
        "channel": channel,
        "message": message,
    }))
}

/// Creates a calendar event (`title`, `start_time`, `end_time`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarAgent;

#[async_trait]
impl Agent for CalendarAgent {
    fn capability(&self) -> &str {
        CALENDAR
    }

    async fn execute(&self, parameters: &Parameters) -> AgentResult {
        create_event(parameters).into()
    }
}

fn create_event(parameters: &Parameters) -> Outcome {
    let title = required_str(parameters, "title")?;
    let start_raw = required_str(parameters, "start_time")?;
    let end_raw = required_str(parameters, "end_time")?;
    let start = parse_datetime(start_raw).ok_or_else(|| invalid_time("start_time", start_raw))?;
    let end = parse_datetime(end_raw).ok_or_else(|| invalid_time("end_time", end_raw))?;
    if end <= start {
        return Err(format!(
            "end_time {} is not after start_time {}",
            end_raw, start_raw
        ));
    }
    Ok(json!({
        "dryRun": true,
        "action": "create_event",
        "title": title,
        "start": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "end": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }))
}

/// Accepts `YYYY-MM-DDTHH:MM:SS`, with or without a UTC offset.
///
/// Offsets are dropped so that both forms compare on wall-clock time.
fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DateTime::<FixedOffset>::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
}

fn invalid_time(key: &str, value: &str) -> String {
    format!(
        "parameter `{}` must be an ISO-8601 date-time (YYYY-MM-DDTHH:MM:SS), got `{}`",
        key, value
    )
}

/// Places a call or sends an SMS (`type`, `recipient`, `message`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CommunicationAgent;

#[async_trait]
impl Agent for CommunicationAgent {
    fn capability(&self) -> &str {
        COMMUNICATION
    }

    async fn execute(&self, parameters: &Parameters) -> AgentResult {
        contact(parameters).into()
    }
}

fn e164() -> &'static Regex {
    static E164: OnceLock<Regex> = OnceLock::new();
    E164.get_or_init(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"))
}

fn contact(parameters: &Parameters) -> Outcome {
    let kind = required_str(parameters, "type")?;
    let recipient = required_str(parameters, "recipient")?;
    let message = required_str(parameters, "message")?;
    let action = match kind {
        "sms" => "send_sms",
        "call" => "place_call",
        other => return Err(format!("parameter `type` must be `call` or `sms`, got `{}`", other)),
    };
    if !e164().is_match(recipient) {
        return Err(format!("recipient `{}` is not an E.164 phone number", recipient));
    }
    Ok(json!({
        "dryRun": true,
        "action": action,
        "recipient": recipient,
        "message": message,
    }))
}

/// Runs a web search (`query`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchAgent;

#[async_trait]
impl Agent for SearchAgent {
    fn capability(&self) -> &str {
        SEARCH
    }

    async fn execute(&self, parameters: &Parameters) -> AgentResult {
        search(parameters).into()
    }
}

fn search(parameters: &Parameters) -> Outcome {
    let query = required_str(parameters, "query")?;
    Ok(json!({
        "dryRun": true,
        "action": "web_search",
        "query": query,
    }))
}
