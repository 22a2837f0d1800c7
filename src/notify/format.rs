// src/notify/format.rs
//! Builds webhook payloads for accepted foundings and the startup summary.

use chrono::{DateTime, Local};

use super::discord::{Embed, EmbedField, EmbedFooter, EmbedImage, WebhookPayload};
use crate::config::Settings;
use crate::ingest::markup::SITE_ORIGIN;
use crate::ingest::types::ExtractedEvent;

pub const SCRIPT_NAME: &str = "The_Vigil_of_Origins";
pub const EMBED_COLOR: u32 = 0x4B0082;

pub fn human_time(ts: DateTime<Local>) -> String {
    ts.format("%B %d, %Y at %H:%M:%S").to_string()
}

/// Compose-telegram link for `nations`. `template_id = None` gives the generic link.
///
/// Recipients and the user agent are percent-encoded; the comma between
/// recipients stays literal.
pub fn compose_link(nations: &[String], user_agent: &str, template_id: Option<&str>) -> String {
    let targets = nations
        .iter()
        .map(|n| urlencoding::encode(n).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    let mut link = format!("{SITE_ORIGIN}/page=compose_telegram?tgto={targets}");
    if let Some(id) = template_id {
        link.push_str("&message=");
        link.push_str(&urlencoding::encode(id));
    }
    link.push_str("&generated_by=");
    link.push_str(SCRIPT_NAME);
    link.push_str("&used_by=");
    link.push_str(&urlencoding::encode(user_agent));
    link
}

pub fn build_payload(
    nations: &[String],
    event: &ExtractedEvent,
    settings: &Settings,
) -> WebhookPayload {
    build_payload_at(nations, event, settings, Local::now())
}

pub fn build_payload_at(
    nations: &[String],
    event: &ExtractedEvent,
    settings: &Settings,
    now: DateTime<Local>,
) -> WebhookPayload {
    let title = format!(
        "📜 A Banner Unfurled — {} was {} in {}",
        event.subject_name, event.verb, event.region_name
    );

    let mut lines = vec![
        format!("🧭 **Nations Welcomed by the Realms**: {}", nations.join(", ")),
        String::new(),
    ];
    if !settings.templates.is_empty() {
        lines.push("📨 **Ritual Telegram Paths:**".to_string());
        for (label, id) in &settings.templates {
            let link = compose_link(nations, &settings.user_agent, Some(id.as_str()));
            lines.push(format!("• [{label} Invocation]({link})"));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "🖋️ [Commune with the Newborn Realms]({})",
        compose_link(nations, &settings.user_agent, None)
    ));

    WebhookPayload {
        content: role_mention(settings),
        embeds: vec![Embed {
            title,
            url: Some(event.profile_url.clone()),
            color: EMBED_COLOR,
            thumbnail: Some(EmbedImage {
                url: event.flag_url.clone(),
            }),
            description: Some(lines.join("\n")),
            fields: Vec::new(),
            footer: EmbedFooter {
                text: format!(
                    "The Vigil of Origins • Chronicle recorded {}",
                    human_time(now)
                ),
            },
        }],
    }
}

fn role_mention(settings: &Settings) -> Option<String> {
    settings
        .role_to_ping
        .as_deref()
        .map(|role| format!("<@&{role}>"))
}

/// One-off summary of the running configuration, sent before streaming starts.
pub fn build_startup_payload(settings: &Settings) -> WebhookPayload {
    build_startup_payload_at(settings, Local::now())
}

pub fn build_startup_payload_at(settings: &Settings, now: DateTime<Local>) -> WebhookPayload {
    let mut template_lines: Vec<String> = settings
        .templates
        .iter()
        .map(|(label, id)| format!("• **{label}** (ID: `{id}`)"))
        .collect();
    if template_lines.is_empty() {
        template_lines.push("• _No templates provided_".to_string());
    }

    let watched = if settings.exclusions.is_empty() {
        "_None_".to_string()
    } else {
        settings.exclusions.join(", ")
    };

    WebhookPayload {
        content: None,
        embeds: vec![Embed {
            title: "✨ The Vigil of Origins Stirs".to_string(),
            url: None,
            color: EMBED_COLOR,
            thumbnail: None,
            description: None,
            fields: vec![
                EmbedField {
                    name: "User-Agent".to_string(),
                    value: settings.user_agent.clone(),
                    inline: true,
                },
                EmbedField {
                    name: "Watched Realms (Blacklisted)".to_string(),
                    value: watched,
                    inline: false,
                },
                EmbedField {
                    name: "📜 Templates of Initiation".to_string(),
                    value: template_lines.join("\n"),
                    inline: false,
                },
            ],
            footer: EmbedFooter {
                text: format!("The Vigil Awakens — {}", human_time(now)),
            },
        }],
    }
}
