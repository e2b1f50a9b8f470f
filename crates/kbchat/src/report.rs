// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only conversation reports: `stats`, `list`, and `show`.

use std::collections::HashMap;
use std::fmt::Write as _;

use kbchat_core::{
    ConversationDetail, ConversationListFilter, ConversationListItem, ConversationMessage,
    ConversationReference, ConversationStore, DistributionEntry, FeedbackInfo, KbchatError,
};
use serde::Serialize;

/// Structured output of `kbchat stats`.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub kb_id: String,
    pub window_hours: u64,
    pub conversations: u64,
    pub by_app: Vec<DistributionEntry>,
}

/// One listing row with the conversation's folded feedback.
#[derive(Debug, Serialize)]
pub struct ListRow {
    #[serde(flatten)]
    pub item: ConversationListItem,
    pub feedback: Option<FeedbackInfo>,
}

#[derive(Debug, Serialize)]
pub struct ListReport {
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub items: Vec<ListRow>,
}

#[derive(Debug, Serialize)]
pub struct ShowReport {
    pub conversation: ConversationDetail,
    pub messages: Vec<ConversationMessage>,
    pub references: Vec<ConversationReference>,
    pub feedback: Option<FeedbackInfo>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, KbchatError> {
    serde_json::to_string_pretty(value).map_err(|e| KbchatError::Internal(e.to_string()))
}

pub async fn stats_report(
    store: &dyn ConversationStore,
    kb_id: &str,
) -> Result<StatsReport, KbchatError> {
    let conversations = store.get_conversation_count(kb_id).await?;
    let by_app = store.get_conversation_distribution(kb_id).await?;
    Ok(StatsReport {
        kb_id: kb_id.to_string(),
        window_hours: kbchat_storage::queries::stats::STATS_WINDOW.as_secs() / 3600,
        conversations,
        by_app,
    })
}

pub async fn list_report(
    store: &dyn ConversationStore,
    filter: &ConversationListFilter,
) -> Result<ListReport, KbchatError> {
    let (items, total) = store.get_conversation_list(filter).await?;
    let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
    let mut feedback = store.get_feedback_by_conversation_ids(&ids).await?;

    let items = items
        .into_iter()
        .map(|item| ListRow {
            feedback: feedback.remove(&item.id),
            item,
        })
        .collect();
    Ok(ListReport {
        total,
        page: filter.pagination.page.max(1),
        per_page: filter.pagination.per_page,
        items,
    })
}

pub async fn show_report(
    store: &dyn ConversationStore,
    id: &str,
) -> Result<ShowReport, KbchatError> {
    let conversation = store.get_conversation_detail(id).await?;
    let messages = store.get_conversation_messages(id).await?;
    let references = store.get_conversation_references(id).await?;
    let mut feedback: HashMap<String, FeedbackInfo> = store
        .get_feedback_by_conversation_ids(&[id.to_string()])
        .await?;
    Ok(ShowReport {
        conversation,
        messages,
        references,
        feedback: feedback.remove(id),
    })
}

pub async fn run_stats(
    store: &dyn ConversationStore,
    kb_id: &str,
    json: bool,
) -> Result<(), KbchatError> {
    let report = stats_report(store, kb_id).await?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", render_stats(&report));
    }
    Ok(())
}

pub async fn run_list(
    store: &dyn ConversationStore,
    filter: &ConversationListFilter,
    json: bool,
) -> Result<(), KbchatError> {
    let report = list_report(store, filter).await?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", render_list(&report));
    }
    Ok(())
}

pub async fn run_show(
    store: &dyn ConversationStore,
    id: &str,
    json: bool,
) -> Result<(), KbchatError> {
    let report = show_report(store, id).await?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", render_show(&report));
    }
    Ok(())
}

fn score_label(feedback: Option<&FeedbackInfo>) -> &'static str {
    match feedback.map(|f| f.score) {
        Some(s) if s > 0 => "+",
        Some(s) if s < 0 => "-",
        _ => "",
    }
}

pub fn render_stats(report: &StatsReport) -> String {
    let mut out = format!(
        "{} conversation(s) in {} over the last {}h\n",
        report.conversations, report.kb_id, report.window_hours
    );
    for entry in &report.by_app {
        let _ = writeln!(out, "  {:<36} {:>8}", entry.app_id, entry.count);
    }
    out
}

pub fn render_list(report: &ListReport) -> String {
    let mut out = String::new();
    for row in &report.items {
        let app = row.item.app_name.as_deref().unwrap_or(&row.item.app_id);
        let _ = writeln!(
            out,
            "{:<36} {} {:<1} {:<16} {}",
            row.item.id,
            row.item.created_at.format("%Y-%m-%d %H:%M"),
            score_label(row.feedback.as_ref()),
            app,
            row.item.subject
        );
    }
    let pages = report.total.div_ceil(u64::from(report.per_page.max(1)));
    let _ = writeln!(
        out,
        "page {}/{} ({} conversation(s))",
        report.page,
        pages.max(1),
        report.total
    );
    out
}

pub fn render_show(report: &ShowReport) -> String {
    let c = &report.conversation;
    let mut out = format!(
        "{} ({})\n  app {}  from {}  at {}\n",
        c.subject,
        c.id,
        c.app_id,
        c.remote_ip,
        c.created_at.to_rfc3339()
    );
    if let Some(f) = &report.feedback {
        let _ = writeln!(out, "  feedback {} {}", score_label(Some(f)), f.feedback_content);
    }
    out.push('\n');
    for m in &report.messages {
        let _ = writeln!(out, "[{}] {}: {}", m.created_at.format("%H:%M:%S"), m.role, m.content);
    }
    if !report.references.is_empty() {
        out.push_str("\nreferences:\n");
        for r in &report.references {
            let _ = writeln!(out, "  - {} <{}>", r.name, r.url);
        }
    }
    out
}
