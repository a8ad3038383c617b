//! HTML message bodies for Telegram.

use alert_core::{
    ingest::trading_view_link,
    model::{AlertRule, VwapAlertRule},
    time::named_time,
};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn triggered_alerts(project: &str, alerts: &[AlertRule], now: DateTime<Utc>) -> String {
    let mut msg = format!("<b>✴️ {}: TRIGGERED ALERTS</b>\n", escape_html(project));

    for (index, alert) in alerts.iter().enumerate() {
        let _ = write!(
            msg,
            "\n<b>{}. <a href=\"{}\">{}</a> ➡️ <i>{}</i></b>\n",
            index + 1,
            escape_html(alert.tv_link.as_deref().unwrap_or_default()),
            escape_html(&alert.symbol),
            escape_html(&alert.alert_name),
        );
    }

    let _ = write!(msg, "\n⏰ <b>Report Generated:</b> {}\n", named_time(&now));
    msg
}

/// `report_time` is printed as is; callers apply any display offset.
pub fn triggered_vwap_alerts(
    project: &str,
    alerts: &[VwapAlertRule],
    report_time: DateTime<Utc>,
    mobile_url: Option<&str>,
) -> String {
    if alerts.is_empty() {
        return format!("<b>✴️ {}: NO TRIGGERED ALERTS</b>", escape_html(project));
    }

    let items: Vec<String> = alerts
        .iter()
        .enumerate()
        .map(|(index, alert)| {
            format!(
                "<a href=\"{}\"><b>{}. {}/<i>{}</i></b></a>",
                escape_html(&trading_view_link(&alert.symbol, &alert.exchanges)),
                index + 1,
                escape_html(&alert.symbol),
                escape_html(alert.anchor_time_str.as_deref().unwrap_or_default()),
            )
        })
        .collect();

    let mut footer = named_time(&report_time);
    if let Some(url) = mobile_url {
        let _ = write!(
            footer,
            "  <a href=\"{}\" title=\"View Alerts on Mobile\">🈯️🈯️🈯️</a>",
            escape_html(url)
        );
    }

    format!("<b>💹 VWAP ALERTS</b>\n{}\n{}", items.join("\n"), footer)
}

pub fn error_report(project: &str, scope: &str, error: &str, now: DateTime<Utc>) -> String {
    format!(
        "<b>🆘 {}:{}() ERROR</b>\n<i>{}</i>\n<i>⏰ {}</i>",
        escape_html(project),
        escape_html(scope),
        escape_html(error),
        named_time(&now)
    )
}
