use std::ops::Range;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{MemoStatus, TokenUsage};

static AUDIENCE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_-]+)").expect("audience pattern is valid"));

static SHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{6,40}$").expect("sha pattern is valid"));

static TOKEN_USAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<used>[0-9][0-9,_]*)(?:\s*/\s*(?P<budget>[0-9][0-9,_]*))?")
        .expect("token usage pattern is valid")
});

static FIELD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-?\s*\*\*[^*]+\*\*\s*:").expect("field label pattern is valid")
});

/// Fields pulled out of one record body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Fields {
    pub date: Option<NaiveDate>,
    pub audience: Vec<String>,
    pub status: Option<MemoStatus>,
    pub status_text: Option<String>,
    pub branch: Option<String>,
    pub sha: Option<String>,
    pub work_item: Option<String>,
    pub deliverables: Vec<String>,
    pub token_usage: Option<TokenUsage>,
}

fn field_pattern(label: &str) -> Regex {
    let pattern = format!(
        r"(?mi)^[ \t]*-?[ \t]*\*\*{}\*\*[ \t]*:[ \t]*(?P<value>[^\r\n]*)",
        regex::escape(label)
    );
    Regex::new(&pattern).expect("field pattern is valid")
}

static DATE_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Date"));
static AUDIENCE_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Audience"));
static STATUS_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Status"));
static BRANCH_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Branch"));
static SHA_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("SHA"));
static WORK_ITEM_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Work Item"));
static TOKEN_USAGE_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Token Usage"));
static DELIVERABLES_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("Deliverables"));

/// Span of the value proper within a raw field value.
///
/// A value opening with a backtick ends at the closing one, so trailing
/// notes like `` `blocked` - merge conflict`` are not part of it. A bare
/// value runs to the first backtick or the end of the line.
fn value_span(raw: &str) -> Range<usize> {
    let lead = raw.len() - raw.trim_start().len();
    let rest = &raw[lead..];
    let (start, body) = match rest.strip_prefix('`') {
        Some(body) => (lead + 1, body),
        None => (lead, rest),
    };
    let value = &body[..body.find('`').unwrap_or(body.len())];
    let inner_lead = value.len() - value.trim_start().len();
    let start = start + inner_lead;
    start..start + value.trim().len()
}

/// The value without surrounding whitespace, backticks or trailing notes.
fn clean(value: &str) -> &str {
    &value[value_span(value)]
}

fn non_empty(value: &str) -> Option<String> {
    let cleaned = clean(value);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn first_value<'a>(re: &Regex, content: &'a str) -> Option<&'a str> {
    re.captures(content)
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str())
}

pub(crate) fn parse_fields(content: &str) -> Fields {
    let mut fields = Fields::default();

    if let Some(value) = first_value(&DATE_FIELD, content) {
        fields.date = parse_date_prefix(clean(value));
    }

    if let Some(value) = first_value(&AUDIENCE_FIELD, content) {
        fields.audience = AUDIENCE_TAG
            .captures_iter(value)
            .map(|caps| caps[1].to_string())
            .collect();
    }

    if let Some(value) = first_value(&STATUS_FIELD, content) {
        let text = clean(value);
        fields.status = text.parse().ok();
        fields.status_text = non_empty(text);
    }

    fields.branch = first_value(&BRANCH_FIELD, content).and_then(non_empty);

    fields.sha = first_value(&SHA_FIELD, content)
        .map(clean)
        .filter(|sha| SHA.is_match(sha))
        .map(|sha| sha.to_lowercase());

    fields.work_item = first_value(&WORK_ITEM_FIELD, content).and_then(non_empty);

    if let Some(value) = first_value(&TOKEN_USAGE_FIELD, content) {
        fields.token_usage = parse_token_usage(clean(value));
    }

    fields.deliverables = parse_deliverables(content);
    fields
}

/// `YYYY-MM-DD`, optionally followed by a time or anything else.
pub(crate) fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let prefix = value.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn parse_number(raw: &str) -> Option<u64> {
    raw.replace([',', '_'], "").parse().ok()
}

fn parse_token_usage(value: &str) -> Option<TokenUsage> {
    let caps = TOKEN_USAGE.captures(value)?;
    let used = parse_number(&caps["used"])?;
    let budget = caps.name("budget").and_then(|m| parse_number(m.as_str()));
    Some(TokenUsage { used, budget })
}

fn parse_deliverables(content: &str) -> Vec<String> {
    list_items(&DELIVERABLES_FIELD, content)
}

/// List items directly under the line matched by `re`.
fn list_items(re: &Regex, content: &str) -> Vec<String> {
    let start = match re.find(content) {
        Some(m) => m.end(),
        None => return Vec::new(),
    };

    let mut items = Vec::new();
    // Skip the remainder of the label line itself.
    for line in content[start..].lines().skip(1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if items.is_empty() {
                continue;
            }
            break;
        }
        if FIELD_LABEL.is_match(line) {
            break;
        }
        match trimmed.strip_prefix('-').or_else(|| trimmed.strip_prefix('*')) {
            Some(item) => {
                if let Some(item) = non_empty(item) {
                    items.push(item);
                }
            }
            None => break,
        }
    }
    items
}

/// Byte range of the status token on the first status line.
pub(crate) fn status_value_range(content: &str) -> Option<Range<usize>> {
    field_value_range(&STATUS_FIELD, content)
}

/// Byte range of a field's value, without surrounding backticks,
/// whitespace or trailing notes.
pub(crate) fn field_value_range(re: &Regex, content: &str) -> Option<Range<usize>> {
    let m = re.captures(content)?.name("value")?;
    let span = value_span(m.as_str());
    if span.is_empty() {
        return None;
    }
    Some(m.start() + span.start..m.start() + span.end)
}

/// Value of the first `**<label>**:` line, cleaned.
pub(crate) fn read_field(content: &str, label: &str) -> Option<String> {
    first_value(&field_pattern(label), content).and_then(non_empty)
}

/// Items listed under the first `**<label>**:` line.
pub(crate) fn read_list(content: &str, label: &str) -> Vec<String> {
    list_items(&field_pattern(label), content)
}

/// Replace the value of the first `**<label>**:` line, keeping every other
/// byte of `content` intact.
pub(crate) fn replace_field_value(content: &str, label: &str, new_value: &str) -> Option<String> {
    let re = field_pattern(label);
    let range = field_value_range(&re, content)?;
    let mut updated = String::with_capacity(content.len() + new_value.len());
    updated.push_str(&content[..range.start]);
    updated.push_str(new_value);
    updated.push_str(&content[range.end..]);
    Some(updated)
}

/// Extract a role from `<date>_<role>_<topic>`.
///
/// The longest entry of `known_roles` that matches wins, so roles with
/// underscores survive; otherwise the second `_` segment is used.
pub(crate) fn role_from_stem(stem: &str, known_roles: &[String]) -> Option<String> {
    let (date, rest) = stem.split_once('_')?;
    parse_date_prefix(date).filter(|_| date.len() == 10)?;
    if rest.is_empty() {
        return None;
    }

    let known = known_roles
        .iter()
        .filter(|role| rest == role.as_str() || rest.starts_with(&format!("{}_", role)))
        .max_by_key(|role| role.len());
    if let Some(role) = known {
        return Some(role.clone());
    }
    rest.split('_').next().filter(|s| !s.is_empty()).map(str::to_string)
}
