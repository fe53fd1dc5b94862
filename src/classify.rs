//! Rule-based categorisation of incoming mail.
//!
//! A message is matched against, in order: a stored label for the sender's
//! domain, subject keyword groups, the personal-sender rule and finally the
//! AI entertainment verdict for the domain.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ANGLE_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap());

const FINANCE_WORDS: &[&str] = &["invoice", "payment", "loan", "bank", "emi"];
const BILL_WORDS: &[&str] = &["bill", "billing", "electricity"];
const PROMO_WORDS: &[&str] = &["sale", "discount", "offer"];
const CAREER_WORDS: &[&str] = &["job", "hiring", "interview"];
const WORK_WORDS: &[&str] = &["meeting", "update", "deadline"];
const TRAVEL_WORDS: &[&str] = &["flight", "booking", "itinerary"];

/// Subject rules, checked top to bottom.
const SUBJECT_RULES: &[(&[&str], &str, u8)] = &[
    (FINANCE_WORDS, "Finance", 90),
    (BILL_WORDS, "Bills", 90),
    (PROMO_WORDS, "Promotions", 85),
    (CAREER_WORDS, "Career", 80),
    (WORK_WORDS, "Work", 75),
    (TRAVEL_WORDS, "Travel", 85),
];

pub const PERSONAL: &str = "Personal";
pub const ENTERTAINMENT: &str = "Entertainment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: String,
    pub confidence: u8,
    pub reason: String,
}

impl Classification {
    fn new(category: impl Into<String>, confidence: u8, reason: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            confidence,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Label the message with this category.
    Apply(Classification),
    /// Recognised, but deliberately left unlabelled.
    Skip(Classification),
    NoMatch,
}

/// What the labeller reports back for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelReport {
    pub category: String,
    pub confidence: u8,
    pub reason: String,
}

impl From<&Verdict> for LabelReport {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Apply(c) => LabelReport {
                category: c.category.clone(),
                confidence: c.confidence,
                reason: c.reason.clone(),
            },
            Verdict::Skip(c) => LabelReport {
                category: format!("{} (skipped)", c.category),
                confidence: c.confidence,
                reason: c.reason.clone(),
            },
            Verdict::NoMatch => LabelReport {
                category: "None".to_string(),
                confidence: 0,
                reason: "No rule matched".to_string(),
            },
        }
    }
}

/// Pulls the bare address out of a `From` header such as `Ann <ann@x.com>`.
pub fn sender_address(from: &str) -> &str {
    ANGLE_ADDRESS
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(from)
}

/// Lower-cased part after the first `@`, or empty when there is none.
pub fn extract_domain(email: &str) -> String {
    match email.split_once('@') {
        Some((_, rest)) => rest.split('@').next().unwrap_or(rest).to_lowercase(),
        None => String::new(),
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Subject keyword and personal-sender rules.
pub fn rule_based(subject: &str, sender: &str) -> Option<Classification> {
    let subject = subject.to_lowercase();
    let sender = sender.to_lowercase();

    for (words, category, confidence) in SUBJECT_RULES {
        if contains_any(&subject, words) {
            return Some(Classification::new(
                *category,
                *confidence,
                format!("Rule-based: {}", category),
            ));
        }
    }

    if sender.ends_with("@gmail.com") {
        return Some(Classification::new(PERSONAL, 50, "Personal Gmail"));
    }

    None
}

/// Full pipeline for one message.
pub fn classify(
    domain_label: Option<&str>,
    subject: &str,
    sender: &str,
    entertainment: bool,
) -> Verdict {
    let classification = match domain_label {
        Some(label) => Classification::new(label, 99, "DB override"),
        None => match rule_based(subject, sender) {
            Some(classification) => classification,
            None if entertainment => Classification::new(ENTERTAINMENT, 80, "AI entertainment"),
            None => return Verdict::NoMatch,
        },
    };

    if classification.category == PERSONAL {
        Verdict::Skip(classification)
    } else {
        Verdict::Apply(classification)
    }
}
