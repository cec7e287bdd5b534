//! Crisis phrase detection.
//!
//! A last-resort safety net, not a clinical classifier: the latest user
//! utterance is lowercased and checked for any listed phrase as a plain
//! substring. No stemming, no negation handling. False positives on
//! unrelated words that happen to contain a phrase are accepted.

/// Risk phrases covering self-harm, suicidal ideation and harm to others.
pub const CRISIS_PHRASES: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "want to die",
    "hurt myself",
    "harm myself",
    "self-harm",
    "kill someone",
    "hurt someone",
    "harm others",
];

/// Fixed reply returned instead of a generated one when risk is detected.
pub const SAFETY_REPLY: &str = "I'm concerned about what you've shared. Your safety is the top priority. Please reach out to emergency services or a crisis hotline immediately.";

/// A service callers surface alongside the safety reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrisisResource {
    pub name: &'static str,
    pub contact: &'static str,
    pub availability: &'static str,
}

pub const CRISIS_RESOURCES: &[CrisisResource] = &[
    CrisisResource {
        name: "988 Suicide & Crisis Lifeline",
        contact: "Call or text 988",
        availability: "24/7",
    },
    CrisisResource {
        name: "Crisis Text Line",
        contact: "Text HOME to 741741",
        availability: "24/7",
    },
    CrisisResource {
        name: "Emergency Services",
        contact: "Call 911",
        availability: "24/7",
    },
];

/// Returns `true` when `text` contains any crisis phrase, ignoring case.
/// Missing or empty text never triggers.
pub fn detect_crisis(text: Option<&str>) -> bool {
    let Some(text) = text else {
        return false;
    };
    if text.is_empty() {
        return false;
    }

    let normalized = text.to_lowercase();
    CRISIS_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}
