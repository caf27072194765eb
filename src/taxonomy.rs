//! The fixed competency taxonomy: 17 canonical competency titles grouped
//! under 4 report domains. Membership is closed; question prompts that do
//! not resolve to a taxonomy entry are excluded from competency-scoped
//! views (they still count toward domain-agnostic aggregates).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Competency {
    pub title: &'static str,
    pub domain: &'static str,
}

pub const REPORT_DOMAINS: [&str; 4] = [
    "Knowledge & Inquiry",
    "Research & Scholarship",
    "Communication & Collaboration",
    "Leadership & Practice",
];

pub const TAXONOMY: [Competency; 17] = [
    Competency { title: "Disciplinary Knowledge", domain: "Knowledge & Inquiry" },
    Competency { title: "Critical Thinking", domain: "Knowledge & Inquiry" },
    Competency { title: "Ethical Reasoning", domain: "Knowledge & Inquiry" },
    Competency { title: "Information Literacy", domain: "Knowledge & Inquiry" },
    Competency { title: "Research Design", domain: "Research & Scholarship" },
    Competency { title: "Data Analysis", domain: "Research & Scholarship" },
    Competency { title: "Scholarly Writing", domain: "Research & Scholarship" },
    Competency { title: "Evidence-Based Practice", domain: "Research & Scholarship" },
    Competency { title: "Oral Communication", domain: "Communication & Collaboration" },
    Competency { title: "Written Communication", domain: "Communication & Collaboration" },
    Competency { title: "Interpersonal Engagement", domain: "Communication & Collaboration" },
    Competency { title: "Collaborative Teamwork", domain: "Communication & Collaboration" },
    Competency { title: "Project Management", domain: "Leadership & Practice" },
    Competency { title: "Organizational Leadership", domain: "Leadership & Practice" },
    Competency { title: "Change Management", domain: "Leadership & Practice" },
    Competency { title: "Professional Identity", domain: "Leadership & Practice" },
    Competency { title: "Reflective Practice", domain: "Leadership & Practice" },
];

const REFLECTION_SUFFIX: &str = " reflection";

/// Normalize a display name to a slug: strip a trailing "Reflection"
/// suffix (case-insensitive), lowercase, join alphanumeric tokens with
/// underscores. "Project Management Reflection" -> "project_management".
pub fn slugify(text: &str) -> String {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();
    let base = if lowered.ends_with(REFLECTION_SUFFIX) {
        &lowered[..lowered.len() - REFLECTION_SUFFIX.len()]
    } else {
        &lowered
    };

    base.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Match a question prompt against the taxonomy: exact title first, then
/// normalized slug. Returns `None` for prompts outside the closed set.
pub fn match_competency(question_text: &str) -> Option<&'static Competency> {
    if let Some(found) = TAXONOMY.iter().find(|c| c.title == question_text.trim()) {
        return Some(found);
    }
    let slug = slugify(question_text);
    TAXONOMY.iter().find(|c| slugify(c.title) == slug)
}

/// Resolve a category display name to a canonical report domain. Categories
/// named outside the 4 canonical domains yield `None` and are excluded from
/// domain-scoped views.
pub fn domain_for_category(category_name: &str) -> Option<&'static str> {
    let slug = slugify(category_name);
    REPORT_DOMAINS
        .iter()
        .copied()
        .find(|domain| slugify(domain) == slug)
}

/// Resolve a raw domain-or-slug string to a canonical report domain.
pub fn canonical_domain(raw: &str) -> Option<&'static str> {
    domain_for_category(raw)
}
