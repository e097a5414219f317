//! Email Composer — writes one outreach email per job posting.
//!
//! Pluggable, trait-based: `LlmEmailComposer` (default) asks the model for the body,
//! `TemplateEmailComposer` fills a fixed template with no network call.
//!
//! `Pipeline` holds an `Arc<dyn EmailComposer>`, chosen at startup via `EMAIL_COMPOSER`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::extractor::JobPosting;
use crate::generation::prompts::COMPOSE_EMAIL_PROMPT_TEMPLATE;
use crate::llm_client::{LlmError, TextGenerator};

const FALLBACK_SUBJECT_ROLE: &str = "Exciting Job Opportunity";
const NO_LINKS_TEXT: &str = "Portfolio links available upon request.";

/// A finished email. Returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Who the email is from. Fills the persona slots of both composers.
#[derive(Debug, Clone)]
pub struct SenderProfile {
    pub name: String,
    pub title: String,
    pub company: String,
    /// Completes the sentence "<company> ..."
    pub pitch: String,
}

impl Default for SenderProfile {
    fn default() -> Self {
        Self {
            name: "Mohan".to_string(),
            title: "Business Development Executive".to_string(),
            company: "XYZ Company".to_string(),
            pitch: "is an AI & Software Consulting company helping enterprises streamline \
                    their business processes through automation."
                .to_string(),
        }
    }
}

/// An email-generation call failed for one posting.
#[derive(Debug, Error)]
#[error("Email composition failed for role '{role}': {source}")]
pub struct CompositionFailure {
    pub role: String,
    #[source]
    pub source: LlmError,
}

/// The composer trait. Implement this to swap backends without touching the pipeline.
#[async_trait]
pub trait EmailComposer: Send + Sync {
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<EmailDraft, CompositionFailure>;

    fn name(&self) -> &'static str;
}

/// Which composer backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKind {
    Llm,
    Template,
}

impl FromStr for ComposerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(ComposerKind::Llm),
            "template" => Ok(ComposerKind::Template),
            other => Err(format!("unknown email composer '{other}' (expected llm|template)")),
        }
    }
}

/// Builds the configured composer.
pub fn build_composer(
    kind: ComposerKind,
    llm: Arc<dyn TextGenerator>,
    sender: SenderProfile,
) -> Arc<dyn EmailComposer> {
    match kind {
        ComposerKind::Llm => Arc::new(LlmEmailComposer::new(llm, sender)),
        ComposerKind::Template => Arc::new(TemplateEmailComposer::new(sender)),
    }
}

/// Subject line shared by both composers.
pub fn email_subject(job: &JobPosting, sender: &SenderProfile) -> String {
    let role = job.role.trim();
    let role = if role.is_empty() {
        FALLBACK_SUBJECT_ROLE
    } else {
        role
    };
    format!("{role} - {} can help", sender.company)
}

/// Asks the model for an email body for one posting. Returns the trimmed reply as-is.
///
/// One call, no retry here; transport retries live in `llm_client`.
pub async fn compose_email(
    job: &JobPosting,
    links: &[String],
    sender: &SenderProfile,
    llm: &dyn TextGenerator,
) -> Result<String, LlmError> {
    let prompt = build_email_prompt(job, links, sender);
    let body = llm.generate(&prompt).await?;
    Ok(body.trim().to_string())
}

fn build_email_prompt(job: &JobPosting, links: &[String], sender: &SenderProfile) -> String {
    // JobPosting holds only strings; serialization cannot fail.
    let job_description = serde_json::to_string_pretty(job).unwrap_or_else(|_| format!("{job:?}"));

    COMPOSE_EMAIL_PROMPT_TEMPLATE
        .replace("{job_description}", &job_description)
        .replace("{link_list}", &links.join(", "))
        .replace("{sender_name}", &sender.name)
        .replace("{sender_title}", &sender.title)
        .replace("{company_name}", &sender.company)
        .replace("{company_pitch}", &sender.pitch)
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEmailComposer — default
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmEmailComposer {
    llm: Arc<dyn TextGenerator>,
    sender: SenderProfile,
}

impl LlmEmailComposer {
    pub fn new(llm: Arc<dyn TextGenerator>, sender: SenderProfile) -> Self {
        Self { llm, sender }
    }
}

#[async_trait]
impl EmailComposer for LlmEmailComposer {
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<EmailDraft, CompositionFailure> {
        let body = compose_email(job, links, &self.sender, self.llm.as_ref())
            .await
            .map_err(|source| CompositionFailure {
                role: job.role.clone(),
                source,
            })?;

        Ok(EmailDraft {
            subject: email_subject(job, &self.sender),
            body,
        })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TemplateEmailComposer — deterministic, offline
// ────────────────────────────────────────────────────────────────────────────

pub struct TemplateEmailComposer {
    sender: SenderProfile,
}

impl TemplateEmailComposer {
    pub fn new(sender: SenderProfile) -> Self {
        Self { sender }
    }

    fn render_body(&self, job: &JobPosting, links: &[String]) -> String {
        let role = if job.role.trim().is_empty() {
            "role"
        } else {
            job.role.trim()
        };
        let skills = if job.skills.is_empty() {
            "the technologies your team relies on".to_string()
        } else {
            job.skills.join(", ")
        };
        let portfolio = if links.is_empty() {
            NO_LINKS_TEXT.to_string()
        } else {
            links
                .iter()
                .map(|l| format!("- {l}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Dear Hiring Manager,\n\n\
             I came across your opening for the {role} position and wanted to reach out.\n\n\
             {company} {pitch} Our team has delivered projects built with {skills}, \
             and we would be glad to help you fill this need.\n\n\
             Portfolio highlights:\n{portfolio}\n\n\
             I'd love to discuss how we can contribute to your team's success. \
             Please let me know if we can schedule a call.\n\n\
             Best regards,\n{name}\n{title}\n{company}",
            company = self.sender.company,
            pitch = self.sender.pitch,
            name = self.sender.name,
            title = self.sender.title,
        )
    }
}

#[async_trait]
impl EmailComposer for TemplateEmailComposer {
    async fn compose(
        &self,
        job: &JobPosting,
        links: &[String],
    ) -> Result<EmailDraft, CompositionFailure> {
        Ok(EmailDraft {
            subject: email_subject(job, &self.sender),
            body: self.render_body(job, links),
        })
    }

    fn name(&self) -> &'static str {
        "template"
    }
}
